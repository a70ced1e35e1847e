use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use issue_indexer_core::{EntryStatus, ProgressReporter};

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Analysis phase: progress bar over the admissible entries
/// - Rename phase: progress bar over the files to rename
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn start_bar(&self, total: usize, label: &str) {
        let pb = ProgressBar::new(total as u64);
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} {{msg}}",
            label
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICK_CHARS);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));

        let mut guard = self.lock();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.lock().take() {
            pb.finish_and_clear();
        }
    }
}

impl Default for CliReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CliReporter {
    fn on_discovery_complete(&self, files_found: usize, restored: usize) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Discovery complete: {} files, {} restored from registry",
            files_found, restored
        );
    }

    fn on_analysis_start(&self, pending: usize) {
        if pending > 0 {
            self.start_bar(pending, "Analyzing");
        }
    }

    fn on_entry_analyzed(&self, file_name: &str, status: EntryStatus, finished: usize, _total: usize) {
        let guard = self.lock();
        if let Some(pb) = guard.as_ref() {
            pb.set_position(finished as u64);
            if status == EntryStatus::Error {
                pb.println(format!("  \x1b[31m✗\x1b[0m {}", file_name));
            }
            pb.set_message(file_name.to_string());
        }
    }

    fn on_analysis_complete(&self, done: usize, errors: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Analysis complete: {} analyzed, {} failed in {:.2}s",
            done, errors, duration_secs
        );
    }

    fn on_rename_start(&self, total: usize) {
        self.start_bar(total, "Renaming");
    }

    fn on_rename_progress(&self, processed: usize, _total: usize) {
        if let Some(pb) = self.lock().as_ref() {
            pb.set_position(processed as u64);
        }
    }

    fn on_rename_complete(&self, renamed: usize, failed: usize) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Rename complete: {} renamed, {} failed",
            renamed, failed
        );
    }
}
