use crate::model::EntryStatus;

/// Trait for reporting indexing progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_discovery_complete(&self, _files_found: usize, _restored: usize) {}
    fn on_analysis_start(&self, _pending: usize) {}
    fn on_entry_analyzed(&self, _file_name: &str, _status: EntryStatus, _finished: usize, _total: usize) {}
    fn on_analysis_complete(&self, _done: usize, _errors: usize, _duration_secs: f64) {}
    fn on_rename_start(&self, _total: usize) {}
    fn on_rename_progress(&self, _processed: usize, _total: usize) {}
    fn on_rename_complete(&self, _renamed: usize, _failed: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
