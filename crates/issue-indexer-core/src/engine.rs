use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::analysis;
use crate::config::AppConfig;
use crate::error::{EditError, RegistryError, RenameError};
use crate::extractor::MetadataExtractor;
use crate::model::{DiscoveredFile, EntryId, EntryStatus, LibraryEntry};
use crate::progress::ProgressReporter;
use crate::registry::{self, Registry, RegistryRecord};
use crate::rename::{self, BatchRename, Renamer};
use crate::scheduler::Scheduler;
use crate::script::{self, ScriptKind};
use crate::store::EntryStore;

/// One indexing session: the entry store, the registry imported at its start
/// and the scheduler driving analysis.
#[derive(Debug, Default)]
pub struct IndexEngine {
    store: EntryStore,
    registry: Registry,
    scheduler: Scheduler,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadResult {
    pub added: usize,
    pub restored: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct AnalysisSummary {
    pub analyzed: usize,
    pub failed: usize,
    pub discarded: usize,
    pub duration: Duration,
}

impl IndexEngine {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_concurrency(config.concurrency)
    }

    pub fn with_concurrency(budget: usize) -> Self {
        Self {
            store: EntryStore::new(),
            registry: Registry::new(),
            scheduler: Scheduler::new(budget),
        }
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Replace the imported registry. A malformed document leaves the current
    /// registry and every entry untouched.
    pub fn import_registry(&mut self, json: &str) -> Result<usize, RegistryError> {
        let registry = Registry::from_json(json)?;
        info!("{} historical records imported", registry.len());
        self.registry = registry;
        Ok(self.registry.len())
    }

    pub fn set_registry(&mut self, registry: Registry) {
        self.registry = registry;
    }

    /// Turn discovered files into entries, reconcile them with the imported
    /// registry and append them to the store. Files already present in the
    /// store (same fingerprint) are skipped.
    pub fn load_discovered(&mut self, files: Vec<DiscoveredFile>) -> LoadResult {
        let mut result = LoadResult::default();
        let mut seen = HashSet::new();

        let batch: Vec<LibraryEntry> = files
            .into_iter()
            .map(LibraryEntry::from_discovered)
            .filter(|entry| {
                let fresh = !self.store.contains_fingerprint(&entry.fingerprint)
                    && seen.insert(entry.fingerprint.clone());
                if !fresh {
                    debug!("Skipping already loaded file {}", entry.relative_path);
                    result.duplicates += 1;
                }
                fresh
            })
            .collect();

        for entry in registry::merge(batch, &self.registry, Utc::now()) {
            if entry.status != EntryStatus::Pending {
                result.restored += 1;
            }
            if self.store.insert(entry) {
                result.added += 1;
            }
        }

        info!(
            "{} entries added ({} restored from registry, {} duplicates skipped)",
            result.added, result.restored, result.duplicates
        );
        result
    }

    /// Drive every admissible entry through analysis.
    ///
    /// Entries left `analyzing` by a run whose future was dropped are put back
    /// to `pending` first; nothing can be in flight at this point. All jobs
    /// are polled on the current task. After each completion the
    /// outcome is applied to the store and the scheduler is asked for more
    /// work; the loop ends once nothing is in flight and nothing is admissible.
    pub async fn run_analysis(
        &mut self,
        extractor: Arc<dyn MetadataExtractor>,
        reporter: &dyn ProgressReporter,
    ) -> AnalysisSummary {
        let start = Instant::now();
        let released = self.store.release_interrupted();
        if released > 0 {
            warn!("{} entries from an interrupted run queued again", released);
        }
        let total = self
            .store
            .entries()
            .iter()
            .filter(|e| e.is_admissible())
            .count();
        reporter.on_analysis_start(total);
        info!(
            "Analyzing {} entries with up to {} concurrent requests",
            total,
            self.scheduler.budget()
        );

        let mut in_flight = FuturesUnordered::new();
        let mut summary = AnalysisSummary {
            analyzed: 0,
            failed: 0,
            discarded: 0,
            duration: Duration::ZERO,
        };
        let mut finished = 0usize;

        loop {
            for job in self.scheduler.admit(&mut self.store) {
                in_flight.push(job.run(Arc::clone(&extractor)));
            }
            debug_assert!(self.store.count(EntryStatus::Analyzing) <= self.scheduler.budget());

            let Some(outcome) = in_flight.next().await else {
                break;
            };

            let file_name = self
                .store
                .get(outcome.id)
                .map(|e| e.original_name.clone())
                .unwrap_or_default();
            let status = analysis::complete(&mut self.store, outcome);
            match status {
                Some(EntryStatus::Done) => summary.analyzed += 1,
                Some(EntryStatus::Error) => summary.failed += 1,
                _ => summary.discarded += 1,
            }
            finished += 1;
            if let Some(status) = status {
                reporter.on_entry_analyzed(&file_name, status, finished, total);
            }
        }

        summary.duration = start.elapsed();
        info!(
            "Analysis finished: {} analyzed, {} failed in {:.2}s",
            summary.analyzed,
            summary.failed,
            summary.duration.as_secs_f64()
        );
        reporter.on_analysis_complete(
            summary.analyzed,
            summary.failed,
            summary.duration.as_secs_f64(),
        );
        summary
    }

    pub fn retry_errors(&mut self) -> usize {
        self.store.retry_errors()
    }

    pub fn manual_edit(&mut self, id: EntryId, new_name: &str) -> Result<(), EditError> {
        self.store.manual_edit(id, new_name)
    }

    /// Look an entry up by original name, relative path or suggested name.
    pub fn find(&self, name: &str) -> Option<EntryId> {
        self.store
            .entries()
            .iter()
            .find(|e| {
                e.original_name == name || e.relative_path == name || e.suggested_name == name
            })
            .map(|e| e.id)
    }

    pub async fn rename_one(
        &mut self,
        id: EntryId,
        renamer: &dyn Renamer,
    ) -> Result<(), RenameError> {
        rename::rename_one(&mut self.store, id, renamer, "individually").await
    }

    pub async fn rename_batch(
        &mut self,
        renamer: &dyn Renamer,
        reporter: &dyn ProgressReporter,
    ) -> BatchRename {
        rename::rename_batch(&mut self.store, renamer, reporter).await
    }

    pub fn rename_script(&self, kind: ScriptKind) -> String {
        script::rename_script(self.store.entries(), kind)
    }

    /// Optimistically mark `done` entries as renamed once the offline script
    /// has been handed over.
    pub fn mark_script_renamed(&mut self, kind: ScriptKind) -> usize {
        let note = format!("Offline rename script ({}) generated.", kind.file_name());
        let count = self.store.mark_script_renamed(&note);
        info!("{} entries marked renamed via {}", count, kind.file_name());
        count
    }

    /// Records for every session entry, followed by the imported records of
    /// files this session never saw, unchanged.
    pub fn export_registry(&self, now: DateTime<Utc>) -> Vec<RegistryRecord> {
        let entries = self.store.entries();
        let mut records = Registry::export(entries, now);
        let carried = self.registry.unclaimed(entries);
        if !carried.is_empty() {
            debug!("Carrying {} records of files outside this session", carried.len());
        }
        records.extend(carried.into_iter().cloned());
        records
    }

    pub fn export_json(&self) -> Result<String, RegistryError> {
        Registry::to_json_pretty(&self.export_registry(Utc::now()))
    }

    /// Discard every entry and the imported registry. The next discovery
    /// behaves like a first session.
    pub fn reset(&mut self) {
        self.store.clear();
        self.registry = Registry::new();
        info!("Session reset");
    }
}
