use tracing::{debug, error};

use crate::analysis::AnalysisJob;
use crate::config::DEFAULT_CONCURRENCY;
use crate::model::EntryStatus;
use crate::store::EntryStore;

/// Admits pending entries into analysis without exceeding a fixed budget.
///
/// Admission is derived from entry status alone: an entry is claimed exactly
/// when it is `analyzing`, so there is no separate in-flight set to keep in
/// step with the store.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    budget: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl Scheduler {
    pub fn new(budget: usize) -> Self {
        Self {
            budget: budget.max(1),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// One scheduling pass. Selected entries are marked `analyzing` before the
    /// jobs are handed back, so an overlapping pass can never pick them again.
    pub fn admit(&self, store: &mut EntryStore) -> Vec<AnalysisJob> {
        let analyzing = store.count(EntryStatus::Analyzing);
        if analyzing >= self.budget {
            return Vec::new();
        }

        let candidates: Vec<AnalysisJob> = store
            .entries()
            .iter()
            .filter(|entry| entry.is_admissible())
            .filter_map(AnalysisJob::new)
            .take(self.budget - analyzing)
            .collect();

        let mut admitted = Vec::with_capacity(candidates.len());
        for job in candidates {
            match store.transition(job.id(), EntryStatus::Analyzing) {
                Ok(()) => admitted.push(job),
                Err(e) => error!("Could not admit {}: {}", job.file_name(), e),
            }
        }

        if !admitted.is_empty() {
            debug!(
                "Admitted {} entries ({} already analyzing, budget {})",
                admitted.len(),
                analyzing,
                self.budget
            );
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiscoveredFile, LibraryEntry};
    use std::path::PathBuf;

    fn store_with(n: usize) -> EntryStore {
        let mut store = EntryStore::new();
        for i in 0..n {
            store.insert(LibraryEntry::from_discovered(DiscoveredFile {
                path: PathBuf::from(format!("/library/{}.pdf", i)),
                relative_path: format!("{}.pdf", i),
                size: 10,
                last_modified: 0,
                write_handle: None,
            }));
        }
        store
    }

    #[test]
    fn test_admits_up_to_budget_in_discovery_order() {
        let mut store = store_with(5);
        let scheduler = Scheduler::new(3);

        let jobs = scheduler.admit(&mut store);
        let names: Vec<_> = jobs.iter().map(|j| j.file_name().to_string()).collect();
        assert_eq!(names, vec!["0.pdf", "1.pdf", "2.pdf"]);
        assert_eq!(store.count(EntryStatus::Analyzing), 3);

        // Budget is full: a second pass admits nothing and duplicates nothing.
        assert!(scheduler.admit(&mut store).is_empty());
    }

    #[test]
    fn test_refills_freed_slots_only() {
        let mut store = store_with(5);
        let scheduler = Scheduler::new(3);
        let jobs = scheduler.admit(&mut store);

        store.transition(jobs[0].id(), EntryStatus::Done).unwrap();
        let next = scheduler.admit(&mut store);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].file_name(), "3.pdf");
        assert_eq!(store.count(EntryStatus::Analyzing), 3);
    }

    #[test]
    fn test_never_admits_manual_overrides() {
        let mut store = store_with(2);
        let first = store.entries()[0].id;
        store.update(first, |mut e| {
            e.manual_override = true;
            e
        });

        let jobs = Scheduler::new(3).admit(&mut store);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].file_name(), "1.pdf");
        assert_eq!(store.get(first).unwrap().status, EntryStatus::Pending);
    }

    #[test]
    fn test_zero_budget_is_clamped() {
        assert_eq!(Scheduler::new(0).budget(), 1);
        assert_eq!(Scheduler::default().budget(), 3);
    }
}
