use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::{EditError, TransitionError};
use crate::fingerprint::Fingerprint;
use crate::model::{EntryId, EntryStatus, LibraryEntry, LogAction};
use crate::naming::is_plain_file_name;

/// Ordered in-memory collection of library entries.
///
/// Entries live in a vector in discovery order and are addressed through an
/// `EntryId -> index` map. Every mutation replaces a whole entry, so callers
/// never observe a partially updated one.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: Vec<LibraryEntry>,
    index: HashMap<EntryId, usize>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&LibraryEntry> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    pub fn count(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn contains_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.iter().any(|e| &e.fingerprint == fingerprint)
    }

    /// Append a new entry. Returns false when the id is already present.
    pub fn insert(&mut self, entry: LibraryEntry) -> bool {
        if self.index.contains_key(&entry.id) {
            return false;
        }
        self.index.insert(entry.id, self.entries.len());
        self.entries.push(entry);
        true
    }

    /// Replace the entry with the same id, or append it.
    pub fn upsert(&mut self, entry: LibraryEntry) {
        match self.index.get(&entry.id) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.insert(entry);
            }
        }
    }

    /// Copy-on-write update: the closure receives a clone and its result
    /// replaces the stored entry. Returns false for unknown ids.
    pub fn update<F>(&mut self, id: EntryId, f: F) -> bool
    where
        F: FnOnce(LibraryEntry) -> LibraryEntry,
    {
        let Some(&i) = self.index.get(&id) else {
            return false;
        };
        let updated = f(self.entries[i].clone());
        debug_assert_eq!(updated.id, id, "an entry's identity never changes");
        self.entries[i] = updated;
        true
    }

    pub fn transition(&mut self, id: EntryId, next: EntryStatus) -> Result<(), TransitionError> {
        let current = self
            .get(id)
            .map(|e| e.status)
            .ok_or(TransitionError::UnknownEntry(id))?;
        if !current.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                from: current,
                to: next,
            });
        }
        trace!("{} {} -> {}", id, current, next);
        self.update(id, |mut entry| {
            entry.status = next;
            entry
        });
        Ok(())
    }

    /// Reset every failed entry to `pending` so the scheduler picks it up again.
    pub fn retry_errors(&mut self) -> usize {
        let failed: Vec<EntryId> = self
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Error)
            .map(|e| e.id)
            .collect();

        for id in &failed {
            self.update(*id, |mut entry| {
                entry.status = EntryStatus::Pending;
                entry.last_error = None;
                entry.with_log(LogAction::Restore, "Retrying analysis.")
            });
        }
        debug!("{} failed entries reset to pending", failed.len());
        failed.len()
    }

    /// Human override of the suggested name. The entry lands in `done` and is
    /// never analyzed again. The name must stay within the file's folder.
    pub fn manual_edit(&mut self, id: EntryId, new_name: &str) -> Result<(), EditError> {
        let entry = self.get(id).ok_or(EditError::UnknownEntry(id))?;
        if entry.status == EntryStatus::Skipped {
            return Err(EditError::Skipped);
        }
        if !is_plain_file_name(new_name.trim()) {
            return Err(EditError::InvalidName(new_name.to_string()));
        }

        let new_name = new_name.trim().to_string();
        self.update(id, |entry| {
            let message = format!(
                "Name manually edited from '{}' to '{}'",
                entry.suggested_name, new_name
            );
            let mut entry = entry.with_log(LogAction::Edit, message);
            entry.suggested_name = new_name;
            entry.manual_override = true;
            entry.status = EntryStatus::Done;
            entry.last_error = None;
            entry
        });
        Ok(())
    }

    /// Marks `done` entries that carry a real target name as `renamed` once an
    /// offline rename script has been handed to the user.
    pub fn mark_script_renamed(&mut self, note: &str) -> usize {
        let done: Vec<EntryId> = self
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Done && e.has_target_name())
            .map(|e| e.id)
            .collect();

        for id in &done {
            self.update(*id, |mut entry| {
                entry.status = EntryStatus::Renamed;
                entry.with_log(LogAction::Rename, note)
            });
        }
        done.len()
    }

    /// Put entries left `analyzing` by an abandoned analysis run back to
    /// `pending`. Only valid while no job is in flight.
    pub fn release_interrupted(&mut self) -> usize {
        let stalled: Vec<EntryId> = self
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Analyzing)
            .map(|e| e.id)
            .collect();

        for id in &stalled {
            self.update(*id, |mut entry| {
                entry.status = EntryStatus::Pending;
                entry.with_log(LogAction::Restore, "Analysis interrupted; queued again.")
            });
        }
        if !stalled.is_empty() {
            debug!("{} interrupted entries reset to pending", stalled.len());
        }
        stalled.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
