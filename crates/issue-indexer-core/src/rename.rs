use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::RenameError;
use crate::model::{EntryId, EntryStatus, LogAction, WriteHandle};
use crate::naming::is_plain_file_name;
use crate::progress::ProgressReporter;
use crate::store::EntryStore;

/// Rename capability of the discovery adapter.
#[async_trait]
pub trait Renamer: Send + Sync {
    /// Rename the file behind `handle` to `new_name` within its directory and
    /// return a handle to the renamed file.
    async fn rename(&self, handle: &WriteHandle, new_name: &str) -> Result<WriteHandle, RenameError>;
}

/// Renames files on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRenamer;

#[async_trait]
impl Renamer for FsRenamer {
    async fn rename(&self, handle: &WriteHandle, new_name: &str) -> Result<WriteHandle, RenameError> {
        if !is_plain_file_name(new_name) {
            return Err(RenameError::InvalidName(new_name.to_string()));
        }
        let source = handle.path();
        let target = source.with_file_name(new_name);
        if target.as_path() == source {
            return Ok(handle.clone());
        }
        if tokio::fs::try_exists(&target).await? {
            return Err(RenameError::TargetExists(target));
        }
        tokio::fs::rename(source, &target).await?;
        Ok(WriteHandle::new(target))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub renamed: Vec<EntryId>,
    pub failed: Vec<(EntryId, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRename {
    /// No entry has write access; nothing was touched. The caller should hand
    /// out an offline rename script for these entries instead.
    Offline { pending: usize },
    Completed(BatchReport),
}

/// Apply one entry's suggested name. On success the entry becomes `renamed`;
/// on failure it stays `done` with an ERROR line in its log. An entry still
/// carrying the placeholder name (restored but never analyzed) is refused.
pub async fn rename_one(
    store: &mut EntryStore,
    id: EntryId,
    renamer: &dyn Renamer,
    context: &str,
) -> Result<(), RenameError> {
    let entry = store.get(id).ok_or(RenameError::UnknownEntry(id))?;
    if entry.status != EntryStatus::Done {
        return Err(RenameError::NotReady(entry.status));
    }
    let name = entry.suggested_name.clone();
    let handle = entry.write_handle.clone();
    let has_target = entry.has_target_name();

    let result = match handle {
        None => Err(RenameError::NoWriteAccess),
        Some(_) if !has_target => Err(RenameError::MissingName),
        Some(handle) => renamer.rename(&handle, &name).await,
    };

    match result {
        Ok(new_handle) => {
            debug!("Renamed {} -> {}", entry_name(store, id), name);
            store.update(id, |entry| {
                let mut entry =
                    entry.with_log(LogAction::Rename, format!("Renamed {} to {}", context, name));
                entry.write_handle = Some(new_handle);
                entry.status = EntryStatus::Renamed;
                entry
            });
            Ok(())
        }
        Err(err) => {
            warn!("Failed to rename {}: {}", entry_name(store, id), err);
            let message = format!("Rename failed: {}", err);
            store.update(id, |entry| entry.with_log(LogAction::Error, message));
            Err(err)
        }
    }
}

/// Rename every `done` entry whose suggested name differs from its original,
/// one at a time. A failure never stops the rest of the batch.
pub async fn rename_batch(
    store: &mut EntryStore,
    renamer: &dyn Renamer,
    reporter: &dyn ProgressReporter,
) -> BatchRename {
    let targets: Vec<EntryId> = store
        .entries()
        .iter()
        .filter(|e| e.needs_rename())
        .map(|e| e.id)
        .collect();

    if !store.entries().iter().any(|e| e.write_handle.is_some()) {
        info!("No entry has write access; offline rename script required");
        return BatchRename::Offline {
            pending: targets.len(),
        };
    }

    reporter.on_rename_start(targets.len());
    let mut report = BatchReport::default();

    for (i, id) in targets.iter().enumerate() {
        match rename_one(store, *id, renamer, "in batch").await {
            Ok(()) => report.renamed.push(*id),
            Err(err) => report.failed.push((*id, err.to_string())),
        }
        reporter.on_rename_progress(i + 1, targets.len());
    }

    info!(
        "Batch rename finished: {} renamed, {} failed",
        report.renamed.len(),
        report.failed.len()
    );
    reporter.on_rename_complete(report.renamed.len(), report.failed.len());
    BatchRename::Completed(report)
}

fn entry_name(store: &EntryStore, id: EntryId) -> String {
    store
        .get(id)
        .map(|e| e.original_name.clone())
        .unwrap_or_else(|| id.to_string())
}
