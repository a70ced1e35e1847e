use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::extractor::MetadataExtractor;
use crate::model::{EntryId, EntryStatus, IssueMetadata, LibraryEntry, LogAction};
use crate::naming::{derive_name, normalize_edition};
use crate::store::EntryStore;

/// One unit of analysis work, detached from the store so it can run while
/// other entries are being updated.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    id: EntryId,
    file_name: String,
    source: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Analyzed {
    pub metadata: IssueMetadata,
    pub suggested_name: String,
}

#[derive(Debug)]
pub struct AnalysisOutcome {
    pub id: EntryId,
    pub result: Result<Analyzed, AnalysisError>,
}

impl AnalysisJob {
    /// Refuses entries that carry a manual override or are already analyzed.
    pub fn new(entry: &LibraryEntry) -> Option<Self> {
        if entry.is_locked() {
            debug!("Refusing to analyze locked entry {}", entry.original_name);
            return None;
        }
        Some(Self {
            id: entry.id,
            file_name: entry.original_name.clone(),
            source: entry.source_path.clone(),
        })
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub async fn run(self, extractor: Arc<dyn MetadataExtractor>) -> AnalysisOutcome {
        let result = analyze_document(&self.source, &self.file_name, extractor.as_ref()).await;
        AnalysisOutcome {
            id: self.id,
            result,
        }
    }
}

async fn analyze_document(
    source: &Path,
    file_name: &str,
    extractor: &dyn MetadataExtractor,
) -> Result<Analyzed, AnalysisError> {
    let document = tokio::fs::read(source).await?;
    if document.is_empty() {
        return Err(AnalysisError::EmptyDocument);
    }

    let metadata = extractor.analyze(&document, file_name).await?;
    let suggested_name = derive_name(&metadata.magazine_edition, &metadata.filename_slug);
    Ok(Analyzed {
        metadata,
        suggested_name,
    })
}

/// Apply a finished job to the store.
///
/// Returns the entry's new status, or `None` when the result was discarded:
/// the entry is gone (full reset) or it left `analyzing` while the job was in
/// flight (manual edit).
pub fn complete(store: &mut EntryStore, outcome: AnalysisOutcome) -> Option<EntryStatus> {
    let AnalysisOutcome { id, result } = outcome;

    let Some(entry) = store.get(id) else {
        debug!("Discarding analysis result for {}: entry no longer exists", id);
        return None;
    };
    if entry.status != EntryStatus::Analyzing || entry.manual_override {
        debug!(
            "Discarding analysis result for {}: entry is {}",
            entry.original_name, entry.status
        );
        return None;
    }

    match result {
        Ok(Analyzed {
            metadata,
            suggested_name,
        }) => {
            debug!("{} -> {}", entry.original_name, suggested_name);
            store.update(id, |entry| {
                let message = format!(
                    "DB {} [{}] ({}) - {}",
                    normalize_edition(&metadata.magazine_edition),
                    metadata.rpg_system,
                    metadata.content_type,
                    metadata.official_title
                );
                let mut entry = entry.with_log(LogAction::Analyze, message);
                entry.metadata = Some(metadata);
                entry.suggested_name = suggested_name;
                entry.status = EntryStatus::Done;
                entry.last_error = None;
                entry
            });
            Some(EntryStatus::Done)
        }
        Err(err) => {
            let message = err.to_string();
            warn!("Analysis failed for {}: {}", entry.original_name, message);
            store.update(id, |entry| {
                let mut entry = entry.with_log(LogAction::Error, message.clone());
                entry.status = EntryStatus::Error;
                entry.last_error = Some(message);
                entry
            });
            Some(EntryStatus::Error)
        }
    }
}
