use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use issue_indexer_core::error::{EditError, ExtractionError, RenameError};
use issue_indexer_core::extractor::MetadataExtractor;
use issue_indexer_core::model::{EntryStatus, IssueMetadata, LogAction, WriteHandle};
use issue_indexer_core::scanner::discover;
use issue_indexer_core::{
    BatchRename, FsRenamer, IndexEngine, Renamer, ScriptKind, SilentReporter,
};
use tempfile::tempdir;

struct EditionExtractor;

#[async_trait]
impl MetadataExtractor for EditionExtractor {
    async fn analyze(
        &self,
        _document: &[u8],
        file_name: &str,
    ) -> Result<IssueMetadata, ExtractionError> {
        let edition: String = file_name.chars().filter(|c| c.is_ascii_digit()).collect();
        Ok(IssueMetadata {
            official_title: format!("Issue {}", edition),
            magazine_edition: edition.clone(),
            magazine_section: "Capa".to_string(),
            rpg_system: "3D&T".to_string(),
            content_type: "Aventura".to_string(),
            summary: String::new(),
            filename_slug: format!("Issue_{}", edition),
        })
    }
}

/// Filesystem renamer that refuses one specific file.
struct RefusingRenamer {
    refuse: &'static str,
}

#[async_trait]
impl Renamer for RefusingRenamer {
    async fn rename(&self, handle: &WriteHandle, new_name: &str) -> Result<WriteHandle, RenameError> {
        let is_refused = handle
            .path()
            .file_name()
            .map(|n| n == self.refuse)
            .unwrap_or(false);
        if is_refused {
            return Err(RenameError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "file is locked",
            )));
        }
        FsRenamer.rename(handle, new_name).await
    }
}

async fn analyzed_engine(dir: &Path, read_only: bool) -> IndexEngine {
    for i in 1..=5 {
        fs::write(dir.join(format!("scan_{}.pdf", i)), b"%PDF-1.4").unwrap();
    }
    let mut engine = IndexEngine::with_concurrency(3);
    engine.load_discovered(discover(dir, &[], read_only).unwrap());
    engine
        .run_analysis(Arc::new(EditionExtractor), &SilentReporter)
        .await;
    assert_eq!(engine.store().count(EntryStatus::Done), 5);
    engine
}

#[tokio::test]
async fn test_batch_rename_continues_past_failures() {
    let dir = tempdir().unwrap();
    let mut engine = analyzed_engine(dir.path(), false).await;

    let outcome = engine
        .rename_batch(&RefusingRenamer { refuse: "scan_3.pdf" }, &SilentReporter)
        .await;
    let report = match outcome {
        BatchRename::Completed(report) => report,
        other => panic!("expected a completed batch, got {:?}", other),
    };

    assert_eq!(report.renamed.len(), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(engine.store().count(EntryStatus::Renamed), 4);

    let failed = engine.store().get(report.failed[0].0).unwrap();
    assert_eq!(failed.original_name, "scan_3.pdf");
    assert_eq!(failed.status, EntryStatus::Done);
    let last = failed.log.last().unwrap();
    assert_eq!(last.action, LogAction::Error);
    assert!(last.message.starts_with("Rename failed:"));

    assert!(dir.path().join("DB_001_Issue_1.pdf").exists());
    assert!(dir.path().join("DB_005_Issue_5.pdf").exists());
    assert!(dir.path().join("scan_3.pdf").exists());
    assert!(!dir.path().join("scan_1.pdf").exists());

    let renamed = engine.store().get(report.renamed[0]).unwrap();
    assert_eq!(renamed.log.last().unwrap().message, "Renamed in batch to DB_001_Issue_1.pdf");
    assert_eq!(
        renamed.write_handle.as_ref().unwrap().path().file_name().unwrap(),
        "DB_001_Issue_1.pdf"
    );
}

#[tokio::test]
async fn test_single_rename_and_not_ready_entries() {
    let dir = tempdir().unwrap();
    let mut engine = analyzed_engine(dir.path(), false).await;

    let id = engine.find("scan_2.pdf").unwrap();
    engine.rename_one(id, &FsRenamer).await.unwrap();
    let entry = engine.store().get(id).unwrap();
    assert_eq!(entry.status, EntryStatus::Renamed);
    assert_eq!(
        entry.log.last().unwrap().message,
        "Renamed individually to DB_002_Issue_2.pdf"
    );

    match engine.rename_one(id, &FsRenamer).await {
        Err(RenameError::NotReady(EntryStatus::Renamed)) => {}
        other => panic!("expected NotReady, got {:?}", other),
    }
}

#[tokio::test]
async fn test_existing_target_is_not_overwritten() {
    let dir = tempdir().unwrap();
    let mut engine = analyzed_engine(dir.path(), false).await;
    fs::write(dir.path().join("DB_004_Issue_4.pdf"), b"already here").unwrap();

    let id = engine.find("scan_4.pdf").unwrap();
    let err = engine.rename_one(id, &FsRenamer).await.unwrap_err();
    assert!(matches!(err, RenameError::TargetExists(_)));
    assert_eq!(engine.store().get(id).unwrap().status, EntryStatus::Done);
    assert_eq!(
        fs::read(dir.path().join("DB_004_Issue_4.pdf")).unwrap(),
        b"already here"
    );
}

#[tokio::test]
async fn test_read_only_session_falls_back_to_script() {
    let dir = tempdir().unwrap();
    let mut engine = analyzed_engine(dir.path(), true).await;

    let outcome = engine.rename_batch(&FsRenamer, &SilentReporter).await;
    assert_eq!(outcome, BatchRename::Offline { pending: 5 });
    assert!(dir.path().join("scan_1.pdf").exists());

    let script = engine.rename_script(ScriptKind::Shell);
    assert!(script.contains("mv -n 'scan_1.pdf' 'DB_001_Issue_1.pdf'"));
    assert!(script.contains("Done! 5 files processed."));

    assert_eq!(engine.mark_script_renamed(ScriptKind::Shell), 5);
    assert_eq!(engine.store().count(EntryStatus::Renamed), 5);
    let entry = &engine.store().entries()[0];
    assert_eq!(entry.log.last().unwrap().action, LogAction::Rename);
}

#[tokio::test]
async fn test_names_that_leave_the_folder_are_refused() {
    let root = tempdir().unwrap();
    let dir = root.path().join("library");
    fs::create_dir(&dir).unwrap();
    let mut engine = analyzed_engine(&dir, false).await;

    let id = engine.find("scan_1.pdf").unwrap();
    for bad in ["../escaped.pdf", "sub/escaped.pdf", "..\\escaped.pdf", "  "] {
        assert!(
            matches!(engine.manual_edit(id, bad), Err(EditError::InvalidName(_))),
            "{:?} should be refused",
            bad
        );
    }
    let entry = engine.store().get(id).unwrap();
    assert_eq!(entry.suggested_name, "DB_001_Issue_1.pdf");
    assert!(!entry.manual_override);

    let handle = entry.write_handle.clone().unwrap();
    let err = FsRenamer.rename(&handle, "../escaped.pdf").await.unwrap_err();
    assert!(matches!(err, RenameError::InvalidName(_)));
    assert!(dir.join("scan_1.pdf").exists());
    assert!(!root.path().join("escaped.pdf").exists());

    engine.rename_one(id, &FsRenamer).await.unwrap();
    assert!(dir.join("DB_001_Issue_1.pdf").exists());
}
