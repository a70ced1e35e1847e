use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use issue_indexer_core::error::{ExtractionError, RegistryError, RenameError};
use issue_indexer_core::extractor::MetadataExtractor;
use issue_indexer_core::model::{EntryStatus, IssueMetadata, LogAction, PLACEHOLDER_NAME};
use issue_indexer_core::registry::Registry;
use issue_indexer_core::scanner::{discover, discover_files};
use issue_indexer_core::{BatchRename, FsRenamer, IndexEngine, ScriptKind, SilentReporter};
use tempfile::tempdir;

struct FixedExtractor;

#[async_trait]
impl MetadataExtractor for FixedExtractor {
    async fn analyze(
        &self,
        _document: &[u8],
        file_name: &str,
    ) -> Result<IssueMetadata, ExtractionError> {
        if file_name.starts_with("bad") {
            return Err(ExtractionError::Blocked);
        }
        Ok(IssueMetadata {
            official_title: "Chefe de Fase".to_string(),
            magazine_edition: "42".to_string(),
            magazine_section: "Chefe de Fase".to_string(),
            rpg_system: "Tormenta".to_string(),
            content_type: "Monstros".to_string(),
            summary: "Um chefe.".to_string(),
            filename_slug: format!("Chefe_{}", file_name.trim_end_matches(".pdf")),
        })
    }
}

fn rediscover(engine: &mut IndexEngine, dir: &Path) {
    engine.load_discovered(discover(dir, &[], false).unwrap());
}

#[tokio::test]
async fn test_exported_session_resumes_without_reanalysis() {
    let dir = tempdir().unwrap();
    for name in ["a.pdf", "b.pdf", "bad.pdf"] {
        fs::write(dir.path().join(name), b"%PDF-1.4").unwrap();
    }

    let mut first = IndexEngine::with_concurrency(3);
    rediscover(&mut first, dir.path());
    first
        .run_analysis(Arc::new(FixedExtractor), &SilentReporter)
        .await;
    let json = first.export_json().unwrap();

    let mut second = IndexEngine::with_concurrency(3);
    assert_eq!(second.import_registry(&json).unwrap(), 3);
    rediscover(&mut second, dir.path());

    for before in first.store().entries() {
        let after = second
            .store()
            .entries()
            .iter()
            .find(|e| e.fingerprint == before.fingerprint)
            .unwrap();
        assert_eq!(after.suggested_name, before.suggested_name);
        assert_eq!(after.metadata, before.metadata);
        assert_eq!(after.log.len(), before.log.len() + 1);
        assert_eq!(&after.log[..before.log.len()], &before.log[..]);
        let restore = after.log.last().unwrap();
        assert_eq!(restore.action, LogAction::Restore);
        assert_eq!(restore.message, "Record restored (fingerprint match).");
    }

    // Persisted errors come back as done and are not retried.
    let bad = second.find("bad.pdf").unwrap();
    assert_eq!(second.store().get(bad).unwrap().status, EntryStatus::Done);
    assert_eq!(second.store().count(EntryStatus::Done), 3);
    assert_eq!(second.retry_errors(), 0);
}

#[tokio::test]
async fn test_renamed_files_are_recognized_by_name() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), b"%PDF-1.4").unwrap();

    let mut first = IndexEngine::with_concurrency(3);
    rediscover(&mut first, dir.path());
    first
        .run_analysis(Arc::new(FixedExtractor), &SilentReporter)
        .await;
    let id = first.find("a.pdf").unwrap();
    first.rename_one(id, &FsRenamer).await.unwrap();
    let json = first.export_json().unwrap();

    // The renamed file has a new relative path and therefore a new fingerprint.
    let mut second = IndexEngine::with_concurrency(3);
    second.import_registry(&json).unwrap();
    rediscover(&mut second, dir.path());

    let entry = &second.store().entries()[0];
    assert_eq!(entry.original_name, "DB_042_Chefe_a.pdf");
    assert_eq!(entry.status, EntryStatus::Renamed);
    assert_eq!(
        entry.log.last().unwrap().message,
        "Record restored (file name match)."
    );
}

#[tokio::test]
async fn test_reset_forgets_history() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), b"%PDF-1.4").unwrap();

    let mut engine = IndexEngine::with_concurrency(3);
    rediscover(&mut engine, dir.path());
    engine
        .run_analysis(Arc::new(FixedExtractor), &SilentReporter)
        .await;
    let json = engine.export_json().unwrap();
    engine.import_registry(&json).unwrap();

    engine.reset();
    assert!(engine.store().is_empty());
    assert!(engine.registry().is_empty());

    rediscover(&mut engine, dir.path());
    let entry = &engine.store().entries()[0];
    assert_eq!(entry.status, EntryStatus::Pending);
    assert!(entry
        .log
        .iter()
        .all(|line| line.action != LogAction::Restore));
}

#[test]
fn test_malformed_registry_keeps_previous_state() {
    let mut engine = IndexEngine::with_concurrency(3);
    let valid = r#"[{"fingerprint": "a.pdf::1::2", "currentName": "DB_001_A.pdf", "status": "done"}]"#;
    assert_eq!(engine.import_registry(valid).unwrap(), 1);

    assert!(matches!(
        engine.import_registry("{\"not\": \"an array\"}"),
        Err(RegistryError::NotAnArray)
    ));
    assert!(matches!(
        engine.import_registry("[{"),
        Err(RegistryError::Json(_))
    ));
    assert_eq!(engine.registry().len(), 1);
    assert!(engine.registry().by_current_name("DB_001_A.pdf").is_some());
}

#[tokio::test]
async fn test_export_keeps_records_of_files_outside_the_session() {
    let dir = tempdir().unwrap();
    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        fs::write(dir.path().join(name), b"%PDF-1.4").unwrap();
    }

    let mut first = IndexEngine::with_concurrency(3);
    rediscover(&mut first, dir.path());
    first
        .run_analysis(Arc::new(FixedExtractor), &SilentReporter)
        .await;
    let c = first.find("c.pdf").unwrap();
    first.manual_edit(c, "DB_042_Mine.pdf").unwrap();
    let json = first.export_json().unwrap();

    let mut second = IndexEngine::with_concurrency(3);
    assert_eq!(second.import_registry(&json).unwrap(), 3);
    second.load_discovered(discover_files(&[dir.path().join("a.pdf")], false).unwrap());
    assert_eq!(second.store().len(), 1);

    let records = second.export_registry(Utc::now());
    assert_eq!(records.len(), 3);
    let carried = records
        .iter()
        .find(|r| r.original_path == "c.pdf")
        .unwrap();
    assert_eq!(carried.current_name, "DB_042_Mine.pdf");
    assert!(carried.is_manual_override);
    assert!(carried.metadata.is_some());
    assert_eq!(
        carried.logs.last().unwrap().action,
        LogAction::Edit,
        "records of unseen files are carried over unchanged"
    );

    let reloaded = Registry::from_json(&Registry::to_json_pretty(&records).unwrap()).unwrap();
    assert_eq!(reloaded.len(), 3);
}

#[tokio::test]
async fn test_restored_failure_keeps_its_file_name() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("bad.pdf"), b"%PDF-1.4").unwrap();

    let mut first = IndexEngine::with_concurrency(3);
    rediscover(&mut first, dir.path());
    first
        .run_analysis(Arc::new(FixedExtractor), &SilentReporter)
        .await;
    let json = first.export_json().unwrap();

    let mut second = IndexEngine::with_concurrency(3);
    second.import_registry(&json).unwrap();
    rediscover(&mut second, dir.path());
    let id = second.find("bad.pdf").unwrap();
    let entry = second.store().get(id).unwrap();
    assert_eq!(entry.status, EntryStatus::Done);
    assert_eq!(entry.suggested_name, PLACEHOLDER_NAME);
    assert!(!entry.needs_rename());

    match second.rename_batch(&FsRenamer, &SilentReporter).await {
        BatchRename::Completed(report) => {
            assert!(report.renamed.is_empty());
            assert!(report.failed.is_empty());
        }
        other => panic!("expected a completed batch, got {:?}", other),
    }
    assert!(dir.path().join("bad.pdf").exists());
    assert!(!dir.path().join(PLACEHOLDER_NAME).exists());

    let err = second.rename_one(id, &FsRenamer).await.unwrap_err();
    assert!(matches!(err, RenameError::MissingName));
    let entry = second.store().get(id).unwrap();
    assert_eq!(entry.status, EntryStatus::Done);
    assert_eq!(entry.log.last().unwrap().action, LogAction::Error);
    assert!(dir.path().join("bad.pdf").exists());

    assert!(!second.rename_script(ScriptKind::Shell).contains("bad.pdf"));
    assert_eq!(second.mark_script_renamed(ScriptKind::Shell), 0);
}
