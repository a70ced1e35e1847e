//! Persisted projection of the entry store and the merge that resumes a
//! previous session from it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::fingerprint::Fingerprint;
use crate::model::{EntryStatus, IssueMetadata, LibraryEntry, LogAction, LogEntry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryRecord {
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub original_path: String,
    #[serde(default)]
    pub current_name: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub last_modified: i64,
    #[serde(default)]
    pub metadata: Option<IssueMetadata>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub is_manual_override: bool,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub last_updated: String,
}

impl RegistryRecord {
    pub fn from_entry(entry: &LibraryEntry, now: DateTime<Utc>) -> Self {
        RegistryRecord {
            fingerprint: Some(entry.fingerprint.to_string()),
            original_path: entry.relative_path.clone(),
            current_name: entry.suggested_name.clone(),
            file_size: entry.size,
            last_modified: entry.last_modified,
            metadata: entry.metadata.clone(),
            status: persisted_status(entry.status).as_str().to_string(),
            is_manual_override: entry.manual_override,
            logs: entry.log.clone(),
            last_updated: now.to_rfc3339(),
        }
    }
}

/// An analysis that never finished is saved as not yet started.
fn persisted_status(status: EntryStatus) -> EntryStatus {
    match status {
        EntryStatus::Analyzing => EntryStatus::Pending,
        other => other,
    }
}

/// Imported registry: records keyed by fingerprint with a secondary
/// `current_name` lookup. Immutable once built.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    records: Vec<RegistryRecord>,
    by_fingerprint: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All-or-nothing import: the document must be a JSON array of records.
    /// Records without a fingerprint are ignored; a later record with the same
    /// fingerprint replaces an earlier one.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let value: Value = serde_json::from_str(json)?;
        if !value.is_array() {
            return Err(RegistryError::NotAnArray);
        }
        let records: Vec<RegistryRecord> = serde_json::from_value(value)?;
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: impl IntoIterator<Item = RegistryRecord>) -> Self {
        let mut registry = Registry::new();
        let mut ignored = 0usize;

        for record in records {
            let Some(fingerprint) = record.fingerprint.clone().filter(|f| !f.is_empty()) else {
                ignored += 1;
                continue;
            };
            match registry.by_fingerprint.get(&fingerprint) {
                Some(&i) => registry.records[i] = record,
                None => {
                    registry.by_fingerprint.insert(fingerprint, registry.records.len());
                    registry.records.push(record);
                }
            }
        }

        for (i, record) in registry.records.iter().enumerate() {
            if !record.current_name.is_empty() {
                registry.by_name.insert(record.current_name.clone(), i);
            }
        }

        if ignored > 0 {
            debug!("Ignored {} registry records without a fingerprint", ignored);
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RegistryRecord] {
        &self.records
    }

    pub fn by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<&RegistryRecord> {
        self.by_fingerprint
            .get(fingerprint.as_str())
            .map(|&i| &self.records[i])
    }

    pub fn by_current_name(&self, name: &str) -> Option<&RegistryRecord> {
        self.by_name.get(name).map(|&i| &self.records[i])
    }

    pub fn export(entries: &[LibraryEntry], now: DateTime<Utc>) -> Vec<RegistryRecord> {
        entries
            .iter()
            .map(|entry| RegistryRecord::from_entry(entry, now))
            .collect()
    }

    /// Imported records that no session entry took over, either by
    /// fingerprint or by a file currently carrying the record's name. These
    /// belong to files outside this session and must survive the next export.
    pub fn unclaimed<'a>(&'a self, entries: &[LibraryEntry]) -> Vec<&'a RegistryRecord> {
        let fingerprints: HashSet<&str> = entries.iter().map(|e| e.fingerprint.as_str()).collect();
        let names: HashSet<&str> = entries.iter().map(|e| e.original_name.as_str()).collect();

        self.records
            .iter()
            .filter(|record| {
                let fingerprint = record.fingerprint.as_deref().unwrap_or_default();
                !fingerprints.contains(fingerprint) && !names.contains(record.current_name.as_str())
            })
            .collect()
    }

    pub fn to_json_pretty(records: &[RegistryRecord]) -> Result<String, RegistryError> {
        Ok(serde_json::to_string_pretty(records)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    Fingerprint,
    FileName,
}

/// Reconcile freshly discovered entries against an imported registry.
///
/// Fingerprint matches adopt the persisted state (`renamed` stays `renamed`,
/// anything else becomes `done`). Otherwise a record whose `current_name`
/// equals the file's name marks the entry as already renamed by an earlier
/// run; this is a heuristic, and an unrelated file that happens to share the
/// name is classified the same way. Unmatched entries pass through as-is.
/// The registry log is kept in order and a single RESTORE line is appended.
pub fn merge(
    batch: Vec<LibraryEntry>,
    registry: &Registry,
    now: DateTime<Utc>,
) -> Vec<LibraryEntry> {
    let mut restored = 0usize;

    let merged: Vec<LibraryEntry> = batch
        .into_iter()
        .map(|entry| {
            if let Some(record) = registry.by_fingerprint(&entry.fingerprint) {
                restored += 1;
                let status = if record.status == EntryStatus::Renamed.as_str() {
                    EntryStatus::Renamed
                } else {
                    EntryStatus::Done
                };
                return adopt(entry, record, status, MatchKind::Fingerprint, now);
            }

            if let Some(record) = registry.by_current_name(&entry.original_name) {
                restored += 1;
                let status = if record.status == EntryStatus::Skipped.as_str() {
                    EntryStatus::Skipped
                } else {
                    EntryStatus::Renamed
                };
                return adopt(entry, record, status, MatchKind::FileName, now);
            }

            entry
        })
        .collect();

    info!(
        "Registry merge: {} of {} entries restored",
        restored,
        merged.len()
    );
    merged
}

fn adopt(
    entry: LibraryEntry,
    record: &RegistryRecord,
    status: EntryStatus,
    kind: MatchKind,
    now: DateTime<Utc>,
) -> LibraryEntry {
    let message = match kind {
        MatchKind::Fingerprint => "Record restored (fingerprint match).",
        MatchKind::FileName => "Record restored (file name match).",
    };
    debug!("{}: {}", entry.relative_path, message);

    let mut log = record.logs.clone();
    log.push(LogEntry::at(now, LogAction::Restore, message));

    LibraryEntry {
        status,
        metadata: record.metadata.clone(),
        suggested_name: record.current_name.clone(),
        manual_override: record.is_manual_override,
        last_error: None,
        log,
        ..entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiscoveredFile, PLACEHOLDER_NAME};
    use std::path::PathBuf;

    fn fresh(relative_path: &str, size: u64) -> LibraryEntry {
        LibraryEntry::from_discovered(DiscoveredFile {
            path: PathBuf::from("/library").join(relative_path),
            relative_path: relative_path.to_string(),
            size,
            last_modified: 1_700_000_000_000,
            write_handle: None,
        })
    }

    fn metadata() -> IssueMetadata {
        IssueMetadata {
            official_title: "Chefe de Fase".into(),
            magazine_edition: "7".into(),
            magazine_section: "Chefe de Fase".into(),
            rpg_system: "3D&T".into(),
            content_type: "Ficha".into(),
            summary: "Um chefe.".into(),
            filename_slug: "Chefe_De_Fase".into(),
        }
    }

    fn record_for(entry: &LibraryEntry, status: &str, name: &str) -> RegistryRecord {
        RegistryRecord {
            fingerprint: Some(entry.fingerprint.to_string()),
            original_path: entry.relative_path.clone(),
            current_name: name.to_string(),
            file_size: entry.size,
            last_modified: entry.last_modified,
            metadata: Some(metadata()),
            status: status.to_string(),
            is_manual_override: false,
            logs: vec![
                LogEntry::now(LogAction::Scan, "File detected."),
                LogEntry::now(LogAction::Analyze, "DB 007"),
            ],
            last_updated: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_fingerprint_match_restores_state_and_appends_one_restore() {
        let entry = fresh("a.pdf", 10);
        let registry = Registry::from_records([record_for(&entry, "done", "DB_007_Chefe_De_Fase.pdf")]);

        let merged = merge(vec![entry.clone()], &registry, Utc::now());
        let m = &merged[0];
        assert_eq!(m.id, entry.id);
        assert_eq!(m.status, EntryStatus::Done);
        assert_eq!(m.suggested_name, "DB_007_Chefe_De_Fase.pdf");
        assert_eq!(m.metadata, Some(metadata()));
        assert_eq!(m.log.len(), 3);
        assert_eq!(m.log[0].action, LogAction::Scan);
        assert_eq!(m.log[2].action, LogAction::Restore);
    }

    #[test]
    fn test_persisted_statuses_map_to_done_or_renamed() {
        let a = fresh("a.pdf", 1);
        let b = fresh("b.pdf", 2);
        let c = fresh("c.pdf", 3);
        let registry = Registry::from_records([
            record_for(&a, "renamed", "DB_001_A.pdf"),
            record_for(&b, "error", "b.pdf"),
            record_for(&c, "pending", "c.pdf"),
        ]);

        let merged = merge(vec![a, b, c], &registry, Utc::now());
        let statuses: Vec<_> = merged.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![EntryStatus::Renamed, EntryStatus::Done, EntryStatus::Done]
        );
    }

    #[test]
    fn test_file_name_fallback_forces_renamed() {
        let old = fresh("old.pdf", 10);
        let registry = Registry::from_records([record_for(&old, "done", "DB_007_Chefe_De_Fase.pdf")]);

        // Same file after a rename: new path, new fingerprint.
        let renamed_on_disk = fresh("DB_007_Chefe_De_Fase.pdf", 10);
        let merged = merge(vec![renamed_on_disk], &registry, Utc::now());
        assert_eq!(merged[0].status, EntryStatus::Renamed);
        assert_eq!(merged[0].log.len(), 3);
        assert_eq!(
            merged[0].log.last().unwrap().message,
            "Record restored (file name match)."
        );
    }

    #[test]
    fn test_file_name_fallback_keeps_skipped() {
        let old = fresh("old.pdf", 10);
        let registry = Registry::from_records([record_for(&old, "skipped", "kept.pdf")]);
        let merged = merge(vec![fresh("kept.pdf", 99)], &registry, Utc::now());
        assert_eq!(merged[0].status, EntryStatus::Skipped);
    }

    #[test]
    fn test_unmatched_entries_are_untouched() {
        let entry = fresh("new.pdf", 10);
        let merged = merge(vec![entry.clone()], &Registry::new(), Utc::now());
        assert_eq!(merged[0].status, EntryStatus::Pending);
        assert_eq!(merged[0].suggested_name, PLACEHOLDER_NAME);
        assert_eq!(merged[0].log, entry.log);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let entry = fresh("a.pdf", 10);
        let registry = Registry::from_records([record_for(&entry, "done", "DB_007_X.pdf")]);
        let now = Utc::now();
        let first = merge(vec![entry.clone()], &registry, now);
        let second = merge(vec![entry], &registry, now);
        assert_eq!(first[0].log, second[0].log);
        assert_eq!(first[0].status, second[0].status);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_import_rejects_non_arrays() {
        assert!(matches!(
            Registry::from_json(r#"{"fingerprint": "x"}"#),
            Err(RegistryError::NotAnArray)
        ));
        assert!(matches!(
            Registry::from_json("not json"),
            Err(RegistryError::Json(_))
        ));
    }

    #[test]
    fn test_import_ignores_records_without_fingerprint() {
        let json = r#"[
            {"fingerprint": "a.pdf::1::2", "currentName": "DB_001_A.pdf", "status": "done",
             "logs": [{"timestamp": "2024-05-01T10:00:00.000Z", "action": "ANALYZE", "message": "ok"}]},
            {"currentName": "orphan.pdf", "status": "done"},
            {"fingerprint": "", "currentName": "blank.pdf"}
        ]"#;
        let registry = Registry::from_json(json).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.by_current_name("orphan.pdf").is_none());
        let record = registry
            .by_fingerprint(&Fingerprint::from("a.pdf::1::2".to_string()))
            .unwrap();
        assert_eq!(record.logs[0].action, LogAction::Analyze);
    }

    #[test]
    fn test_export_uses_wire_field_names() {
        let entry = fresh("a.pdf", 10);
        let records = Registry::export(&[entry], Utc::now());
        let json = Registry::to_json_pretty(&records).unwrap();
        for field in [
            "fingerprint",
            "originalPath",
            "currentName",
            "fileSize",
            "lastModified",
            "metadata",
            "status",
            "isManualOverride",
            "logs",
            "lastUpdated",
        ] {
            assert!(json.contains(&format!("\"{}\"", field)), "missing {}", field);
        }
        assert!(json.contains("\"SCAN\""));
    }

    #[test]
    fn test_unclaimed_records_exclude_session_files() {
        let a = fresh("a.pdf", 1);
        let b = fresh("b.pdf", 2);
        let c = fresh("c.pdf", 3);
        let registry = Registry::from_records(vec![
            record_for(&a, "done", "DB_001_A.pdf"),
            record_for(&b, "renamed", "DB_002_B.pdf"),
            record_for(&c, "done", "DB_003_C.pdf"),
        ]);

        let renamed_b = fresh("DB_002_B.pdf", 2);
        let unclaimed = registry.unclaimed(&[a.clone(), renamed_b]);
        let names: Vec<_> = unclaimed.iter().map(|r| r.current_name.as_str()).collect();
        assert_eq!(names, vec!["DB_003_C.pdf"]);
    }

    #[test]
    fn test_interrupted_analysis_exports_as_pending() {
        let mut entry = fresh("a.pdf", 1);
        entry.status = EntryStatus::Analyzing;
        let record = RegistryRecord::from_entry(&entry, Utc::now());
        assert_eq!(record.status, "pending");
    }
}
