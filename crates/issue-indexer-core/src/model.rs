use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::Fingerprint;

/// Name shown for an entry until analysis produces a real one.
pub const PLACEHOLDER_NAME: &str = "Awaiting analysis...";

/// Process-local identity of a discovered document. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Analyzing,
    Done,
    Renamed,
    Error,
    Skipped,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Analyzing => "analyzing",
            EntryStatus::Done => "done",
            EntryStatus::Renamed => "renamed",
            EntryStatus::Error => "error",
            EntryStatus::Skipped => "skipped",
        }
    }

    /// Terminal for scheduling purposes. `Done` is terminal for analysis
    /// but still feeds the rename phase, so it is not included.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryStatus::Renamed | EntryStatus::Error | EntryStatus::Skipped
        )
    }

    /// Regular lifecycle edges. Manual edits go through
    /// [`crate::store::EntryStore::manual_edit`] instead.
    pub fn can_transition_to(&self, next: EntryStatus) -> bool {
        use EntryStatus::{Analyzing, Done, Error, Pending, Renamed};
        matches!(
            (self, next),
            (Pending, Analyzing)
                | (Analyzing, Done)
                | (Analyzing, Error)
                | (Done, Renamed)
                | (Done, Done)
                | (Error, Pending)
                | (Renamed, Done)
        )
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EntryStatus::Pending),
            "analyzing" => Ok(EntryStatus::Analyzing),
            "done" => Ok(EntryStatus::Done),
            "renamed" => Ok(EntryStatus::Renamed),
            "error" => Ok(EntryStatus::Error),
            "skipped" => Ok(EntryStatus::Skipped),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogAction {
    Scan,
    Analyze,
    Rename,
    Error,
    Restore,
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: LogAction,
    pub message: String,
}

impl LogEntry {
    pub fn now(action: LogAction, message: impl Into<String>) -> Self {
        Self::at(Utc::now(), action, message)
    }

    pub fn at(timestamp: DateTime<Utc>, action: LogAction, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            action,
            message: message.into(),
        }
    }
}

/// Bibliographic metadata returned by the extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMetadata {
    pub official_title: String,
    pub magazine_edition: String,
    pub magazine_section: String,
    pub rpg_system: String,
    pub content_type: String,
    pub summary: String,
    pub filename_slug: String,
}

/// Write capability for a discovered file: where it currently lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteHandle {
    path: PathBuf,
}

impl WriteHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A file as reported by discovery, before it becomes a [`LibraryEntry`].
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub size: u64,
    pub last_modified: i64,
    pub write_handle: Option<WriteHandle>,
}

impl DiscoveredFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.relative_path.clone())
    }
}

#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub id: EntryId,
    pub fingerprint: Fingerprint,
    pub original_name: String,
    pub relative_path: String,
    pub size: u64,
    pub last_modified: i64,
    pub source_path: PathBuf,
    pub write_handle: Option<WriteHandle>,
    pub status: EntryStatus,
    pub metadata: Option<IssueMetadata>,
    pub suggested_name: String,
    pub manual_override: bool,
    pub last_error: Option<String>,
    pub log: Vec<LogEntry>,
}

impl LibraryEntry {
    /// Fresh `pending` entry with a single SCAN log line.
    pub fn from_discovered(file: DiscoveredFile) -> Self {
        let message = if file.write_handle.is_some() {
            "File detected (write access OK)."
        } else {
            "File detected (read-only mode)."
        };
        let original_name = file.file_name();

        LibraryEntry {
            id: EntryId::new(),
            fingerprint: Fingerprint::compute(&file.relative_path, file.size, file.last_modified),
            original_name,
            relative_path: file.relative_path,
            size: file.size,
            last_modified: file.last_modified,
            source_path: file.path,
            write_handle: file.write_handle,
            status: EntryStatus::Pending,
            metadata: None,
            suggested_name: PLACEHOLDER_NAME.to_string(),
            manual_override: false,
            last_error: None,
            log: vec![LogEntry::now(LogAction::Scan, message)],
        }
    }

    /// Entries the analysis path must never touch again.
    pub fn is_locked(&self) -> bool {
        self.manual_override
            || matches!(self.status, EntryStatus::Done | EntryStatus::Renamed)
    }

    pub fn is_admissible(&self) -> bool {
        self.status == EntryStatus::Pending && !self.is_locked()
    }

    /// The suggested name came from analysis or a manual edit, not the
    /// placeholder a restored but never analyzed record carries.
    pub fn has_target_name(&self) -> bool {
        let name = self.suggested_name.trim();
        !name.is_empty()
            && name != PLACEHOLDER_NAME
            && (self.metadata.is_some() || self.manual_override)
    }

    pub fn needs_rename(&self) -> bool {
        self.status == EntryStatus::Done
            && self.has_target_name()
            && self.suggested_name != self.original_name
    }

    /// Functional update helper: returns the entry with one more log line.
    pub fn with_log(mut self, action: LogAction, message: impl Into<String>) -> Self {
        self.log.push(LogEntry::now(action, message));
        self
    }
}
