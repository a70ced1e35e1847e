use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::{EntryId, EntryStatus};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("{0}")]
    Transition(#[from] TransitionError),

    #[error("Rename error: {0}")]
    Rename(#[from] RenameError),

    #[error("Edit error: {0}")]
    Edit(#[from] EditError),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("no .pdf documents found under {root}")]
    NoDocuments { root: String },

    #[error("error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures reported by the metadata extraction service.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("the extraction service returned an empty response")]
    EmptyResponse,

    #[error("rate limited by the extraction service (429), wait before retrying")]
    RateLimited,

    #[error("model unavailable or invalid API key (404)")]
    ModelUnavailable,

    #[error("content blocked by the service safety filter")]
    Blocked,

    #[error("malformed extraction response: {0}")]
    Malformed(String),

    #[error("extraction service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(
        "the file is empty (0 bytes); if it lives in a synced cloud folder, make sure it has been fully downloaded"
    )]
    EmptyDocument,

    #[error("could not read the file: {0}")]
    Read(#[from] io::Error),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

#[derive(Error, Debug)]
pub enum RenameError {
    #[error("no write access to the file (read-only mode)")]
    NoWriteAccess,

    #[error("no suggested name to rename to")]
    MissingName,

    #[error("'{0}' is not a plain file name")]
    InvalidName(String),

    #[error("target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("unknown entry {0}")]
    UnknownEntry(EntryId),

    #[error("entry is {0}; only analyzed entries can be renamed")]
    NotReady(EntryStatus),

    #[error("filesystem rename failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid registry JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("registry document must be a JSON array of records")]
    NotAnArray,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("unknown entry {0}")]
    UnknownEntry(EntryId),

    #[error("illegal status transition {from} -> {to}")]
    Illegal { from: EntryStatus, to: EntryStatus },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EditError {
    #[error("unknown entry {0}")]
    UnknownEntry(EntryId),

    #[error("skipped entries cannot be edited")]
    Skipped,

    #[error("'{0}' is not a plain file name; the file must stay in its folder")]
    InvalidName(String),
}
