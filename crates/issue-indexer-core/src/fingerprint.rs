use std::fmt;
use std::fs::Metadata;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

/// Identity of a file across sessions: `relative_path::size::mtime_ms`.
///
/// Built from facts already gathered during discovery, so computing it never
/// touches the file contents. Any change to path, size or modification time
/// yields a different fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(relative_path: &str, size: u64, last_modified_ms: i64) -> Self {
        Fingerprint(format!("{}::{}::{}", relative_path, size, last_modified_ms))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Fingerprint(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Modification time in milliseconds since the Unix epoch, 0 when unavailable.
pub fn modified_millis(metadata: &Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
