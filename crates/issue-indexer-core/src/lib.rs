pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod fingerprint;
pub mod model;
pub mod naming;
pub mod progress;
pub mod registry;
pub mod rename;
pub mod scanner;
pub mod scheduler;
pub mod script;
pub mod store;

pub use config::AppConfig;
pub use engine::{AnalysisSummary, IndexEngine, LoadResult};
pub use error::Error;
pub use extractor::{GeminiExtractor, MetadataExtractor};
pub use model::{EntryId, EntryStatus, LibraryEntry};
pub use progress::{ProgressReporter, SilentReporter};
pub use rename::{BatchRename, FsRenamer, Renamer};
pub use script::ScriptKind;
