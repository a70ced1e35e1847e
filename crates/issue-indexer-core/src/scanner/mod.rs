pub mod walk;

pub use walk::{discover, discover_files, discover_files_within};
