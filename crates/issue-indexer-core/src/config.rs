use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;
use std::path::Path;

pub const DEFAULT_CONCURRENCY: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub root_paths: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub concurrency: usize,
    pub registry_path: String,
    pub read_only: bool,
    pub extractor: ExtractorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Defaults, then an optional `Config.*` file, then `INDEXER__*` variables.
    pub fn load() -> Result<AppConfig, ConfigError> {
        let builder = Config::builder()
            .set_default("root_paths", Vec::<String>::new())?
            .set_default("ignore_patterns", Vec::<String>::new())?
            .set_default("concurrency", DEFAULT_CONCURRENCY as u64)?
            .set_default("registry_path", "issue_registry.json")?
            .set_default("read_only", false)?
            .set_default(
                "extractor.endpoint",
                "https://generativelanguage.googleapis.com/v1beta",
            )?
            .set_default("extractor.model", "gemini-2.0-flash-exp")?
            .set_default("extractor.timeout_secs", 120_u64)?
            .add_source(ConfigFile::with_name("Config").required(false))
            .add_source(
                Environment::with_prefix("INDEXER")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("root_paths")
                    .with_list_parse_key("ignore_patterns")
                    .try_parsing(true),
            )
            .build()?;

        let mut config = builder.try_deserialize::<AppConfig>()?;
        config.concurrency = config.concurrency.max(1);
        Ok(config)
    }

    /// Configured key, else the `API_KEY` / `GEMINI_API_KEY` environment variables.
    pub fn api_key(&self) -> Option<String> {
        self.extractor
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| env::var("API_KEY").ok())
            .or_else(|| env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        if result.iter().any(|kept| dir_path.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !Path::new(kept).starts_with(dir_path));
        result.push(dir);
    }

    result
}
