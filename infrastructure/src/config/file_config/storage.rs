//! Store and provider-log configuration from TOML (`[store]`, `[logging]`)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// SQLite database path; defaults to the platform data directory
    pub path: Option<PathBuf>,
}

impl FileStoreConfig {
    /// Configured path, else `$XDG_DATA_HOME/assay/assay.db`, else `./assay.db`.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("assay").join("assay.db"))
                .unwrap_or_else(|| PathBuf::from("assay.db"))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL file receiving every provider request and response
    pub provider_log: Option<PathBuf>,
}
