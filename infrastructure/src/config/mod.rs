//! Configuration file loading for assay
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. `ASSAY_`-prefixed environment variables
//! 3. Project root: `./assay.toml` or `./.assay.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/assay/config.toml`
//! 5. Default values

mod error;
mod file_config;
mod loader;

pub use error::ConfigError;

pub use file_config::{
    FileAnthropicConfig, FileCollectorConfig, FileConfig, FileConsistencyConfig,
    FileExecutionConfig, FileLoggingConfig, FileOpenAiConfig, FilePipelineConfig,
    FileProvidersConfig, FileRaterConfig, FileScoringConfig, FileStoreConfig,
};
pub use loader::ConfigLoader;
