//! Application-level configuration.
//!
//! - [`PipelineConfig`]: the versioned pipeline configuration object
//! - [`ExecutionParams`]: retries, backoff, passes and concurrency

pub mod execution_params;
pub mod pipeline_config;

pub use execution_params::ExecutionParams;
pub use pipeline_config::{DEFAULT_CONFIG_VERSION, PipelineConfig};
