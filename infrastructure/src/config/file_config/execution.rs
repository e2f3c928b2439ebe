//! Execution configuration from TOML (`[execution]` section)

use assay_application::ExecutionParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry, pass and concurrency settings. Durations are given in
/// milliseconds (`*_ms`) or seconds (`*_secs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExecutionConfig {
    pub max_provider_retries: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub parse_retries: usize,
    pub persistence_retries: usize,
    pub max_recollection_passes: usize,
    pub under_quota_tolerance: usize,
    pub default_provider_concurrency: usize,
    pub parallel: bool,
    pub provider_timeout_secs: u64,
}

impl Default for FileExecutionConfig {
    fn default() -> Self {
        Self::from(&ExecutionParams::default())
    }
}

impl From<&ExecutionParams> for FileExecutionConfig {
    fn from(params: &ExecutionParams) -> Self {
        Self {
            max_provider_retries: params.max_provider_retries,
            backoff_base_ms: params.backoff_base.as_millis() as u64,
            backoff_max_ms: params.backoff_max.as_millis() as u64,
            parse_retries: params.parse_retries,
            persistence_retries: params.persistence_retries,
            max_recollection_passes: params.max_recollection_passes,
            under_quota_tolerance: params.under_quota_tolerance,
            default_provider_concurrency: params.default_provider_concurrency,
            parallel: params.parallel,
            provider_timeout_secs: params.provider_timeout.as_secs(),
        }
    }
}

impl FileExecutionConfig {
    pub fn to_params(&self) -> ExecutionParams {
        ExecutionParams {
            max_provider_retries: self.max_provider_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
            parse_retries: self.parse_retries,
            persistence_retries: self.persistence_retries,
            max_recollection_passes: self.max_recollection_passes,
            under_quota_tolerance: self.under_quota_tolerance,
            default_provider_concurrency: self.default_provider_concurrency.max(1),
            parallel: self.parallel,
            provider_timeout: Duration::from_secs(self.provider_timeout_secs.max(1)),
        }
    }
}
