//! Execution parameters: retry, backoff and concurrency control.
//!
//! [`ExecutionParams`] groups the static parameters that control how the
//! collection and pooling use cases drive providers and the store.
//! These are application-layer concerns, not domain policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry and concurrency control parameters.
///
/// | Failure | Policy |
/// |---------|--------|
/// | Provider timeout / rate limit / 5xx | `max_provider_retries` with exponential backoff |
/// | Unparseable payload | `parse_retries` immediate re-asks |
/// | Store busy | `persistence_retries` with exponential backoff |
/// | Category under quota after all cells | `max_recollection_passes` extra passes |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionParams {
    /// Retries after a transient provider error (attempts = retries + 1).
    pub max_provider_retries: usize,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff_base: Duration,
    /// Upper bound for any single backoff delay.
    pub backoff_max: Duration,
    /// Immediate re-asks after an unparseable payload.
    pub parse_retries: usize,
    /// Retries after a transient store error.
    pub persistence_retries: usize,
    /// Extra passes over categories still under quota.
    pub max_recollection_passes: usize,
    /// Items a category may be short before it counts as under quota.
    pub under_quota_tolerance: usize,
    /// Concurrent calls per provider when a rater sets no limit.
    pub default_provider_concurrency: usize,
    /// Run work items concurrently; `false` processes them one at a time.
    pub parallel: bool,
    /// Deadline for a single provider call.
    pub provider_timeout: Duration,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            max_provider_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            parse_retries: 1,
            persistence_retries: 3,
            max_recollection_passes: 2,
            under_quota_tolerance: 0,
            default_provider_concurrency: 4,
            parallel: true,
            provider_timeout: Duration::from_secs(120),
        }
    }
}

impl ExecutionParams {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(16) as u32;
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.backoff_max)
    }

    // ==================== Builder Methods ====================

    pub fn with_max_provider_retries(mut self, max: usize) -> Self {
        self.max_provider_retries = max;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    pub fn with_parse_retries(mut self, retries: usize) -> Self {
        self.parse_retries = retries;
        self
    }

    pub fn with_max_recollection_passes(mut self, passes: usize) -> Self {
        self.max_recollection_passes = passes;
        self
    }

    pub fn with_under_quota_tolerance(mut self, tolerance: usize) -> Self {
        self.under_quota_tolerance = tolerance;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }
}
