//! Shared utilities for use cases.
//!
//! Cancellation checks, the per-provider concurrency limits, and the retry
//! loops around provider calls and store writes used by both collection
//! and pooling.

use crate::config::{ExecutionParams, PipelineConfig};
use crate::ports::evidence_store::StoreError;
use crate::ports::llm_gateway::{GatewayError, LlmGateway};
use assay_domain::{Category, Rater};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outcome classification shared by collection and pooling summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every work item reached its target.
    Complete,
    /// Complete, but `n` items carry a flag (shortfall within tolerance,
    /// under-sampled items).
    CompleteWithFlags(usize),
    /// `missing` work items are below target: cells below quota for
    /// collection, pairs without a record for pooling.
    Incomplete {
        missing: usize,
        categories: Vec<Category>,
    },
}

impl RunStatus {
    pub fn from_counts(missing: usize, categories: Vec<Category>, flagged: usize) -> Self {
        if missing > 0 {
            RunStatus::Incomplete {
                missing,
                categories,
            }
        } else if flagged > 0 {
            RunStatus::CompleteWithFlags(flagged)
        } else {
            RunStatus::Complete
        }
    }

    pub fn is_complete(&self) -> bool {
        !matches!(self, RunStatus::Incomplete { .. })
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Complete => write!(f, "fully complete"),
            RunStatus::CompleteWithFlags(n) => write!(f, "complete with {} flagged items", n),
            RunStatus::Incomplete {
                missing,
                categories,
            } => {
                let names: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
                write!(f, "incomplete: {} below target ({})", missing, names.join(", "))
            }
        }
    }
}

/// Serialize a list of errors as their display strings.
pub(crate) fn serialize_display<T, S>(items: &[T], serializer: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: Serializer,
{
    serializer.collect_seq(items.iter().map(|i| i.to_string()))
}

/// Check if cancellation has been requested.
pub(crate) fn is_cancelled(token: &Option<CancellationToken>) -> bool {
    token.as_ref().is_some_and(|t| t.is_cancelled())
}

/// Sleep for `delay`, waking early on cancellation. Returns `false` if cancelled.
pub(crate) async fn sleep_or_cancel(delay: Duration, token: &Option<CancellationToken>) -> bool {
    match token {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}

/// One semaphore per provider; global concurrency is otherwise unconstrained.
#[derive(Debug, Clone)]
pub(crate) struct ProviderLimits {
    limits: HashMap<Rater, Arc<Semaphore>>,
    fallback: Arc<Semaphore>,
}

impl ProviderLimits {
    pub(crate) fn from_config(config: &PipelineConfig) -> Self {
        let limits = config
            .raters()
            .into_iter()
            .chain(config.concurrency.keys().cloned())
            .map(|r| {
                let permits = config.concurrency_for(&r);
                (r, Arc::new(Semaphore::new(permits)))
            })
            .collect();
        Self {
            limits,
            fallback: Arc::new(Semaphore::new(
                config.execution.default_provider_concurrency,
            )),
        }
    }

    pub(crate) fn for_rater(&self, rater: &Rater) -> Arc<Semaphore> {
        self.limits
            .get(rater)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

/// One prompt for one rater, labelled for logs.
pub(crate) struct ProviderRequest<'a> {
    pub rater: &'a Rater,
    pub system_prompt: &'a str,
    pub prompt: &'a str,
    pub task: &'a str,
}

/// A provider call's final outcome and how many calls it took.
pub(crate) struct ProviderCall {
    pub result: Result<String, GatewayError>,
    pub calls: usize,
    /// Cancellation was observed; no further call was dispatched
    pub cancelled: bool,
}

impl ProviderCall {
    fn finished(result: Result<String, GatewayError>, calls: usize) -> Self {
        Self {
            result,
            calls,
            cancelled: false,
        }
    }

    fn cancelled(result: Result<String, GatewayError>, calls: usize) -> Self {
        Self {
            result,
            calls,
            cancelled: true,
        }
    }
}

/// Call a provider, retrying transient errors with exponential backoff.
///
/// The semaphore permit is held only for the call itself, not during backoff.
/// Cancellation is checked once the permit is granted and during backoff;
/// an in-flight call always completes.
pub(crate) async fn call_provider<G: LlmGateway + ?Sized>(
    gateway: &G,
    limiter: &Semaphore,
    request: &ProviderRequest<'_>,
    params: &ExecutionParams,
    token: &Option<CancellationToken>,
) -> ProviderCall {
    let ProviderRequest {
        rater,
        system_prompt,
        prompt,
        task,
    } = *request;
    let mut calls = 0;
    loop {
        let result = {
            let Ok(_permit) = limiter.acquire().await else {
                let closed = GatewayError::Other("provider limiter closed".to_string());
                return ProviderCall::finished(Err(closed), calls);
            };
            if is_cancelled(token) {
                return ProviderCall::cancelled(Err(GatewayError::Other("cancelled".into())), calls);
            }
            calls += 1;
            send_once(gateway, rater, system_prompt, prompt, params.provider_timeout).await
        };

        match result {
            Err(e) if e.is_transient() && calls <= params.max_provider_retries => {
                let delay = e
                    .retry_after()
                    .map(|d| d.min(params.backoff_max))
                    .unwrap_or_else(|| params.backoff(calls));
                warn!(
                    "{}: {} failed ({}), retry {}/{} in {:?}",
                    task, rater, e, calls, params.max_provider_retries, delay
                );
                if !sleep_or_cancel(delay, token).await {
                    debug!("{}: cancelled during backoff", task);
                    return ProviderCall::cancelled(Err(e), calls);
                }
            }
            result => return ProviderCall::finished(result, calls),
        }
    }
}

async fn send_once<G: LlmGateway + ?Sized>(
    gateway: &G,
    rater: &Rater,
    system_prompt: &str,
    prompt: &str,
    timeout: Duration,
) -> Result<String, GatewayError> {
    let session = gateway
        .create_session_with_system_prompt(rater, system_prompt)
        .await?;
    match tokio::time::timeout(timeout, session.send(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout),
    }
}

/// Run a store write, retrying transient errors with exponential backoff.
pub(crate) async fn persist_with_retry<T, F, Fut>(
    params: &ExecutionParams,
    what: &str,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(e) if e.is_transient() && attempt <= params.persistence_retries => {
                let delay = params.backoff(attempt);
                warn!("Persisting {} failed ({}), retry {} in {:?}", what, e, attempt, delay);
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_run_status_classification() {
        assert_eq!(RunStatus::from_counts(0, vec![], 0), RunStatus::Complete);
        assert_eq!(
            RunStatus::from_counts(0, vec![], 3),
            RunStatus::CompleteWithFlags(3)
        );
        let status = RunStatus::from_counts(2, vec![Category::new("ethics")], 3);
        assert!(!status.is_complete());
        assert_eq!(status.to_string(), "incomplete: 2 below target (ethics)");
    }

    #[test]
    fn test_is_cancelled() {
        assert!(!is_cancelled(&None));
        let token = CancellationToken::new();
        let opt = Some(token.clone());
        assert!(!is_cancelled(&opt));
        token.cancel();
        assert!(is_cancelled(&opt));
    }

    #[tokio::test]
    async fn test_persist_retries_busy_then_succeeds() {
        let params = ExecutionParams::default().with_backoff(Duration::ZERO, Duration::ZERO);
        let attempts = AtomicUsize::new(0);
        let result = persist_with_retry(&params, "item", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Busy("locked".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_persist_gives_up_on_permanent_error() {
        let params = ExecutionParams::default();
        let attempts = AtomicUsize::new(0);
        let result: Result<(), _> = persist_with_retry(&params, "item", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Corrupt("bad".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sleep_or_cancel_wakes_on_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!sleep_or_cancel(Duration::from_secs(60), &Some(token)).await);
    }
}
