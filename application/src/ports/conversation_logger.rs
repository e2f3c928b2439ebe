//! Port for the provider-call audit log.
//!
//! Every prompt sent to a provider, every raw payload received, and every
//! parse failure or rejected item is recorded as one structured event so
//! an operator can review what a rater actually said.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port captures the full provider
//! transcript in a machine-readable format (JSONL).

use assay_domain::Rater;
use serde_json::{Value, json};

/// A structured audit event.
///
/// Each event has a type string and a JSON payload; adapters add the
/// timestamp when writing.
pub struct ConversationEvent {
    /// Event type identifier (e.g. "collection_request", "item_rejected").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ConversationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }

    /// A prompt sent to a rater for one work item.
    pub fn request(event_type: &'static str, rater: &Rater, task: &str, prompt: &str) -> Self {
        Self::new(
            event_type,
            json!({ "rater": rater.as_str(), "task": task, "prompt": prompt }),
        )
    }

    /// The raw payload a rater answered with.
    pub fn response(event_type: &'static str, rater: &Rater, task: &str, payload: &str) -> Self {
        Self::new(
            event_type,
            json!({ "rater": rater.as_str(), "task": task, "payload": payload }),
        )
    }

    /// A work item-level failure (parse, validation, normalization, provider).
    pub fn failure(event_type: &'static str, rater: &Rater, task: &str, reason: &str) -> Self {
        Self::new(
            event_type,
            json!({ "rater": rater.as_str(), "task": task, "reason": reason }),
        )
    }
}

/// Port for logging audit events to a structured log.
///
/// Implementations write each event as a single record (e.g. one JSONL line).
/// `log` is synchronous and infallible; logging failures never interrupt a run.
pub trait ConversationLogger: Send + Sync {
    /// Record an event.
    fn log(&self, event: ConversationEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}
