//! Core domain concepts shared across all subdomains.
//!
//! - [`rater::Rater`]: an LLM acting as collector and/or evaluator
//! - [`subject::Subject`]: the public figure being evaluated
//! - [`category::Category`]: one evaluation dimension
//! - [`error`]: the error taxonomy raised by pure domain logic

pub mod category;
pub mod error;
pub mod rater;
pub mod string;
pub mod subject;

/// Current time in milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
