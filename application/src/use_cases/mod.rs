//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod analyze_consistency;
pub mod collect_evidence;
pub mod evaluate_pool;
pub mod inspect_status;
pub mod register_subject;
pub mod score_subject;
pub(crate) mod shared;

pub use shared::RunStatus;
