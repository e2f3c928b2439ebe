//! Evidence domain
//!
//! Evidence items are collected per cell `(category, collector, polarity)`
//! and keyed by `(subject, category, collector, sequence)`. Pooled ratings
//! are stored separately as evaluation records keyed by `(item, evaluator)`.
//!
//! ```text
//! provider payload ──strip/parse──▶ EvidenceCandidate ──validate──▶ EvidenceItem
//!                                                                       │
//! provider payload ──strip/parse──▶ EvaluationResponse ──normalize──▶ EvaluationRecord
//! ```

pub mod evaluation;
pub mod item;
pub mod parsing;
pub mod validation;

pub use evaluation::EvaluationRecord;
pub use item::{EvidenceItem, ItemKey, Polarity, SEQUENCE_BLOCK, SourceClass, Stance};
pub use parsing::{
    EvaluationResponse, EvidenceCandidate, parse_collection_payload, parse_evaluation_payload,
    strip_formatting,
};
pub use validation::{ValidCandidate, ValidationOutcome, validate_candidates};
