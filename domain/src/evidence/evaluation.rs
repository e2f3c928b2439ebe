//! Pooled evaluation records

use super::item::ItemKey;
use crate::core::rater::Rater;
use crate::rating::{CanonicalRating, RatingScale};
use serde::{Deserialize, Serialize};

/// One independent rating of one evidence item by one evaluator.
///
/// At most one record exists per `(item, evaluator)`; corrections are new
/// records under a purge-and-redo, never updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub item: ItemKey,
    pub evaluator: Rater,
    /// Rating exactly as the evaluator emitted it
    pub raw_rating: String,
    pub scale: RatingScale,
    pub rating: CanonicalRating,
    pub rationale: String,
    /// Milliseconds since epoch
    pub evaluated_at: u64,
}

impl EvaluationRecord {
    /// Whether the evaluator is also the item's collector.
    pub fn is_self_evaluation(&self) -> bool {
        self.item.collector == self.evaluator
    }
}
