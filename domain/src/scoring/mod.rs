//! Aggregation & scoring
//!
//! `category_score = (base + average * scale) * multiplier`, summed over
//! categories, capped, and mapped to a grade tier.

pub mod constants;
pub mod engine;

pub use constants::{GradeTable, GradeTier, ScoringConstants};
pub use engine::{CategoryScore, EvaluatorScores, ScoringEngine, SubjectScore, UnderSampledItem};
