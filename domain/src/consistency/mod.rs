//! Rater consistency analysis
//!
//! Score correlation (Pearson) and rank correlation (Spearman) between
//! every pair of evaluators. A high rank correlation with a low score
//! correlation means the raters order subjects the same way but use the
//! scale differently; low rank correlation means they disagree.

pub mod analyzer;
pub mod report;
pub mod stats;

pub use analyzer::ConsistencyAnalyzer;
pub use report::{
    CategoryCorrelation, ConsistencyReport, ConsistencyThresholds, Interpretation,
    PairCorrelation, SampleSize,
};
pub use stats::{pearson, ranks, spearman};
