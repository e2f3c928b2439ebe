//! Domain layer for assay
//!
//! This crate contains the pure logic of the evidence pipeline. It performs
//! no I/O and has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Collection
//!
//! Several independent LLM raters ("collectors") gather evidence items about
//! a subject. The [`quota`] planner decides how many items each
//! `(category, collector, polarity)` cell owes, and [`evidence`] parses and
//! validates what providers return.
//!
//! ## Pooling
//!
//! Every collected item is re-rated by a fixed roster of evaluators,
//! decoupling who found an item from who scores it. Heterogeneous
//! [`rating`] scales are normalised to one canonical `[-4, +4]` scale.
//!
//! ## Scoring and consistency
//!
//! [`scoring`] turns pooled ratings into category scores, a capped final
//! score and a grade tier. [`consistency`] compares evaluators by score and
//! rank correlation to separate calibration offsets from disagreement.

pub mod consistency;
pub mod core;
pub mod evidence;
pub mod prompt;
pub mod quota;
pub mod rating;
pub mod scoring;

// Re-export commonly used types
pub use consistency::{
    ConsistencyAnalyzer, ConsistencyReport, ConsistencyThresholds, Interpretation,
    PairCorrelation, SampleSize,
};
pub use core::{
    category::Category,
    current_timestamp,
    error::{ConfigurationError, DomainError, NormalizationError, ParseError, ValidationError},
    rater::Rater,
    subject::{Subject, SubjectId},
};
pub use evidence::{
    EvaluationRecord, EvaluationResponse, EvidenceCandidate, EvidenceItem, ItemKey, Polarity,
    SourceClass, Stance,
};
pub use prompt::{CollectionRequest, EvaluationRequest, PromptTemplate};
pub use quota::{CellQuota, PolaritySplit, QuotaPlan, QuotaPlanner, RaterWeight, RemainderRule};
pub use rating::{CanonicalRating, RatingScale, normalize};
pub use scoring::{
    CategoryScore, EvaluatorScores, GradeTable, GradeTier, ScoringConstants, ScoringEngine,
    SubjectScore, UnderSampledItem,
};
