//! Domain error types
//!
//! Each pipeline stage raises its own error kind so callers can decide
//! whether a failure is fatal (configuration) or isolated to one work item
//! (parse, validation, normalization).

use thiserror::Error;

/// Invalid pipeline configuration. Always fatal, raised before any provider call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("No categories configured")]
    NoCategories,

    #[error("No collecting raters configured")]
    NoCollectors,

    #[error("No evaluating raters configured")]
    NoEvaluators,

    #[error("Duplicate {kind} in configuration: {value}")]
    Duplicate { kind: &'static str, value: String },

    #[error("Rater weights must sum to 1.0 (got {sum:.6})")]
    WeightSum { sum: f64 },

    #[error("Rater weight for {rater} must be finite and non-negative (got {weight})")]
    InvalidWeight { rater: String, weight: f64 },

    #[error("Polarity split must sum to 1.0 (got {sum:.6})")]
    PolaritySum { sum: f64 },

    #[error(
        "Target total {total} is not divisible by {categories} categories and no remainder rule is configured"
    )]
    IndivisibleTotal { total: usize, categories: usize },

    #[error("Target total must be positive")]
    EmptyTarget,

    #[error("Invalid scoring configuration: {0}")]
    Scoring(String),

    #[error("Invalid {field}: {message}")]
    Invalid { field: String, message: String },
}

/// A provider payload that does not match the expected structure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Payload is empty")]
    Empty,

    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Payload has unexpected shape: {0}")]
    UnexpectedShape(String),
}

/// A well-formed item that is semantically invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Item #{index} has an empty title")]
    EmptyTitle { index: usize },

    #[error("Item #{index} has an empty body")]
    EmptyBody { index: usize },

    #[error("Item #{index} is missing a polarity tag")]
    MissingPolarity { index: usize },

    #[error("Item #{index} has polarity {found} but the cell requires {expected}")]
    PolarityMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Item #{index} has unknown polarity tag '{tag}'")]
    UnknownPolarity { index: usize, tag: String },

    #[error("Item #{index} has unknown source class '{tag}'")]
    UnknownSourceClass { index: usize, tag: String },

    #[error("Item #{index} repeats sequence number {sequence} within the cell")]
    DuplicateSequence { index: usize, sequence: u32 },

    #[error("Item #{index} duplicates existing evidence '{title}'")]
    DuplicateContent { index: usize, title: String },

    #[error("Item #{index} exceeds the requested count of {count}")]
    OverQuota { index: usize, count: usize },
}

/// A raw rating that the configured scale does not recognise.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized rating '{raw}' for {scale} scale")]
pub struct NormalizationError {
    pub raw: String,
    pub scale: String,
}

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }

    /// Configuration errors abort a run; everything else is isolated to one work item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DomainError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_error_display() {
        let error = DomainError::Cancelled;
        assert_eq!(error.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_is_cancelled_check() {
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(!DomainError::from(ParseError::Empty).is_cancelled());
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(DomainError::from(ConfigurationError::NoCategories).is_fatal());
        assert!(!DomainError::from(ParseError::Empty).is_fatal());
        let norm = NormalizationError {
            raw: "Z".to_string(),
            scale: "letter".to_string(),
        };
        assert!(!DomainError::from(norm).is_fatal());
    }

    #[test]
    fn test_weight_sum_display() {
        let err = ConfigurationError::WeightSum { sum: 0.9 };
        assert_eq!(err.to_string(), "Rater weights must sum to 1.0 (got 0.900000)");
    }
}
