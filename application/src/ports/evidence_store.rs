//! Evidence store port
//!
//! The store is the only shared mutable resource in the pipeline. It is a
//! keyed insert-or-ignore store: uniqueness of the natural keys
//! `(subject, category, collector, sequence)` and `(item, evaluator)` is
//! enforced here, which is what makes collection and pooling idempotent and
//! safe to run concurrently.

use assay_domain::{
    Category, EvaluationRecord, EvidenceItem, ItemKey, Polarity, Rater, Subject, SubjectId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by store adapters
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Temporarily unavailable (locked, busy); worth retrying
    #[error("Store busy: {0}")]
    Busy(String),

    #[error("Store I/O error: {0}")]
    Io(String),

    #[error("Stored data is invalid: {0}")]
    Corrupt(String),

    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }

    /// The store itself is unusable; no later write can succeed either.
    pub fn is_catastrophic(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Corrupt(_))
    }
}

/// Filter over evidence items. The subject is always required.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFilter {
    pub subject: SubjectId,
    pub category: Option<Category>,
    pub collector: Option<Rater>,
    pub polarity: Option<Polarity>,
}

impl ItemFilter {
    pub fn subject(subject: SubjectId) -> Self {
        Self {
            subject,
            category: None,
            collector: None,
            polarity: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_collector(mut self, collector: Rater) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = Some(polarity);
        self
    }

    pub fn matches(&self, item: &EvidenceItem) -> bool {
        item.key.subject == self.subject
            && self.category.as_ref().is_none_or(|c| &item.key.category == c)
            && self.collector.as_ref().is_none_or(|r| &item.key.collector == r)
            && self.polarity.is_none_or(|p| item.polarity == p)
    }
}

/// Filter over evaluation records. The subject is always required.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationFilter {
    pub subject: SubjectId,
    pub category: Option<Category>,
    pub evaluator: Option<Rater>,
}

impl EvaluationFilter {
    pub fn subject(subject: SubjectId) -> Self {
        Self {
            subject,
            category: None,
            evaluator: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_evaluator(mut self, evaluator: Rater) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn matches(&self, record: &EvaluationRecord) -> bool {
        record.item.subject == self.subject
            && self.category.as_ref().is_none_or(|c| &record.item.category == c)
            && self.evaluator.as_ref().is_none_or(|e| &record.evaluator == e)
    }
}

/// An (item, evaluator) pair that could not be evaluated after retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailablePair {
    pub item: ItemKey,
    pub evaluator: Rater,
    pub reason: String,
    /// Milliseconds since epoch of the last failed attempt
    pub recorded_at: u64,
}

/// Persistence for subjects, evidence items and evaluation records.
///
/// Inserts never overwrite: inserting an existing key is a no-op that
/// reports `false` (or is not counted).
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Register a subject, replacing its name and metadata if it exists.
    async fn put_subject(&self, subject: &Subject) -> Result<(), StoreError>;

    async fn get_subject(&self, id: &SubjectId) -> Result<Option<Subject>, StoreError>;

    /// Registered subjects plus any subject that has evidence, sorted by id.
    async fn subject_ids(&self) -> Result<Vec<SubjectId>, StoreError>;

    /// Insert items atomically; returns one flag per item, `true` if it was stored.
    ///
    /// An item is skipped when its key exists, or when its normalised title
    /// already exists in the same subject and category.
    async fn insert_items(&self, items: &[EvidenceItem]) -> Result<Vec<bool>, StoreError>;

    /// Items ordered by category, collector and sequence.
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<EvidenceItem>, StoreError>;

    async fn count_items(&self, filter: &ItemFilter) -> Result<usize, StoreError>;

    /// Insert one record; returns `false` if `(item, evaluator)` already had one.
    async fn insert_evaluation(&self, record: &EvaluationRecord) -> Result<bool, StoreError>;

    async fn list_evaluations(
        &self,
        filter: &EvaluationFilter,
    ) -> Result<Vec<EvaluationRecord>, StoreError>;

    /// Mark a pair unavailable, replacing any earlier mark for the same pair.
    async fn mark_unavailable(&self, pair: &UnavailablePair) -> Result<(), StoreError>;

    /// Unavailable marks for a subject whose pair still has no record.
    async fn list_unavailable(&self, subject: &SubjectId)
    -> Result<Vec<UnavailablePair>, StoreError>;
}
