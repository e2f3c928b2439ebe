//! Score Subject use case
//!
//! Scores are derived on read: every call re-reads the subject's items and
//! evaluation records and runs the scoring engine over them. Nothing
//! computed here is written back.

use crate::config::PipelineConfig;
use crate::ports::evidence_store::{
    EvaluationFilter, EvidenceStore, ItemFilter, StoreError, UnavailablePair,
};
use assay_domain::{ConfigurationError, Subject, SubjectId, SubjectScore};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Unknown subject '{0}': not registered and no evidence collected")]
    UnknownSubject(SubjectId),
}

/// Score plus the context a reader needs to trust it.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub subject: Subject,
    pub score: SubjectScore,
    /// Pairs that could not be evaluated and still have no record
    pub unavailable: Vec<UnavailablePair>,
}

pub struct ScoreSubjectUseCase<S: EvidenceStore + 'static> {
    store: Arc<S>,
    config: Arc<PipelineConfig>,
}

impl<S: EvidenceStore + 'static> ScoreSubjectUseCase<S> {
    pub fn new(store: Arc<S>, config: Arc<PipelineConfig>) -> Self {
        Self { store, config }
    }

    pub async fn execute(&self, subject: &SubjectId) -> Result<ScoreReport, ScoreError> {
        self.config.validate()?;

        let registered = self.store.get_subject(subject).await?;
        let items = self
            .store
            .list_items(&ItemFilter::subject(subject.clone()))
            .await?;
        if registered.is_none() && items.is_empty() {
            return Err(ScoreError::UnknownSubject(subject.clone()));
        }
        let records = self
            .store
            .list_evaluations(&EvaluationFilter::subject(subject.clone()))
            .await?;
        let unavailable = self.store.list_unavailable(subject).await?;

        let score = self.config.scoring_engine().score_subject(
            subject,
            &self.config.categories,
            &self.config.evaluators,
            &items,
            &records,
        );
        debug!(
            "Scored {}: {:.1} ({}) from {} records over {} items",
            subject, score.total, score.grade, score.record_count, score.item_count
        );
        if !score.under_sampled.is_empty() {
            warn!(
                "{}: {} items have fewer than {} evaluations",
                subject,
                score.under_sampled.len(),
                self.config.min_evaluations_per_item
            );
        }

        Ok(ScoreReport {
            subject: registered
                .unwrap_or_else(|| Subject::new(subject.clone(), subject.as_str())),
            score,
            unavailable,
        })
    }

    /// Score several subjects, skipping ids with neither registration nor evidence.
    pub async fn execute_many(&self, subjects: &[SubjectId]) -> Result<Vec<ScoreReport>, ScoreError> {
        let mut reports = Vec::with_capacity(subjects.len());
        for subject in subjects {
            match self.execute(subject).await {
                Ok(report) => reports.push(report),
                Err(ScoreError::UnknownSubject(id)) => {
                    warn!("Skipping unknown subject {}", id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::InMemoryEvidenceStore;
    use assay_domain::{
        CanonicalRating, Category, EvaluationRecord, EvidenceItem, ItemKey, Polarity, Rater,
        RatingScale, SourceClass, Stance,
    };

    fn item(collector: Rater, local: u32) -> EvidenceItem {
        let title = format!("finding {} from {}", local, collector);
        EvidenceItem {
            key: ItemKey::new(
                "s1".into(),
                Category::new("vision"),
                collector,
                Polarity::Free.sequence(local),
            ),
            title,
            body: "b".into(),
            source: String::new(),
            source_class: SourceClass::Official,
            polarity: Polarity::Free,
            stance: Stance::Neutral,
            collected_at: 0,
            self_rating: None,
        }
    }

    fn record(item: &EvidenceItem, evaluator: Rater, rating: i8) -> EvaluationRecord {
        EvaluationRecord {
            item: item.key.clone(),
            evaluator,
            raw_rating: rating.to_string(),
            scale: RatingScale::SignedInteger,
            rating: CanonicalRating::new(rating).unwrap(),
            rationale: String::new(),
            evaluated_at: 0,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
            .with_categories(vec![Category::new("vision"), Category::new("ethics")])
            .with_evaluators(vec![Rater::Claude, Rater::Gpt])
    }

    #[tokio::test]
    async fn test_score_derived_from_stored_records() {
        let store = Arc::new(InMemoryEvidenceStore::new());
        store.put_subject(&Subject::new("s1", "Jane Doe")).await.unwrap();
        let a = item(Rater::Claude, 1);
        let b = item(Rater::Gpt, 1);
        store.insert_items(&[a.clone(), b.clone()]).await.unwrap();
        for r in [
            record(&a, Rater::Claude, 4),
            record(&a, Rater::Gpt, 4),
            record(&b, Rater::Claude, -4),
            record(&b, Rater::Gpt, -4),
        ] {
            store.insert_evaluation(&r).await.unwrap();
        }

        let uc = ScoreSubjectUseCase::new(store, Arc::new(config()));
        let report = uc.execute(&"s1".into()).await.unwrap();

        assert_eq!(report.subject.name, "Jane Doe");
        let vision = report.score.category(&Category::new("vision")).unwrap();
        assert!((vision.score - 60.0).abs() < 1e-9);
        let ethics = report.score.category(&Category::new("ethics")).unwrap();
        assert_eq!(ethics.score, 0.0);
        assert!((report.score.total - 60.0).abs() < 1e-9);
        assert!(report.score.under_sampled.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_subject_is_an_error() {
        let uc = ScoreSubjectUseCase::new(
            Arc::new(InMemoryEvidenceStore::new()),
            Arc::new(config()),
        );
        assert!(matches!(
            uc.execute(&"nobody".into()).await,
            Err(ScoreError::UnknownSubject(_))
        ));
        assert!(uc.execute_many(&["nobody".into()]).await.unwrap().is_empty());
    }
}
