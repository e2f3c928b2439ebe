//! Analyze Consistency use case
//!
//! Scores each requested subject on read, then compares every evaluator
//! pair across the resulting per-evaluator category scores.

use super::score_subject::{ScoreError, ScoreSubjectUseCase};
use crate::config::PipelineConfig;
use crate::ports::evidence_store::EvidenceStore;
use assay_domain::{ConsistencyReport, SubjectId};
use std::sync::Arc;
use tracing::info;

pub struct AnalyzeConsistencyUseCase<S: EvidenceStore + 'static> {
    store: Arc<S>,
    config: Arc<PipelineConfig>,
}

impl<S: EvidenceStore + 'static> AnalyzeConsistencyUseCase<S> {
    pub fn new(store: Arc<S>, config: Arc<PipelineConfig>) -> Self {
        Self { store, config }
    }

    /// Analyze `subjects`, or every subject in the store when empty.
    pub async fn execute(&self, subjects: &[SubjectId]) -> Result<ConsistencyReport, ScoreError> {
        let subjects = if subjects.is_empty() {
            self.store.subject_ids().await?
        } else {
            subjects.to_vec()
        };

        let scorer = ScoreSubjectUseCase::new(Arc::clone(&self.store), Arc::clone(&self.config));
        let scores: Vec<_> = scorer
            .execute_many(&subjects)
            .await?
            .into_iter()
            .map(|report| report.score)
            .collect();

        let report = self.config.consistency_analyzer().analyze(&scores);
        info!(
            "Consistency over {} subjects: {} evaluator pairs, {} flagged",
            report.subjects.len(),
            report.pairs.len(),
            report.flagged().count()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::InMemoryEvidenceStore;
    use assay_domain::{
        CanonicalRating, Category, EvaluationRecord, EvidenceItem, Interpretation, ItemKey,
        Polarity, Rater, RatingScale, SourceClass, Stance,
    };

    async fn rated_subject(store: &InMemoryEvidenceStore, id: &str, claude: i8, gpt: i8) {
        let item = EvidenceItem {
            key: ItemKey::new(
                id.into(),
                Category::new("vision"),
                Rater::Claude,
                Polarity::Free.sequence(1),
            ),
            title: "finding".into(),
            body: "b".into(),
            source: String::new(),
            source_class: SourceClass::Public,
            polarity: Polarity::Free,
            stance: Stance::Neutral,
            collected_at: 0,
            self_rating: None,
        };
        store.insert_items(std::slice::from_ref(&item)).await.unwrap();
        for (evaluator, rating) in [(Rater::Claude, claude), (Rater::Gpt, gpt)] {
            store
                .insert_evaluation(&EvaluationRecord {
                    item: item.key.clone(),
                    evaluator,
                    raw_rating: rating.to_string(),
                    scale: RatingScale::SignedInteger,
                    rating: CanonicalRating::new(rating).unwrap(),
                    rationale: String::new(),
                    evaluated_at: 0,
                })
                .await
                .unwrap();
        }
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default()
            .with_categories(vec![Category::new("vision"), Category::new("ethics")])
            .with_evaluators(vec![Rater::Claude, Rater::Gpt]);
        config.consistency_min_sample = 1;
        config.min_evaluations_per_item = 1;
        config
    }

    #[tokio::test]
    async fn test_analyzes_every_stored_subject_by_default() {
        let store = Arc::new(InMemoryEvidenceStore::new());
        rated_subject(&store, "s1", -2, -4).await;
        rated_subject(&store, "s2", 0, -3).await;
        rated_subject(&store, "s3", 4, 4).await;

        let uc = AnalyzeConsistencyUseCase::new(store, Arc::new(config()));
        let report = uc.execute(&[]).await.unwrap();

        assert_eq!(report.subjects.len(), 3);
        let pair = report.pair(&Rater::Claude, &Rater::Gpt).unwrap();
        assert_eq!(pair.subjects, 3);
        assert!((pair.spearman.unwrap() - 1.0).abs() < 1e-9);
        assert!(pair.pearson.unwrap() < 1.0);
    }

    #[tokio::test]
    async fn test_single_subject_is_undetermined() {
        let store = Arc::new(InMemoryEvidenceStore::new());
        rated_subject(&store, "s1", 1, 2).await;

        let uc = AnalyzeConsistencyUseCase::new(store, Arc::new(config()));
        let report = uc.execute(&["s1".into()]).await.unwrap();

        let pair = report.pair(&Rater::Claude, &Rater::Gpt).unwrap();
        assert_eq!(pair.spearman, None);
        assert_eq!(pair.interpretation, Interpretation::Undetermined);
    }
}
