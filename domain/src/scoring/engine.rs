//! Aggregation of pooled ratings into category and final scores.
//!
//! Scores are always derived from evaluation records on read; nothing here
//! is persisted.

use super::constants::{GradeTable, ScoringConstants};
use crate::core::category::Category;
use crate::core::rater::Rater;
use crate::core::subject::SubjectId;
use crate::evidence::{EvaluationRecord, EvidenceItem, ItemKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Score of one category, pooled over every evaluator or for one evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    /// 0.0 when no records exist
    pub score: f64,
    /// Mean canonical rating, `None` when no records exist
    pub average: Option<f64>,
    /// Number of records averaged (the sample size)
    pub records: usize,
}

impl CategoryScore {
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

/// One evaluator's view of a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorScores {
    pub evaluator: Rater,
    pub categories: Vec<CategoryScore>,
    pub total: f64,
}

impl EvaluatorScores {
    pub fn category(&self, category: &Category) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| &c.category == category)
    }
}

/// An item with fewer evaluations than the configured minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderSampledItem {
    pub item: ItemKey,
    pub records: usize,
}

/// Everything derived for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectScore {
    pub subject: SubjectId,
    /// Pooled scores in category order
    pub categories: Vec<CategoryScore>,
    /// Sum of pooled category scores, clamped to `[0, max_total]`
    pub total: f64,
    pub grade: String,
    pub evaluators: Vec<EvaluatorScores>,
    pub under_sampled: Vec<UnderSampledItem>,
    pub item_count: usize,
    pub record_count: usize,
}

impl SubjectScore {
    pub fn category(&self, category: &Category) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| &c.category == category)
    }

    pub fn evaluator(&self, evaluator: &Rater) -> Option<&EvaluatorScores> {
        self.evaluators.iter().find(|e| &e.evaluator == evaluator)
    }
}

/// Deterministic scoring over canonical ratings.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    constants: ScoringConstants,
    grades: GradeTable,
    min_evaluations: usize,
    exclude_self_evaluation: bool,
}

impl ScoringEngine {
    pub fn new(constants: ScoringConstants, grades: GradeTable) -> Self {
        Self {
            constants,
            grades,
            min_evaluations: 0,
            exclude_self_evaluation: false,
        }
    }

    /// Flag items with fewer than `min` records as under-sampled.
    pub fn with_min_evaluations(mut self, min: usize) -> Self {
        self.min_evaluations = min;
        self
    }

    /// Ignore records where the evaluator also collected the item.
    pub fn with_exclude_self_evaluation(mut self, exclude: bool) -> Self {
        self.exclude_self_evaluation = exclude;
        self
    }

    pub fn constants(&self) -> &ScoringConstants {
        &self.constants
    }

    pub fn grades(&self) -> &GradeTable {
        &self.grades
    }

    /// Score a category from the records that belong to it.
    pub fn category_score<'a>(
        &self,
        category: &Category,
        records: impl IntoIterator<Item = &'a EvaluationRecord>,
    ) -> CategoryScore {
        let (sum, count) = records
            .into_iter()
            .fold((0i64, 0usize), |(sum, n), r| (sum + i64::from(r.rating.value()), n + 1));

        if count == 0 {
            return CategoryScore {
                category: category.clone(),
                score: 0.0,
                average: None,
                records: 0,
            };
        }

        let average = sum as f64 / count as f64;
        CategoryScore {
            category: category.clone(),
            score: self.constants.category_score(average),
            average: Some(average),
            records: count,
        }
    }

    /// Sum category scores and clamp to `[0, max_total]`.
    pub fn final_score(&self, categories: &[CategoryScore]) -> f64 {
        let sum: f64 = categories.iter().map(|c| c.score).sum();
        sum.clamp(0.0, self.constants.max_total)
    }

    pub fn grade_for(&self, total: f64) -> String {
        self.grades.grade_for(total).to_string()
    }

    /// Derive every score for one subject.
    ///
    /// `items` is the subject's pool (used for under-sampling flags) and
    /// `records` its evaluation records. Categories not listed are ignored;
    /// evaluators are reported in `evaluators` order, followed by any other
    /// evaluator that appears in the records.
    pub fn score_subject(
        &self,
        subject: &SubjectId,
        categories: &[Category],
        evaluators: &[Rater],
        items: &[EvidenceItem],
        records: &[EvaluationRecord],
    ) -> SubjectScore {
        let counted: Vec<&EvaluationRecord> = records
            .iter()
            .filter(|r| &r.item.subject == subject)
            .filter(|r| !(self.exclude_self_evaluation && r.is_self_evaluation()))
            .collect();

        let pooled: Vec<CategoryScore> = categories
            .iter()
            .map(|c| self.category_score(c, counted.iter().copied().filter(|r| &r.item.category == c)))
            .collect();

        let mut roster: Vec<Rater> = evaluators.to_vec();
        let mut extra: Vec<Rater> = counted
            .iter()
            .map(|r| r.evaluator.clone())
            .filter(|e| !roster.contains(e))
            .collect();
        extra.sort();
        extra.dedup();
        roster.extend(extra);

        let per_evaluator = roster
            .into_iter()
            .map(|evaluator| {
                let scores: Vec<CategoryScore> = categories
                    .iter()
                    .map(|c| {
                        self.category_score(
                            c,
                            counted
                                .iter()
                                .copied()
                                .filter(|r| &r.item.category == c && r.evaluator == evaluator),
                        )
                    })
                    .collect();
                let total = self.final_score(&scores);
                EvaluatorScores {
                    evaluator,
                    categories: scores,
                    total,
                }
            })
            .collect();

        let mut per_item: HashMap<&ItemKey, usize> = HashMap::new();
        for r in &counted {
            *per_item.entry(&r.item).or_default() += 1;
        }
        let under_sampled = items
            .iter()
            .filter(|i| &i.key.subject == subject && categories.contains(&i.key.category))
            .filter_map(|i| {
                let n = per_item.get(&i.key).copied().unwrap_or(0);
                (n < self.min_evaluations).then(|| UnderSampledItem {
                    item: i.key.clone(),
                    records: n,
                })
            })
            .collect();

        let total = self.final_score(&pooled);
        SubjectScore {
            subject: subject.clone(),
            grade: self.grade_for(total),
            total,
            categories: pooled,
            evaluators: per_evaluator,
            under_sampled,
            item_count: items.iter().filter(|i| &i.key.subject == subject).count(),
            record_count: counted.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{Polarity, SourceClass, Stance};
    use crate::rating::{CanonicalRating, RatingScale};

    fn key(category: &str, collector: Rater, seq: u32) -> ItemKey {
        ItemKey::new(SubjectId::new("s1"), Category::new(category), collector, seq)
    }

    fn item(key: ItemKey) -> EvidenceItem {
        EvidenceItem {
            key,
            title: "t".to_string(),
            body: "b".to_string(),
            source: String::new(),
            source_class: SourceClass::Public,
            polarity: Polarity::Free,
            stance: Stance::Neutral,
            collected_at: 0,
            self_rating: None,
        }
    }

    fn record(item: ItemKey, evaluator: Rater, rating: i8) -> EvaluationRecord {
        EvaluationRecord {
            item,
            evaluator,
            raw_rating: format!("{:+}", rating),
            scale: RatingScale::SignedInteger,
            rating: CanonicalRating::new(rating).unwrap(),
            rationale: String::new(),
            evaluated_at: 0,
        }
    }

    #[test]
    fn test_balanced_ratings_score_midpoint() {
        let engine = ScoringEngine::default();
        let records: Vec<EvaluationRecord> = [4, 4, -4, -4, 0]
            .iter()
            .enumerate()
            .map(|(i, r)| record(key("vision", Rater::Claude, i as u32 + 1), Rater::Gpt, *r))
            .collect();
        let score = engine.category_score(&Category::new("vision"), &records);
        assert_eq!(score.average, Some(0.0));
        assert_eq!(score.score, 60.0);
        assert_eq!(score.records, 5);
    }

    #[test]
    fn test_extremes_hit_floor_and_ceiling() {
        let engine = ScoringEngine::default();
        let cat = Category::new("vision");
        let top = [record(key("vision", Rater::Claude, 1), Rater::Gpt, 4)];
        let bottom = [record(key("vision", Rater::Claude, 1), Rater::Gpt, -4)];
        assert_eq!(engine.category_score(&cat, &top).score, 80.0);
        assert_eq!(engine.category_score(&cat, &bottom).score, 40.0);
    }

    #[test]
    fn test_empty_category_contributes_zero() {
        let engine = ScoringEngine::default();
        let score = engine.category_score(&Category::new("vision"), &[]);
        assert_eq!(score.score, 0.0);
        assert!(score.average.is_none());
        assert!(score.is_empty());
    }

    #[test]
    fn test_final_score_is_clamped() {
        let constants = ScoringConstants {
            max_total: 500.0,
            ..Default::default()
        };
        let engine = ScoringEngine::new(constants, GradeTable::default());
        let categories = Category::default_set();
        let records: Vec<EvaluationRecord> = categories
            .iter()
            .map(|c| record(key(c.as_str(), Rater::Claude, 1), Rater::Gpt, 4))
            .collect();
        let result = engine.score_subject(
            &SubjectId::new("s1"),
            &categories,
            &[Rater::Gpt],
            &[],
            &records,
        );
        // Ten ceilings of 80 sum to 800, above the cap.
        assert_eq!(result.total, 500.0);

        let negative = ScoringConstants {
            base: -10.0,
            ..Default::default()
        };
        let engine = ScoringEngine::new(negative, GradeTable::default());
        let result = engine.score_subject(
            &SubjectId::new("s1"),
            &categories,
            &[Rater::Gpt],
            &[],
            &records,
        );
        assert_eq!(result.total, 0.0);
        assert_eq!(result.grade, "L");
    }

    #[test]
    fn test_per_evaluator_scores_and_self_exclusion() {
        let categories = vec![Category::new("vision")];
        let k = key("vision", Rater::Claude, 1);
        let records = vec![
            record(k.clone(), Rater::Claude, 4),
            record(k.clone(), Rater::Gpt, 0),
        ];
        let items = vec![item(k)];
        let subject = SubjectId::new("s1");
        let roster = [Rater::Claude, Rater::Gpt];

        let engine = ScoringEngine::default().with_min_evaluations(2);
        let all = engine.score_subject(&subject, &categories, &roster, &items, &records);
        assert_eq!(all.categories[0].score, 70.0);
        assert_eq!(all.evaluator(&Rater::Claude).unwrap().categories[0].score, 80.0);
        assert_eq!(all.evaluator(&Rater::Gpt).unwrap().categories[0].score, 60.0);
        assert!(all.under_sampled.is_empty());

        let engine = engine.with_exclude_self_evaluation(true);
        let excluded = engine.score_subject(&subject, &categories, &roster, &items, &records);
        assert_eq!(excluded.categories[0].score, 60.0);
        assert_eq!(excluded.record_count, 1);
        assert_eq!(excluded.under_sampled.len(), 1);
        assert_eq!(excluded.under_sampled[0].records, 1);
    }

    #[test]
    fn test_unlisted_evaluator_is_reported() {
        let categories = vec![Category::new("vision")];
        let k = key("vision", Rater::Claude, 1);
        let records = vec![record(k, Rater::Custom("mistral".into()), -2)];
        let result = ScoringEngine::default().score_subject(
            &SubjectId::new("s1"),
            &categories,
            &[Rater::Gpt],
            &[],
            &records,
        );
        assert_eq!(result.evaluators.len(), 2);
        assert_eq!(result.evaluators[1].evaluator, Rater::Custom("mistral".into()));
        assert_eq!(result.evaluators[0].categories[0].records, 0);
    }
}
