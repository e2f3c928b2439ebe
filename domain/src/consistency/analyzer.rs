//! Pairwise evaluator consistency across subjects.

use super::report::{
    CategoryCorrelation, ConsistencyReport, ConsistencyThresholds, Interpretation,
    PairCorrelation, SampleSize,
};
use super::stats::{pearson, ranks};
use crate::core::category::Category;
use crate::core::current_timestamp;
use crate::core::rater::Rater;
use crate::core::subject::SubjectId;
use crate::scoring::SubjectScore;
use std::collections::HashSet;

/// One (subject, category) where both evaluators have a reliable score.
struct Observation<'a> {
    subject: &'a SubjectId,
    category: &'a Category,
    first: f64,
    second: f64,
}

/// Compares every evaluator pair by score correlation (Pearson) and rank
/// correlation (Spearman over within-category subject rankings).
#[derive(Debug, Clone, Default)]
pub struct ConsistencyAnalyzer {
    thresholds: ConsistencyThresholds,
    min_sample_size: usize,
}

impl ConsistencyAnalyzer {
    pub fn new(thresholds: ConsistencyThresholds) -> Self {
        Self {
            thresholds,
            min_sample_size: 1,
        }
    }

    /// Scores backed by fewer records are reported but not correlated.
    pub fn with_min_sample_size(mut self, min: usize) -> Self {
        self.min_sample_size = min.max(1);
        self
    }

    pub fn analyze(&self, scores: &[SubjectScore]) -> ConsistencyReport {
        let evaluators = ordered_unique(scores.iter().flat_map(|s| s.evaluators.iter().map(|e| &e.evaluator)));
        let categories = ordered_unique(scores.iter().flat_map(|s| s.categories.iter().map(|c| &c.category)));

        let mut samples = Vec::new();
        for subject in scores {
            for evaluator in &subject.evaluators {
                for category in &evaluator.categories {
                    samples.push(SampleSize {
                        subject: subject.subject.clone(),
                        category: category.category.clone(),
                        evaluator: evaluator.evaluator.clone(),
                        records: category.records,
                        score: (!category.is_empty()).then_some(category.score),
                        under_sampled: category.records < self.min_sample_size,
                    });
                }
            }
        }

        let mut pairs = Vec::new();
        for (i, first) in evaluators.iter().enumerate() {
            for second in &evaluators[i + 1..] {
                pairs.push(self.correlate(scores, &categories, first, second));
            }
        }

        ConsistencyReport {
            subjects: scores.iter().map(|s| s.subject.clone()).collect(),
            evaluators,
            min_sample_size: self.min_sample_size,
            thresholds: self.thresholds,
            pairs,
            samples,
            generated_at: current_timestamp(),
        }
    }

    fn correlate(
        &self,
        scores: &[SubjectScore],
        categories: &[Category],
        first: &Rater,
        second: &Rater,
    ) -> PairCorrelation {
        let mut observations = Vec::new();
        let mut skipped = 0;

        for subject in scores {
            let (Some(a), Some(b)) = (subject.evaluator(first), subject.evaluator(second)) else {
                continue;
            };
            for category in categories {
                let (Some(sa), Some(sb)) = (a.category(category), b.category(category)) else {
                    continue;
                };
                if sa.is_empty() || sb.is_empty() {
                    continue;
                }
                if sa.records < self.min_sample_size || sb.records < self.min_sample_size {
                    skipped += 1;
                    continue;
                }
                observations.push(Observation {
                    subject: &subject.subject,
                    category: &sa.category,
                    first: sa.score,
                    second: sb.score,
                });
            }
        }

        let subjects: HashSet<&SubjectId> = observations.iter().map(|o| o.subject).collect();

        let mut rank_first = Vec::new();
        let mut rank_second = Vec::new();
        let mut per_category = Vec::new();
        for category in categories {
            let (xs, ys): (Vec<f64>, Vec<f64>) = observations
                .iter()
                .filter(|o| o.category == category)
                .map(|o| (o.first, o.second))
                .unzip();
            let (rx, ry) = (ranks(&xs), ranks(&ys));
            let enough = xs.len() >= 2;
            per_category.push(CategoryCorrelation {
                category: category.clone(),
                subjects: xs.len(),
                pearson: if enough { pearson(&xs, &ys) } else { None },
                spearman: if enough { pearson(&rx, &ry) } else { None },
            });
            if enough {
                rank_first.extend(rx);
                rank_second.extend(ry);
            }
        }

        let (pearson_r, spearman_rho) = if subjects.len() < 2 {
            (None, None)
        } else {
            let (xs, ys): (Vec<f64>, Vec<f64>) =
                observations.iter().map(|o| (o.first, o.second)).unzip();
            (pearson(&xs, &ys), pearson(&rank_first, &rank_second))
        };

        PairCorrelation {
            first: first.clone(),
            second: second.clone(),
            subjects: subjects.len(),
            observations: observations.len(),
            skipped,
            pearson: pearson_r,
            spearman: spearman_rho,
            difference: spearman_rho.zip(pearson_r).map(|(rho, r)| rho - r),
            interpretation: Interpretation::classify(pearson_r, spearman_rho, &self.thresholds),
            per_category,
        }
    }
}

fn ordered_unique<'a, T: Clone + Eq + 'a>(values: impl Iterator<Item = &'a T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}
