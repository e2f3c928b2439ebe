//! Consistency report value objects

use crate::core::category::Category;
use crate::core::rater::Rater;
use crate::core::subject::SubjectId;
use serde::{Deserialize, Serialize};

/// Cut-offs used to interpret a pair of correlations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyThresholds {
    /// Correlation at or above which raters are considered aligned
    pub strong: f64,
    /// Spearman minus Pearson at or above which scores diverge from ranks
    pub divergence: f64,
    /// Spearman below which raters substantively disagree
    pub weak: f64,
}

impl Default for ConsistencyThresholds {
    fn default() -> Self {
        Self {
            strong: 0.7,
            divergence: 0.3,
            weak: 0.3,
        }
    }
}

/// What a pair of correlations says about two evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpretation {
    /// Scores and ranks both agree.
    Agreement,
    /// Ranks agree but absolute scores do not: one rater is offset or
    /// compressed relative to the other, not disagreeing.
    CalibrationOffset,
    /// Even the orderings disagree.
    Disagreement,
    Moderate,
    /// Not enough data to correlate.
    Undetermined,
}

impl Interpretation {
    pub fn classify(
        pearson: Option<f64>,
        spearman: Option<f64>,
        thresholds: &ConsistencyThresholds,
    ) -> Self {
        let Some(rho) = spearman else {
            return Interpretation::Undetermined;
        };
        if rho < thresholds.weak {
            return Interpretation::Disagreement;
        }
        if rho >= thresholds.strong {
            return match pearson {
                Some(r) if r >= thresholds.strong && rho - r < thresholds.divergence => {
                    Interpretation::Agreement
                }
                Some(r) if rho - r < thresholds.divergence => Interpretation::Moderate,
                _ => Interpretation::CalibrationOffset,
            };
        }
        Interpretation::Moderate
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interpretation::Agreement => "agreement",
            Interpretation::CalibrationOffset => "calibration offset",
            Interpretation::Disagreement => "disagreement",
            Interpretation::Moderate => "moderate",
            Interpretation::Undetermined => "undetermined",
        }
    }

    /// Whether this points at systematic rater bias worth reviewing.
    pub fn is_flagged(&self) -> bool {
        matches!(
            self,
            Interpretation::CalibrationOffset | Interpretation::Disagreement
        )
    }
}

impl std::fmt::Display for Interpretation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Number of records behind one evaluator's score for one subject and category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSize {
    pub subject: SubjectId,
    pub category: Category,
    pub evaluator: Rater,
    pub records: usize,
    /// `None` when the evaluator has no records here
    pub score: Option<f64>,
    /// Below the minimum sample size; excluded from correlations
    pub under_sampled: bool,
}

/// Correlation of two evaluators restricted to one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCorrelation {
    pub category: Category,
    pub subjects: usize,
    pub pearson: Option<f64>,
    pub spearman: Option<f64>,
}

/// Correlation between two evaluators across subjects and categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCorrelation {
    pub first: Rater,
    pub second: Rater,
    /// Distinct subjects contributing at least one observation
    pub subjects: usize,
    /// (subject, category) score pairs used
    pub observations: usize,
    /// Pairs skipped because either side was under-sampled
    pub skipped: usize,
    pub pearson: Option<f64>,
    pub spearman: Option<f64>,
    /// `spearman - pearson` when both exist
    pub difference: Option<f64>,
    pub interpretation: Interpretation,
    pub per_category: Vec<CategoryCorrelation>,
}

/// Pairwise rater consistency across subjects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub subjects: Vec<SubjectId>,
    pub evaluators: Vec<Rater>,
    pub min_sample_size: usize,
    pub thresholds: ConsistencyThresholds,
    pub pairs: Vec<PairCorrelation>,
    pub samples: Vec<SampleSize>,
    /// Milliseconds since epoch
    pub generated_at: u64,
}

impl ConsistencyReport {
    pub fn pair(&self, a: &Rater, b: &Rater) -> Option<&PairCorrelation> {
        self.pairs.iter().find(|p| {
            (&p.first == a && &p.second == b) || (&p.first == b && &p.second == a)
        })
    }

    pub fn flagged(&self) -> impl Iterator<Item = &PairCorrelation> {
        self.pairs.iter().filter(|p| p.interpretation.is_flagged())
    }

    pub fn under_sampled(&self) -> impl Iterator<Item = &SampleSize> {
        self.samples.iter().filter(|s| s.under_sampled)
    }
}
