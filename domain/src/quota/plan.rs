//! Quota plan value objects

use crate::core::category::Category;
use crate::core::rater::Rater;
use crate::evidence::item::Polarity;
use serde::{Deserialize, Serialize};

/// A collecting rater and its share of every category's quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaterWeight {
    pub rater: Rater,
    pub weight: f64,
}

impl RaterWeight {
    pub fn new(rater: impl Into<Rater>, weight: f64) -> Self {
        Self {
            rater: rater.into(),
            weight,
        }
    }

    /// Equal weights for every rater in the roster.
    pub fn equal(raters: &[Rater]) -> Vec<RaterWeight> {
        let weight = 1.0 / raters.len().max(1) as f64;
        raters
            .iter()
            .map(|r| RaterWeight::new(r.clone(), weight))
            .collect()
    }
}

/// Required share of each polarity bucket. Fractions sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolaritySplit {
    pub negative: f64,
    pub positive: f64,
    pub free: f64,
}

impl Default for PolaritySplit {
    fn default() -> Self {
        Self {
            negative: 0.2,
            positive: 0.2,
            free: 0.6,
        }
    }
}

impl PolaritySplit {
    pub fn fraction(&self, polarity: Polarity) -> f64 {
        match polarity {
            Polarity::Negative => self.negative,
            Polarity::Positive => self.positive,
            Polarity::Free => self.free,
        }
    }

    pub fn sum(&self) -> f64 {
        self.negative + self.positive + self.free
    }
}

/// What to do when the target total does not divide evenly across categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderRule {
    /// Give one extra item to each of the first `T mod |C|` categories.
    #[default]
    FirstCategories,
    /// Refuse indivisible totals.
    Strict,
}

/// Quota of one `(category, rater, polarity)` cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellQuota {
    pub category: Category,
    pub rater: Rater,
    pub polarity: Polarity,
    pub quota: usize,
}

/// Everything planned for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryQuota {
    pub category: Category,
    pub total: usize,
    /// In collector roster order; sums to `total`
    pub per_rater: Vec<(Rater, usize)>,
    /// In [`Polarity::ALL`] order; sums to `total`
    pub per_polarity: Vec<(Polarity, usize)>,
    /// Rater-major; row sums equal `per_rater`, column sums equal `per_polarity`
    pub cells: Vec<CellQuota>,
}

impl CategoryQuota {
    pub fn rater_quota(&self, rater: &Rater) -> usize {
        self.per_rater
            .iter()
            .find(|(r, _)| r == rater)
            .map(|(_, q)| *q)
            .unwrap_or(0)
    }

    pub fn polarity_quota(&self, polarity: Polarity) -> usize {
        self.per_polarity
            .iter()
            .find(|(p, _)| *p == polarity)
            .map(|(_, q)| *q)
            .unwrap_or(0)
    }
}

/// The precomputed allocation of evidence items across cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaPlan {
    pub target: usize,
    pub categories: Vec<CategoryQuota>,
}

impl QuotaPlan {
    /// Sum of all category quotas (equals `target` for an unfiltered plan).
    pub fn total(&self) -> usize {
        self.categories.iter().map(|c| c.total).sum()
    }

    pub fn category(&self, category: &Category) -> Option<&CategoryQuota> {
        self.categories.iter().find(|c| &c.category == category)
    }

    pub fn cells(&self) -> impl Iterator<Item = &CellQuota> {
        self.categories.iter().flat_map(|c| c.cells.iter())
    }

    /// Restrict the plan to one category and/or one rater.
    ///
    /// Category totals are kept so completion checks still compare against
    /// the full category quota; only the cells to drive are narrowed.
    pub fn filtered(&self, category: Option<&Category>, rater: Option<&Rater>) -> QuotaPlan {
        let categories = self
            .categories
            .iter()
            .filter(|c| category.is_none_or(|wanted| &c.category == wanted))
            .map(|c| CategoryQuota {
                cells: c
                    .cells
                    .iter()
                    .filter(|cell| rater.is_none_or(|wanted| &cell.rater == wanted))
                    .cloned()
                    .collect(),
                ..c.clone()
            })
            .collect();
        QuotaPlan {
            target: self.target,
            categories,
        }
    }
}
