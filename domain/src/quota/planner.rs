//! Quota planning
//!
//! Splits a target item count across categories, collecting raters and
//! polarity buckets. All rounding is deterministic (largest remainder, ties
//! to the earlier entry), so the same inputs always give the same plan.

use super::plan::{CategoryQuota, CellQuota, PolaritySplit, QuotaPlan, RaterWeight, RemainderRule};
use crate::core::category::Category;
use crate::core::error::ConfigurationError;
use crate::evidence::item::Polarity;
use std::collections::HashSet;

/// Tolerance when checking that weights and fractions sum to 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Inputs to the planner.
#[derive(Debug, Clone)]
pub struct QuotaPlanner<'a> {
    pub target: usize,
    pub categories: &'a [Category],
    pub collectors: &'a [RaterWeight],
    pub split: PolaritySplit,
    pub remainder: RemainderRule,
}

impl<'a> QuotaPlanner<'a> {
    pub fn new(target: usize, categories: &'a [Category], collectors: &'a [RaterWeight]) -> Self {
        Self {
            target,
            categories,
            collectors,
            split: PolaritySplit::default(),
            remainder: RemainderRule::default(),
        }
    }

    pub fn with_split(mut self, split: PolaritySplit) -> Self {
        self.split = split;
        self
    }

    pub fn with_remainder(mut self, remainder: RemainderRule) -> Self {
        self.remainder = remainder;
        self
    }

    /// Check the inputs without computing a plan.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.categories.is_empty() {
            return Err(ConfigurationError::NoCategories);
        }
        if self.collectors.is_empty() {
            return Err(ConfigurationError::NoCollectors);
        }
        if self.target == 0 {
            return Err(ConfigurationError::EmptyTarget);
        }

        let mut seen = HashSet::new();
        for category in self.categories {
            if !seen.insert(category.as_str()) {
                return Err(ConfigurationError::Duplicate {
                    kind: "category",
                    value: category.to_string(),
                });
            }
        }
        let mut seen = HashSet::new();
        for c in self.collectors {
            if !seen.insert(&c.rater) {
                return Err(ConfigurationError::Duplicate {
                    kind: "collector",
                    value: c.rater.to_string(),
                });
            }
            if !c.weight.is_finite() || c.weight < 0.0 {
                return Err(ConfigurationError::InvalidWeight {
                    rater: c.rater.to_string(),
                    weight: c.weight,
                });
            }
        }

        let weight_sum: f64 = self.collectors.iter().map(|c| c.weight).sum();
        if (weight_sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigurationError::WeightSum { sum: weight_sum });
        }

        let split_sum = self.split.sum();
        let split_valid = Polarity::ALL
            .iter()
            .all(|p| self.split.fraction(*p).is_finite() && self.split.fraction(*p) >= 0.0);
        if !split_valid || (split_sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigurationError::PolaritySum { sum: split_sum });
        }

        if self.remainder == RemainderRule::Strict && self.target % self.categories.len() != 0 {
            return Err(ConfigurationError::IndivisibleTotal {
                total: self.target,
                categories: self.categories.len(),
            });
        }

        Ok(())
    }

    /// Compute the plan.
    ///
    /// # Examples
    ///
    /// ```
    /// use assay_domain::core::category::Category;
    /// use assay_domain::core::rater::Rater;
    /// use assay_domain::quota::{QuotaPlanner, RaterWeight};
    ///
    /// let categories = Category::default_set();
    /// let collectors = vec![RaterWeight::new(Rater::Claude, 0.7), RaterWeight::new(Rater::Gpt, 0.3)];
    /// let plan = QuotaPlanner::new(100, &categories, &collectors).plan().unwrap();
    ///
    /// assert_eq!(plan.total(), 100);
    /// for category in &plan.categories {
    ///     assert_eq!(category.total, 10);
    ///     assert_eq!(category.rater_quota(&Rater::Claude), 7);
    ///     assert_eq!(category.rater_quota(&Rater::Gpt), 3);
    /// }
    /// ```
    pub fn plan(&self) -> Result<QuotaPlan, ConfigurationError> {
        self.validate()?;

        let per_category = self.target / self.categories.len();
        let extra = self.target % self.categories.len();
        let weights: Vec<f64> = self.collectors.iter().map(|c| c.weight).collect();
        let fractions: Vec<f64> = Polarity::ALL.iter().map(|p| self.split.fraction(*p)).collect();

        let categories = self
            .categories
            .iter()
            .enumerate()
            .map(|(i, category)| {
                let total = per_category + usize::from(i < extra);
                let rater_quotas = largest_remainder(total, &weights);
                let polarity_quotas = largest_remainder(total, &fractions);
                let matrix = allocate_cells(&rater_quotas, &polarity_quotas, &fractions);

                let cells = self
                    .collectors
                    .iter()
                    .zip(&matrix)
                    .flat_map(|(collector, row)| {
                        Polarity::ALL.iter().zip(row).map(|(polarity, quota)| CellQuota {
                            category: category.clone(),
                            rater: collector.rater.clone(),
                            polarity: *polarity,
                            quota: *quota,
                        })
                    })
                    .collect();

                CategoryQuota {
                    category: category.clone(),
                    total,
                    per_rater: self
                        .collectors
                        .iter()
                        .map(|c| c.rater.clone())
                        .zip(rater_quotas)
                        .collect(),
                    per_polarity: Polarity::ALL.iter().copied().zip(polarity_quotas).collect(),
                    cells,
                }
            })
            .collect();

        Ok(QuotaPlan {
            target: self.target,
            categories,
        })
    }
}

/// Round to nine decimals so that `10 * 0.7` does not floor to 6.
fn ideal_share(total: usize, weight: f64) -> f64 {
    (total as f64 * weight * 1e9).round() / 1e9
}

/// Largest-remainder apportionment of `total` by `weights` (which sum to 1).
///
/// Ties in the fractional part go to the earlier index.
pub fn largest_remainder(total: usize, weights: &[f64]) -> Vec<usize> {
    let ideals: Vec<f64> = weights.iter().map(|w| ideal_share(total, *w)).collect();
    let mut quotas: Vec<usize> = ideals.iter().map(|x| x.floor() as usize).collect();
    let assigned: usize = quotas.iter().sum();
    let mut leftover = total.saturating_sub(assigned);

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = ideals[a] - ideals[a].floor();
        let fb = ideals[b] - ideals[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });

    for &i in order.iter().cycle().take(weights.len() * 2) {
        if leftover == 0 {
            break;
        }
        quotas[i] += 1;
        leftover -= 1;
    }

    quotas
}

/// Fill a rater × polarity matrix whose row sums are `rows` and column sums
/// are `columns`, staying as close as possible to `rows[r] * fractions[c]`.
///
/// Starts from the floored ideal and hands out the remaining units to the
/// cell with the largest fractional remainder among cells whose row and
/// column both still have a deficit. Such a cell always exists because the
/// row deficits and column deficits have the same total.
fn allocate_cells(rows: &[usize], columns: &[usize], fractions: &[f64]) -> Vec<Vec<usize>> {
    let ideal: Vec<Vec<f64>> = rows
        .iter()
        .map(|r| fractions.iter().map(|f| ideal_share(*r, *f)).collect())
        .collect();
    let mut matrix: Vec<Vec<usize>> = ideal
        .iter()
        .map(|row| row.iter().map(|x| x.floor() as usize).collect())
        .collect();

    // Clamp floors so no column starts above its quota.
    for (c, &col_quota) in columns.iter().enumerate() {
        let mut excess = matrix.iter().map(|row| row[c]).sum::<usize>().saturating_sub(col_quota);
        for row in matrix.iter_mut().rev() {
            if excess == 0 {
                break;
            }
            let take = row[c].min(excess);
            row[c] -= take;
            excess -= take;
        }
    }

    let mut row_deficit: Vec<usize> = rows
        .iter()
        .zip(&matrix)
        .map(|(quota, row)| quota.saturating_sub(row.iter().sum()))
        .collect();
    let mut col_deficit: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(c, quota)| quota.saturating_sub(matrix.iter().map(|row| row[c]).sum()))
        .collect();

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for (r, row_ideal) in ideal.iter().enumerate() {
            if row_deficit[r] == 0 {
                continue;
            }
            for (c, x) in row_ideal.iter().enumerate() {
                if col_deficit[c] == 0 {
                    continue;
                }
                let remainder = x - matrix[r][c] as f64;
                if best.is_none_or(|(_, _, b)| remainder > b) {
                    best = Some((r, c, remainder));
                }
            }
        }
        let Some((r, c, _)) = best else {
            break;
        };
        matrix[r][c] += 1;
        row_deficit[r] -= 1;
        col_deficit[c] -= 1;
    }

    matrix
}
