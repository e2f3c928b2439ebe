//! Scoring and consistency configuration from TOML

use assay_domain::{ConsistencyThresholds, GradeTier, ScoringConstants};
use serde::{Deserialize, Serialize};

/// `[scoring]` section; `[[scoring.grades]]` replaces the default table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileScoringConfig {
    pub base: f64,
    pub scale: f64,
    pub multiplier: f64,
    pub max_total: f64,
    pub grades: Vec<GradeTier>,
}

impl Default for FileScoringConfig {
    fn default() -> Self {
        let constants = ScoringConstants::default();
        Self {
            base: constants.base,
            scale: constants.scale,
            multiplier: constants.multiplier,
            max_total: constants.max_total,
            grades: Vec::new(),
        }
    }
}

impl FileScoringConfig {
    pub fn constants(&self) -> ScoringConstants {
        ScoringConstants {
            base: self.base,
            scale: self.scale,
            multiplier: self.multiplier,
            max_total: self.max_total,
        }
    }
}

/// `[consistency]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConsistencyConfig {
    #[serde(flatten)]
    pub thresholds: ConsistencyThresholds,
    /// Per-evaluator category scores need at least this many records
    pub min_sample: usize,
}

impl Default for FileConsistencyConfig {
    fn default() -> Self {
        Self {
            thresholds: ConsistencyThresholds::default(),
            min_sample: 3,
        }
    }
}
