//! Pipeline configuration from TOML (`[pipeline]` section)

use assay_domain::{PolaritySplit, RemainderRule};
use serde::{Deserialize, Serialize};

/// A collecting rater and its quota weight (`[[pipeline.collectors]]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCollectorConfig {
    pub rater: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePipelineConfig {
    /// Label recorded with reports
    pub version: Option<String>,
    /// Ordered category keys; empty means the default ten
    pub categories: Vec<String>,
    /// Collectors with weights; empty means the default roster, weighted equally
    pub collectors: Vec<FileCollectorConfig>,
    /// Evaluator roster; empty means the default roster
    pub evaluators: Vec<String>,
    pub polarity_split: PolaritySplit,
    pub target_total: usize,
    pub test_mode_target: usize,
    pub remainder_rule: RemainderRule,
    pub min_evaluations_per_item: usize,
    pub exclude_self_evaluation: bool,
}

impl Default for FilePipelineConfig {
    fn default() -> Self {
        Self {
            version: None,
            categories: Vec::new(),
            collectors: Vec::new(),
            evaluators: Vec::new(),
            polarity_split: PolaritySplit::default(),
            target_total: 1000,
            test_mode_target: 40,
            remainder_rule: RemainderRule::default(),
            min_evaluations_per_item: 2,
            exclude_self_evaluation: false,
        }
    }
}
