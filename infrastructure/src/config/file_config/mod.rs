//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod execution;
mod pipeline;
mod providers;
mod raters;
mod scoring;
mod storage;

pub use execution::FileExecutionConfig;
pub use pipeline::{FileCollectorConfig, FilePipelineConfig};
pub use providers::{FileAnthropicConfig, FileOpenAiConfig, FileProvidersConfig};
pub use raters::FileRaterConfig;
pub use scoring::{FileConsistencyConfig, FileScoringConfig};
pub use storage::{FileLoggingConfig, FileStoreConfig};

use assay_application::{DEFAULT_CONFIG_VERSION, PipelineConfig};
use assay_domain::{Category, ConfigurationError, GradeTable, Rater, RaterWeight, RatingScale};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Categories, roster, quota split and targets
    pub pipeline: FilePipelineConfig,
    /// Score formula constants and grade table
    pub scoring: FileScoringConfig,
    /// Interpretation thresholds for evaluator comparisons
    pub consistency: FileConsistencyConfig,
    /// Retries, passes and concurrency
    pub execution: FileExecutionConfig,
    /// Per-rater scale, concurrency and provider settings
    pub raters: BTreeMap<String, FileRaterConfig>,
    /// Provider credentials and routing
    pub providers: FileProvidersConfig,
    pub store: FileStoreConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Build the validated pipeline configuration.
    ///
    /// Every problem here is a `ConfigurationError`, raised before any
    /// provider is contacted.
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig, ConfigurationError> {
        let defaults = PipelineConfig::default();
        let pipeline = &self.pipeline;

        let categories = if pipeline.categories.is_empty() {
            defaults.categories
        } else {
            pipeline.categories.iter().map(Category::new).collect()
        };
        let collectors = if pipeline.collectors.is_empty() {
            defaults.collectors
        } else {
            pipeline
                .collectors
                .iter()
                .map(|c| RaterWeight::new(Rater::from(c.rater.as_str()), c.weight))
                .collect()
        };
        let evaluators = if pipeline.evaluators.is_empty() {
            defaults.evaluators
        } else {
            pipeline
                .evaluators
                .iter()
                .map(|e| Rater::from(e.as_str()))
                .collect()
        };
        let grades = if self.scoring.grades.is_empty() {
            GradeTable::default()
        } else {
            GradeTable::new(self.scoring.grades.clone())?
        };

        let mut rating_scales = BTreeMap::new();
        let mut concurrency = BTreeMap::new();
        for (name, rater_config) in &self.raters {
            let rater = Rater::from(name.as_str());
            if let Some(scale) = &rater_config.scale {
                let scale: RatingScale =
                    scale
                        .parse()
                        .map_err(|message| ConfigurationError::Invalid {
                            field: format!("raters.{}.scale", name),
                            message,
                        })?;
                rating_scales.insert(rater.clone(), scale);
            }
            if let Some(limit) = rater_config.concurrency {
                if limit == 0 {
                    return Err(ConfigurationError::Invalid {
                        field: format!("raters.{}.concurrency", name),
                        message: "must be at least 1".to_string(),
                    });
                }
                concurrency.insert(rater, limit);
            }
        }

        let config = PipelineConfig {
            version: pipeline
                .version
                .clone()
                .unwrap_or_else(|| DEFAULT_CONFIG_VERSION.to_string()),
            categories,
            collectors,
            evaluators,
            polarity_split: pipeline.polarity_split,
            target_total: pipeline.target_total,
            test_mode_target: pipeline.test_mode_target,
            remainder_rule: pipeline.remainder_rule,
            scoring: self.scoring.constants(),
            grades,
            min_evaluations_per_item: pipeline.min_evaluations_per_item,
            exclude_self_evaluation: pipeline.exclude_self_evaluation,
            consistency: self.consistency.thresholds,
            consistency_min_sample: self.consistency.min_sample,
            rating_scales,
            concurrency,
            execution: self.execution.to_params(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Settings for `rater`, or defaults when it has no section.
    pub fn rater(&self, rater: &Rater) -> FileRaterConfig {
        self.raters
            .iter()
            .find(|(name, _)| Rater::from(name.as_str()) == *rater)
            .map(|(_, config)| config.clone())
            .unwrap_or_default()
    }
}
