//! The versioned pipeline configuration.
//!
//! [`PipelineConfig`] is the single configuration object every use case
//! receives: quota weights, polarity split, category list, scoring constants
//! and the per-rater scales and limits. It is built once (by the
//! infrastructure config loader or in tests) and passed in explicitly.

use super::ExecutionParams;
use assay_domain::{
    Category, ConfigurationError, ConsistencyAnalyzer, ConsistencyThresholds, GradeTable,
    PolaritySplit, QuotaPlan, QuotaPlanner, Rater, RaterWeight, RatingScale, RemainderRule,
    ScoringConstants, ScoringEngine,
};
use std::collections::{BTreeMap, HashSet};

/// Label recorded with reports so results can be traced to a configuration.
pub const DEFAULT_CONFIG_VERSION: &str = "2";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub version: String,
    /// Ordered; the order drives remainder distribution and report layout
    pub categories: Vec<Category>,
    pub collectors: Vec<RaterWeight>,
    /// Fixed pooling roster
    pub evaluators: Vec<Rater>,
    pub polarity_split: PolaritySplit,
    pub target_total: usize,
    /// Reduced target used by `--test-mode`
    pub test_mode_target: usize,
    pub remainder_rule: RemainderRule,
    pub scoring: ScoringConstants,
    pub grades: GradeTable,
    /// Items with fewer records are flagged as under-sampled
    pub min_evaluations_per_item: usize,
    /// Skip pairs where the evaluator also collected the item
    pub exclude_self_evaluation: bool,
    pub consistency: ConsistencyThresholds,
    /// Per-evaluator category scores backed by fewer records are not correlated
    pub consistency_min_sample: usize,
    pub rating_scales: BTreeMap<Rater, RatingScale>,
    pub concurrency: BTreeMap<Rater, usize>,
    pub execution: ExecutionParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let roster = Rater::default_roster();
        Self {
            version: DEFAULT_CONFIG_VERSION.to_string(),
            categories: Category::default_set(),
            collectors: RaterWeight::equal(&roster),
            evaluators: roster,
            polarity_split: PolaritySplit::default(),
            target_total: 1000,
            test_mode_target: 40,
            remainder_rule: RemainderRule::default(),
            scoring: ScoringConstants::default(),
            grades: GradeTable::default(),
            min_evaluations_per_item: 2,
            exclude_self_evaluation: false,
            consistency: ConsistencyThresholds::default(),
            consistency_min_sample: 3,
            rating_scales: BTreeMap::new(),
            concurrency: BTreeMap::new(),
            execution: ExecutionParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Check everything that must hold before any provider is called.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.evaluators.is_empty() {
            return Err(ConfigurationError::NoEvaluators);
        }
        let mut seen = HashSet::new();
        for evaluator in &self.evaluators {
            if !seen.insert(evaluator) {
                return Err(ConfigurationError::Duplicate {
                    kind: "evaluator",
                    value: evaluator.to_string(),
                });
            }
        }
        if self.exclude_self_evaluation
            && self.evaluators.len() < 2
            && self.collectors.iter().any(|c| self.evaluators.contains(&c.rater))
        {
            return Err(ConfigurationError::Invalid {
                field: "exclude_self_evaluation".to_string(),
                message: "a single evaluator cannot rate its own collected items".to_string(),
            });
        }
        if self.test_mode_target == 0 {
            return Err(ConfigurationError::Invalid {
                field: "test_mode_target".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if let Some((rater, _)) = self.concurrency.iter().find(|(_, n)| **n == 0) {
            return Err(ConfigurationError::Invalid {
                field: format!("raters.{}.concurrency", rater),
                message: "must be at least 1".to_string(),
            });
        }
        if self.execution.default_provider_concurrency == 0 {
            return Err(ConfigurationError::Invalid {
                field: "execution.default_provider_concurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        self.scoring.validate()?;
        self.grades.validate()?;
        self.planner(false).validate()?;
        self.planner(true).validate()
    }

    pub fn target(&self, test_mode: bool) -> usize {
        if test_mode {
            self.test_mode_target
        } else {
            self.target_total
        }
    }

    pub fn planner(&self, test_mode: bool) -> QuotaPlanner<'_> {
        QuotaPlanner::new(self.target(test_mode), &self.categories, &self.collectors)
            .with_split(self.polarity_split)
            .with_remainder(self.remainder_rule)
    }

    pub fn plan(&self, test_mode: bool) -> Result<QuotaPlan, ConfigurationError> {
        self.planner(test_mode).plan()
    }

    /// The scale a rater answers in; signed integers unless configured.
    pub fn scale_for(&self, rater: &Rater) -> RatingScale {
        self.rating_scales.get(rater).copied().unwrap_or_default()
    }

    pub fn concurrency_for(&self, rater: &Rater) -> usize {
        self.concurrency
            .get(rater)
            .copied()
            .unwrap_or(self.execution.default_provider_concurrency)
    }

    /// Evaluators an item collected by `collector` is assigned to.
    pub fn evaluators_for(&self, collector: &Rater) -> Vec<Rater> {
        self.evaluators
            .iter()
            .filter(|e| !(self.exclude_self_evaluation && *e == collector))
            .cloned()
            .collect()
    }

    /// Every rater the pipeline may call, collectors first.
    pub fn raters(&self) -> Vec<Rater> {
        let mut raters: Vec<Rater> = self.collectors.iter().map(|c| c.rater.clone()).collect();
        for evaluator in &self.evaluators {
            if !raters.contains(evaluator) {
                raters.push(evaluator.clone());
            }
        }
        raters
    }

    pub fn scoring_engine(&self) -> ScoringEngine {
        ScoringEngine::new(self.scoring, self.grades.clone())
            .with_min_evaluations(self.min_evaluations_per_item)
            .with_exclude_self_evaluation(self.exclude_self_evaluation)
    }

    pub fn consistency_analyzer(&self) -> ConsistencyAnalyzer {
        ConsistencyAnalyzer::new(self.consistency).with_min_sample_size(self.consistency_min_sample)
    }

    // ==================== Builder Methods ====================

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_collectors(mut self, collectors: Vec<RaterWeight>) -> Self {
        self.collectors = collectors;
        self
    }

    pub fn with_evaluators(mut self, evaluators: Vec<Rater>) -> Self {
        self.evaluators = evaluators;
        self
    }

    pub fn with_target(mut self, target: usize) -> Self {
        self.target_total = target;
        self
    }

    pub fn with_exclude_self_evaluation(mut self, exclude: bool) -> Self {
        self.exclude_self_evaluation = exclude;
        self
    }

    pub fn with_scale(mut self, rater: Rater, scale: RatingScale) -> Self {
        self.rating_scales.insert(rater, scale);
        self
    }

    pub fn with_execution(mut self, execution: ExecutionParams) -> Self {
        self.execution = execution;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        let plan = config.plan(false).unwrap();
        assert_eq!(plan.total(), 1000);
        assert_eq!(config.plan(true).unwrap().total(), 40);
    }

    #[test]
    fn test_evaluators_for_excludes_collector_when_configured() {
        let config = PipelineConfig::default();
        assert_eq!(config.evaluators_for(&Rater::Claude).len(), 4);

        let config = config.with_exclude_self_evaluation(true);
        let evaluators = config.evaluators_for(&Rater::Claude);
        assert_eq!(evaluators.len(), 3);
        assert!(!evaluators.contains(&Rater::Claude));
    }

    #[test]
    fn test_rejects_duplicate_evaluators() {
        let config =
            PipelineConfig::default().with_evaluators(vec![Rater::Claude, Rater::Claude]);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Duplicate {
                kind: "evaluator",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_bad_weights_before_any_call() {
        let config = PipelineConfig::default()
            .with_collectors(vec![RaterWeight::new(Rater::Claude, 0.6)]);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::WeightSum { .. })
        ));
    }

    #[test]
    fn test_scale_and_concurrency_fallbacks() {
        let mut config =
            PipelineConfig::default().with_scale(Rater::Gemini, RatingScale::LetterGrade);
        config.concurrency.insert(Rater::Grok, 1);
        assert_eq!(config.scale_for(&Rater::Gemini), RatingScale::LetterGrade);
        assert_eq!(config.scale_for(&Rater::Claude), RatingScale::SignedInteger);
        assert_eq!(config.concurrency_for(&Rater::Grok), 1);
        assert_eq!(config.concurrency_for(&Rater::Claude), 4);
    }

    #[test]
    fn test_raters_union() {
        let config = PipelineConfig::default()
            .with_collectors(vec![RaterWeight::new(Rater::Claude, 1.0)])
            .with_evaluators(vec![Rater::Gpt, Rater::Claude]);
        assert_eq!(config.raters(), vec![Rater::Claude, Rater::Gpt]);
    }
}
