//! Evaluate Pool use case
//!
//! Pooled evaluation: every collected item is rated by every assigned
//! evaluator, regardless of which rater collected it. Each
//! `(item, evaluator)` pair is an independent work item; pairs that already
//! have a record are skipped, so an interrupted run resumes where it left
//! off.

use super::shared::{
    ProviderLimits, ProviderRequest, RunStatus, call_provider, is_cancelled, persist_with_retry,
};
use crate::config::PipelineConfig;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::evidence_store::{
    EvaluationFilter, EvidenceStore, ItemFilter, StoreError, UnavailablePair,
};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::progress::{NoProgress, Phase, ProgressNotifier};
use assay_domain::evidence::parse_evaluation_payload;
use assay_domain::{
    Category, ConfigurationError, EvaluationRecord, EvaluationRequest, EvidenceItem, ItemKey,
    PromptTemplate, Rater, Subject, SubjectId, UnderSampledItem, current_timestamp, normalize,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PoolingError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Persistence failed: {0}")]
    Store(#[from] StoreError),
}

/// A pair that produced no record in this run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedPair {
    pub item: ItemKey,
    pub evaluator: Rater,
    pub reason: String,
}

/// Pooling outcome for one category.
#[derive(Debug, Clone, Serialize)]
pub struct PoolingResult {
    pub category: Category,
    /// Pairs the evaluator roster implies for this category
    pub total_pairs: usize,
    /// Pairs that already had a record before this run
    pub existing: usize,
    pub new_records: usize,
    pub failed_pairs: Vec<FailedPair>,
    /// Pairs skipped because the run was cancelled
    pub skipped: usize,
    /// Items with fewer records than the configured minimum
    pub under_sampled: Vec<UnderSampledItem>,
    pub provider_calls: usize,
}

impl PoolingResult {
    fn new(category: &Category) -> Self {
        Self {
            category: category.clone(),
            total_pairs: 0,
            existing: 0,
            new_records: 0,
            failed_pairs: Vec::new(),
            skipped: 0,
            under_sampled: Vec::new(),
            provider_calls: 0,
        }
    }

    /// Pairs still without a record after this run.
    pub fn missing(&self) -> usize {
        self.total_pairs
            .saturating_sub(self.existing + self.new_records)
    }
}

/// Outcome of a pooling run across categories.
#[derive(Debug, Clone, Serialize)]
pub struct PoolingSummary {
    pub subject: SubjectId,
    pub results: Vec<PoolingResult>,
    pub status: RunStatus,
    pub cancelled: bool,
}

impl PoolingSummary {
    pub fn new_records(&self) -> usize {
        self.results.iter().map(|r| r.new_records).sum()
    }

    pub fn provider_calls(&self) -> usize {
        self.results.iter().map(|r| r.provider_calls).sum()
    }

    pub fn failed_pairs(&self) -> impl Iterator<Item = &FailedPair> {
        self.results.iter().flat_map(|r| r.failed_pairs.iter())
    }
}

/// Input for the EvaluatePool use case
#[derive(Debug, Clone)]
pub struct EvaluatePoolInput {
    pub subject: SubjectId,
    pub category: Option<Category>,
    pub evaluator: Option<Rater>,
    /// Overrides `execution.parallel` when set
    pub parallel: Option<bool>,
}

impl EvaluatePoolInput {
    pub fn new(subject: impl Into<SubjectId>) -> Self {
        Self {
            subject: subject.into(),
            category: None,
            evaluator: None,
            parallel: None,
        }
    }
}

#[derive(Debug)]
enum PairStatus {
    Recorded,
    /// Another writer recorded the pair first
    AlreadyRecorded,
    Failed(String),
    Cancelled,
}

#[derive(Debug)]
struct PairOutcome {
    item: ItemKey,
    evaluator: Rater,
    status: PairStatus,
    provider_calls: usize,
}

/// Use case for pooled evaluation
pub struct EvaluatePoolUseCase<G: LlmGateway + 'static, S: EvidenceStore + 'static> {
    gateway: Arc<G>,
    store: Arc<S>,
    config: Arc<PipelineConfig>,
    logger: Arc<dyn ConversationLogger>,
    limits: ProviderLimits,
    cancellation: Option<CancellationToken>,
}

impl<G: LlmGateway + 'static, S: EvidenceStore + 'static> Clone for EvaluatePoolUseCase<G, S> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            logger: Arc::clone(&self.logger),
            limits: self.limits.clone(),
            cancellation: self.cancellation.clone(),
        }
    }
}

impl<G: LlmGateway + 'static, S: EvidenceStore + 'static> EvaluatePoolUseCase<G, S> {
    pub fn new(gateway: Arc<G>, store: Arc<S>, config: Arc<PipelineConfig>) -> Self {
        let limits = ProviderLimits::from_config(&config);
        Self {
            gateway,
            store,
            config,
            logger: Arc::new(NoConversationLogger),
            limits,
            cancellation: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub async fn execute(&self, input: EvaluatePoolInput) -> Result<PoolingSummary, PoolingError> {
        self.execute_with_progress(input, &NoProgress).await
    }

    /// Evaluate the pool of every configured category (or the one requested).
    pub async fn execute_with_progress(
        &self,
        input: EvaluatePoolInput,
        progress: &dyn ProgressNotifier,
    ) -> Result<PoolingSummary, PoolingError> {
        self.config.validate()?;

        if let Some(category) = &input.category
            && !self.config.categories.contains(category)
        {
            return Err(ConfigurationError::Invalid {
                field: "category".to_string(),
                message: format!("'{}' is not a configured category", category),
            }
            .into());
        }
        if let Some(evaluator) = &input.evaluator
            && !self.config.evaluators.contains(evaluator)
        {
            return Err(ConfigurationError::Invalid {
                field: "evaluator".to_string(),
                message: format!("'{}' is not a configured evaluator", evaluator),
            }
            .into());
        }

        let subject = match self.store.get_subject(&input.subject).await? {
            Some(subject) => subject,
            None => Subject::new(input.subject.clone(), input.subject.as_str()),
        };
        let categories: Vec<Category> = match &input.category {
            Some(category) => vec![category.clone()],
            None => self.config.categories.clone(),
        };
        let parallel = input.parallel.unwrap_or(self.config.execution.parallel);

        let mut results = Vec::new();
        for category in &categories {
            if is_cancelled(&self.cancellation) {
                break;
            }
            let result = self
                .pool_category(
                    &subject,
                    category,
                    input.evaluator.as_ref(),
                    parallel,
                    progress,
                )
                .await?;
            results.push(result);
        }

        let mut missing = 0;
        let mut short_categories = Vec::new();
        for result in &results {
            if result.missing() > 0 {
                missing += result.missing();
                short_categories.push(result.category.clone());
            }
        }
        // Categories never reached because of cancellation are not counted
        // as missing; `cancelled` reports the interruption.
        let flagged = results.iter().map(|r| r.under_sampled.len()).sum();
        let status = RunStatus::from_counts(missing, short_categories, flagged);
        info!("Pooling for {}: {}", subject.id, status);

        Ok(PoolingSummary {
            subject: subject.id,
            results,
            status,
            cancelled: is_cancelled(&self.cancellation),
        })
    }

    /// Evaluate every pending pair of one category with the full roster.
    pub async fn evaluate_pool(
        &self,
        subject: &Subject,
        category: &Category,
    ) -> Result<PoolingResult, PoolingError> {
        self.pool_category(
            subject,
            category,
            None,
            self.config.execution.parallel,
            &NoProgress,
        )
        .await
    }

    async fn pool_category(
        &self,
        subject: &Subject,
        category: &Category,
        only_evaluator: Option<&Rater>,
        parallel: bool,
        progress: &dyn ProgressNotifier,
    ) -> Result<PoolingResult, PoolingError> {
        let params = &self.config.execution;
        let mut result = PoolingResult::new(category);

        let items = self
            .store
            .list_items(&ItemFilter::subject(subject.id.clone()).with_category(category.clone()))
            .await?;
        let records = self
            .store
            .list_evaluations(
                &EvaluationFilter::subject(subject.id.clone()).with_category(category.clone()),
            )
            .await?;
        let recorded: HashSet<(&ItemKey, &Rater)> =
            records.iter().map(|r| (&r.item, &r.evaluator)).collect();

        let mut pending: Vec<(EvidenceItem, Rater)> = Vec::new();
        for item in &items {
            for evaluator in self.config.evaluators_for(&item.key.collector) {
                if only_evaluator.is_some_and(|only| only != &evaluator) {
                    continue;
                }
                result.total_pairs += 1;
                if recorded.contains(&(&item.key, &evaluator)) {
                    result.existing += 1;
                } else {
                    pending.push((item.clone(), evaluator));
                }
            }
        }

        info!(
            "Pooling {}/{}: {} items, {} pairs pending ({} already recorded)",
            subject.id,
            category,
            items.len(),
            pending.len(),
            result.existing
        );

        let phase = Phase::Pooling;
        progress.on_phase_start(&phase, pending.len());
        let mut outcomes = Vec::new();

        if parallel {
            let mut join_set = JoinSet::new();
            let mut fatal = None;
            for (item, evaluator) in pending {
                let this = self.clone();
                let subject = subject.clone();
                join_set.spawn(async move { this.evaluate_pair(&subject, &item, &evaluator).await });
            }
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok(outcome)) => {
                        progress.on_task_complete(
                            &phase,
                            &pair_label(&outcome.item, &outcome.evaluator),
                            matches!(
                                outcome.status,
                                PairStatus::Recorded | PairStatus::AlreadyRecorded
                            ),
                        );
                        outcomes.push(outcome);
                    }
                    Ok(Err(e)) => {
                        warn!("Aborting pooling: {}", e);
                        join_set.abort_all();
                        if fatal.is_none() {
                            fatal = Some(e);
                        }
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => {
                        warn!("Task join error: {}", e);
                    }
                }
            }
            if let Some(e) = fatal {
                return Err(e);
            }
        } else {
            for (item, evaluator) in pending {
                if is_cancelled(&self.cancellation) {
                    outcomes.push(PairOutcome {
                        item: item.key,
                        evaluator,
                        status: PairStatus::Cancelled,
                        provider_calls: 0,
                    });
                    continue;
                }
                let outcome = self.evaluate_pair(subject, &item, &evaluator).await?;
                progress.on_task_complete(
                    &phase,
                    &pair_label(&outcome.item, &outcome.evaluator),
                    matches!(
                        outcome.status,
                        PairStatus::Recorded | PairStatus::AlreadyRecorded
                    ),
                );
                outcomes.push(outcome);
            }
        }
        progress.on_phase_complete(&phase);

        for outcome in outcomes {
            result.provider_calls += outcome.provider_calls;
            match outcome.status {
                PairStatus::Recorded => result.new_records += 1,
                PairStatus::AlreadyRecorded => result.existing += 1,
                PairStatus::Cancelled => result.skipped += 1,
                PairStatus::Failed(reason) => {
                    let pair = UnavailablePair {
                        item: outcome.item.clone(),
                        evaluator: outcome.evaluator.clone(),
                        reason: reason.clone(),
                        recorded_at: current_timestamp(),
                    };
                    if let Err(e) = persist_with_retry(params, "unavailable pair", || {
                        self.store.mark_unavailable(&pair)
                    })
                    .await
                    {
                        if e.is_catastrophic() {
                            return Err(e.into());
                        }
                        warn!("Could not mark {} unavailable: {}", pair.item, e);
                    }
                    result.failed_pairs.push(FailedPair {
                        item: outcome.item,
                        evaluator: outcome.evaluator,
                        reason,
                    });
                }
            }
        }

        result.under_sampled = self.under_sampled(subject, category, &items).await?;
        if !result.under_sampled.is_empty() {
            warn!(
                "{}/{}: {} items below {} evaluations",
                subject.id,
                category,
                result.under_sampled.len(),
                self.config.min_evaluations_per_item
            );
        }
        Ok(result)
    }

    async fn under_sampled(
        &self,
        subject: &Subject,
        category: &Category,
        items: &[EvidenceItem],
    ) -> Result<Vec<UnderSampledItem>, StoreError> {
        let records = self
            .store
            .list_evaluations(
                &EvaluationFilter::subject(subject.id.clone()).with_category(category.clone()),
            )
            .await?;
        let mut per_item: HashMap<&ItemKey, usize> = HashMap::new();
        for record in records
            .iter()
            .filter(|r| !(self.config.exclude_self_evaluation && r.is_self_evaluation()))
        {
            *per_item.entry(&record.item).or_default() += 1;
        }
        Ok(items
            .iter()
            .map(|item| UnderSampledItem {
                item: item.key.clone(),
                records: per_item.get(&item.key).copied().unwrap_or(0),
            })
            .filter(|u| u.records < self.config.min_evaluations_per_item)
            .collect())
    }

    /// Rate one item with one evaluator and persist the record.
    ///
    /// Only a catastrophic store failure is an error; anything else fails
    /// the pair alone.
    async fn evaluate_pair(
        &self,
        subject: &Subject,
        item: &EvidenceItem,
        evaluator: &Rater,
    ) -> Result<PairOutcome, PoolingError> {
        let params = &self.config.execution;
        let task = pair_label(&item.key, evaluator);
        let scale = self.config.scale_for(evaluator);
        let prompt = PromptTemplate::evaluation_prompt(&EvaluationRequest {
            subject,
            item,
            scale,
        });
        let request = ProviderRequest {
            rater: evaluator,
            system_prompt: PromptTemplate::evaluation_system(),
            prompt: &prompt,
            task: &task,
        };
        let limiter = self.limits.for_rater(evaluator);

        let mut outcome = PairOutcome {
            item: item.key.clone(),
            evaluator: evaluator.clone(),
            status: PairStatus::Cancelled,
            provider_calls: 0,
        };

        let mut parse_failures = 0;
        let response = loop {
            self.logger.log(ConversationEvent::request(
                "evaluation_request",
                evaluator,
                &task,
                &prompt,
            ));
            let call = call_provider(
                self.gateway.as_ref(),
                &limiter,
                &request,
                params,
                &self.cancellation,
            )
            .await;
            outcome.provider_calls += call.calls;

            let payload = match call.result {
                Ok(payload) => payload,
                Err(_) if call.cancelled => {
                    debug!("{}: cancelled", task);
                    return Ok(outcome);
                }
                Err(e) => {
                    warn!("{}: provider failed: {}", task, e);
                    self.logger.log(ConversationEvent::failure(
                        "provider_error",
                        evaluator,
                        &task,
                        &e.to_string(),
                    ));
                    outcome.status = PairStatus::Failed(e.to_string());
                    return Ok(outcome);
                }
            };
            self.logger.log(ConversationEvent::response(
                "evaluation_response",
                evaluator,
                &task,
                &payload,
            ));

            match parse_evaluation_payload(&payload) {
                Ok(response) => break response,
                Err(e) => {
                    self.logger.log(ConversationEvent::failure(
                        "parse_error",
                        evaluator,
                        &task,
                        &e.to_string(),
                    ));
                    if parse_failures < params.parse_retries {
                        parse_failures += 1;
                        warn!("{}: unparseable payload ({}), asking again", task, e);
                        continue;
                    }
                    warn!("{}: unparseable payload ({}), pair failed", task, e);
                    outcome.status = PairStatus::Failed(format!("unparseable payload: {}", e));
                    return Ok(outcome);
                }
            }
        };

        let rating = match normalize(&response.raw_rating, scale) {
            Ok(rating) => rating,
            Err(e) => {
                warn!("{}: {}", task, e);
                self.logger.log(ConversationEvent::failure(
                    "normalization_error",
                    evaluator,
                    &task,
                    &e.to_string(),
                ));
                outcome.status = PairStatus::Failed(e.to_string());
                return Ok(outcome);
            }
        };

        let record = EvaluationRecord {
            item: item.key.clone(),
            evaluator: evaluator.clone(),
            raw_rating: response.raw_rating,
            scale,
            rating,
            rationale: response.rationale,
            evaluated_at: current_timestamp(),
        };
        let inserted =
            match persist_with_retry(params, &task, || self.store.insert_evaluation(&record)).await {
                Ok(inserted) => inserted,
                Err(e) if e.is_catastrophic() => return Err(e.into()),
                Err(e) => {
                    warn!("{}: persistence failed: {}", task, e);
                    outcome.status = PairStatus::Failed(format!("persistence: {}", e));
                    return Ok(outcome);
                }
            };
        debug!("{}: rated {} ({})", task, record.rating, record.raw_rating);

        outcome.status = if inserted {
            PairStatus::Recorded
        } else {
            PairStatus::AlreadyRecorded
        };
        Ok(outcome)
    }
}

fn pair_label(item: &ItemKey, evaluator: &Rater) -> String {
    format!("{} by {}", item, evaluator)
}
