//! Collect Evidence use case
//!
//! Drives the collecting raters through the quota plan for one subject.
//!
//! Each `(category, rater, polarity)` cell is one work item: prompt the
//! rater for the cell's shortfall, parse and validate the payload, then
//! insert the accepted items by their natural key. Cells already at quota
//! are skipped, so re-running against a satisfied store makes no provider
//! calls. After the first pass, categories still short by more than the
//! tolerance get a bounded number of re-collection passes.

use super::inspect_status::{CellStatus, category_shortfalls, cell_statuses};
use super::shared::{
    ProviderLimits, ProviderRequest, RunStatus, call_provider, is_cancelled, persist_with_retry,
    serialize_display,
};
use crate::config::PipelineConfig;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::evidence_store::{EvidenceStore, ItemFilter, StoreError};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::progress::{NoProgress, Phase, ProgressNotifier};
use assay_domain::core::string::normalize_title;
use assay_domain::evidence::{SEQUENCE_BLOCK, parse_collection_payload, validate_candidates};
use assay_domain::{
    Category, CollectionRequest, ConfigurationError, EvidenceItem, ItemKey, Polarity,
    PromptTemplate, QuotaPlan, Rater, Subject, SubjectId, ValidationError, current_timestamp,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Titles of existing pool items listed in a collection prompt.
const MAX_KNOWN_TITLES: usize = 50;

/// Errors that abort a collection run
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Persistence failed: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of one cell attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResult {
    pub category: Category,
    pub rater: Rater,
    pub polarity: Polarity,
    /// Items asked for (the cell's shortfall)
    pub requested: usize,
    /// New items persisted
    pub accepted: usize,
    #[serde(serialize_with = "serialize_display")]
    pub rejected: Vec<ValidationError>,
    /// Set when the cell failed without a usable payload
    pub provider_error: Option<String>,
    pub provider_calls: usize,
}

impl CollectionResult {
    fn new(category: &Category, rater: &Rater, polarity: Polarity, requested: usize) -> Self {
        Self {
            category: category.clone(),
            rater: rater.clone(),
            polarity,
            requested,
            accepted: 0,
            rejected: Vec::new(),
            provider_error: None,
            provider_calls: 0,
        }
    }

    pub fn task_label(&self) -> String {
        format!("{}/{}/{}", self.category, self.rater, self.polarity)
    }

    pub fn is_success(&self) -> bool {
        self.provider_error.is_none()
    }
}

/// Outcome of a whole collection run.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub subject: SubjectId,
    /// Every cell attempt, across all passes
    pub results: Vec<CollectionResult>,
    /// Final per-cell counts, re-queried from the store
    pub cells: Vec<CellStatus>,
    /// Re-collection passes run after the first pass
    pub recollection_passes: usize,
    pub provider_calls: usize,
    pub status: RunStatus,
    pub cancelled: bool,
}

impl CollectionSummary {
    pub fn accepted(&self) -> usize {
        self.results.iter().map(|r| r.accepted).sum()
    }

    pub fn rejected(&self) -> usize {
        self.results.iter().map(|r| r.rejected.len()).sum()
    }

    pub fn failed_cells(&self) -> impl Iterator<Item = &CollectionResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Input for the CollectEvidence use case
#[derive(Debug, Clone)]
pub struct CollectEvidenceInput {
    pub subject: SubjectId,
    pub category: Option<Category>,
    pub rater: Option<Rater>,
    /// Use the reduced test-mode target
    pub test_mode: bool,
    /// Overrides `execution.parallel` when set
    pub parallel: Option<bool>,
}

impl CollectEvidenceInput {
    pub fn new(subject: impl Into<SubjectId>) -> Self {
        Self {
            subject: subject.into(),
            category: None,
            rater: None,
            test_mode: false,
            parallel: None,
        }
    }
}

/// Use case for quota-balanced evidence collection
pub struct CollectEvidenceUseCase<G: LlmGateway + 'static, S: EvidenceStore + 'static> {
    gateway: Arc<G>,
    store: Arc<S>,
    config: Arc<PipelineConfig>,
    logger: Arc<dyn ConversationLogger>,
    limits: ProviderLimits,
    cancellation: Option<CancellationToken>,
}

impl<G: LlmGateway + 'static, S: EvidenceStore + 'static> Clone for CollectEvidenceUseCase<G, S> {
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

impl<G: LlmGateway + 'static, S: EvidenceStore + 'static> CollectEvidenceUseCase<G, S> {
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

    /// Validate the configuration, build the (filtered) plan and collect it.
    pub async fn execute(
        &self,
        input: CollectEvidenceInput,
    ) -> Result<CollectionSummary, CollectError> {
        self.execute_with_progress(input, &NoProgress).await
    }

    pub async fn execute_with_progress(
        &self,
        input: CollectEvidenceInput,
        progress: &dyn ProgressNotifier,
    ) -> Result<CollectionSummary, CollectError> {
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
        if let Some(rater) = &input.rater
            && !self.config.collectors.iter().any(|c| &c.rater == rater)
        {
            return Err(ConfigurationError::Invalid {
                field: "rater".to_string(),
                message: format!("'{}' is not a configured collector", rater),
            }
            .into());
        }

        let plan = self
            .config
            .plan(input.test_mode)?
            .filtered(input.category.as_ref(), input.rater.as_ref());
        let parallel = input.parallel.unwrap_or(self.config.execution.parallel);

        self.collect_plan(&input.subject, &plan, parallel, progress)
            .await
    }

    /// Collect every under-quota cell of `plan`.
    pub async fn collect_all(
        &self,
        subject: &SubjectId,
        plan: &QuotaPlan,
    ) -> Result<CollectionSummary, CollectError> {
        self.collect_plan(subject, plan, self.config.execution.parallel, &NoProgress)
            .await
    }

    async fn collect_plan(
        &self,
        subject_id: &SubjectId,
        plan: &QuotaPlan,
        parallel: bool,
        progress: &dyn ProgressNotifier,
    ) -> Result<CollectionSummary, CollectError> {
        let subject = self.resolve_subject(subject_id).await?;
        let tolerance = self.config.execution.under_quota_tolerance;
        info!(
            "Collecting evidence for {} ({} cells, target {})",
            subject.id,
            plan.cells().count(),
            plan.total()
        );

        let mut results = Vec::new();
        let mut cells = cell_statuses(self.store.as_ref(), &subject.id, plan).await?;
        let mut recollect: Option<HashSet<Category>> = None;
        let mut recollection_passes = 0;

        loop {
            let work: Vec<(Category, Rater, Polarity, usize)> = cells
                .iter()
                .filter(|c| c.shortfall() > 0)
                .filter(|c| recollect.as_ref().is_none_or(|set| set.contains(&c.category)))
                .map(|c| (c.category.clone(), c.rater.clone(), c.polarity, c.shortfall()))
                .collect();

            if work.is_empty() {
                debug!("No cells below quota");
                break;
            }
            if is_cancelled(&self.cancellation) {
                break;
            }

            let phase = match recollect {
                None => Phase::Collection,
                Some(_) => Phase::Recollection(recollection_passes),
            };
            info!("{}: {} cells below quota", phase, work.len());
            let pass = self.run_pass(&subject, work, phase, parallel, progress).await?;
            results.extend(pass);

            cells = cell_statuses(self.store.as_ref(), &subject.id, plan).await?;
            if is_cancelled(&self.cancellation) {
                info!("Collection cancelled; no further cells dispatched");
                break;
            }

            let under: HashSet<Category> = category_shortfalls(&cells)
                .into_iter()
                .filter(|(_, shortfall)| *shortfall > tolerance)
                .map(|(category, _)| category)
                .collect();
            if under.is_empty() {
                break;
            }
            if recollection_passes >= self.config.execution.max_recollection_passes {
                warn!(
                    "{} categories still under quota after {} re-collection passes",
                    under.len(),
                    recollection_passes
                );
                break;
            }
            recollection_passes += 1;
            recollect = Some(under);
        }

        let shortfalls = category_shortfalls(&cells);
        let under_categories: Vec<Category> = shortfalls
            .iter()
            .filter(|(_, shortfall)| *shortfall > tolerance)
            .map(|(c, _)| c.clone())
            .collect();
        let missing = cells
            .iter()
            .filter(|c| c.shortfall() > 0 && under_categories.contains(&c.category))
            .count();
        let flagged = shortfalls
            .iter()
            .filter(|(_, shortfall)| *shortfall <= tolerance)
            .map(|(_, shortfall)| shortfall)
            .sum();

        let status = RunStatus::from_counts(missing, under_categories, flagged);
        info!("Collection for {}: {}", subject.id, status);

        Ok(CollectionSummary {
            subject: subject.id.clone(),
            provider_calls: results.iter().map(|r| r.provider_calls).sum(),
            results,
            cells,
            recollection_passes,
            status,
            cancelled: is_cancelled(&self.cancellation),
        })
    }

    async fn run_pass(
        &self,
        subject: &Subject,
        work: Vec<(Category, Rater, Polarity, usize)>,
        phase: Phase,
        parallel: bool,
        progress: &dyn ProgressNotifier,
    ) -> Result<Vec<CollectionResult>, CollectError> {
        progress.on_phase_start(&phase, work.len());
        let mut results = Vec::new();

        if parallel {
            let mut join_set = JoinSet::new();
            let mut fatal = None;
            for (category, rater, polarity, count) in work {
                let this = self.clone();
                let subject = subject.clone();
                join_set.spawn(async move {
                    this.collect_cell(&subject, &category, &rater, polarity, count)
                        .await
                });
            }

            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok(result)) => {
                        progress.on_task_complete(&phase, &result.task_label(), result.is_success());
                        results.push(result);
                    }
                    Ok(Err(e)) => {
                        warn!("Aborting collection: {}", e);
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
            for (category, rater, polarity, count) in work {
                if is_cancelled(&self.cancellation) {
                    break;
                }
                let result = self
                    .collect_cell(subject, &category, &rater, polarity, count)
                    .await?;
                progress.on_task_complete(&phase, &result.task_label(), result.is_success());
                results.push(result);
            }
        }

        progress.on_phase_complete(&phase);
        Ok(results)
    }

    /// Collect up to `count` new items for one cell.
    ///
    /// Only accepted items are persisted. Provider, parse and transient
    /// store failures are reported in the result; only catastrophic store
    /// failures are returned as errors.
    pub async fn collect_cell(
        &self,
        subject: &Subject,
        category: &Category,
        rater: &Rater,
        polarity: Polarity,
        count: usize,
    ) -> Result<CollectionResult, CollectError> {
        let mut result = CollectionResult::new(category, rater, polarity, count);
        if count == 0 {
            return Ok(result);
        }
        let task = format!("{}/{}", subject.id, result.task_label());
        let params = &self.config.execution;

        let filter = ItemFilter::subject(subject.id.clone()).with_category(category.clone());
        let pool = match persist_with_retry(params, &task, || self.store.list_items(&filter)).await
        {
            Ok(pool) => pool,
            Err(e) => return persistence_failure(&task, result, e),
        };
        let existing_titles: HashSet<String> =
            pool.iter().map(|i| normalize_title(&i.title)).collect();
        let known_titles: Vec<String> = pool
            .iter()
            .take(MAX_KNOWN_TITLES)
            .map(|i| i.title.clone())
            .collect();
        let last_local = pool
            .iter()
            .filter(|i| &i.key.collector == rater)
            .filter(|i| Polarity::from_sequence(i.key.sequence) == Some(polarity))
            .map(|i| i.key.sequence - polarity.sequence(0))
            .max()
            .unwrap_or(0);
        if (last_local as usize).saturating_add(count) >= SEQUENCE_BLOCK as usize {
            result.provider_error = Some("sequence block exhausted".to_string());
            return Ok(result);
        }

        let prompt = PromptTemplate::collection_prompt(&CollectionRequest {
            subject,
            category,
            polarity,
            count,
            scale: self.config.scale_for(rater),
            known_titles: &known_titles,
        });
        let request = ProviderRequest {
            rater,
            system_prompt: PromptTemplate::collection_system(),
            prompt: &prompt,
            task: &task,
        };
        let limiter = self.limits.for_rater(rater);

        let mut parse_failures = 0;
        let candidates = loop {
            self.logger.log(ConversationEvent::request(
                "collection_request",
                rater,
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
            result.provider_calls += call.calls;

            let payload = match call.result {
                Ok(payload) => payload,
                Err(e) => {
                    if call.cancelled {
                        debug!("{}: cancelled before dispatch", task);
                    } else {
                        warn!("{}: provider failed: {}", task, e);
                        self.logger.log(ConversationEvent::failure(
                            "provider_error",
                            rater,
                            &task,
                            &e.to_string(),
                        ));
                    }
                    result.provider_error = Some(e.to_string());
                    return Ok(result);
                }
            };
            self.logger.log(ConversationEvent::response(
                "collection_response",
                rater,
                &task,
                &payload,
            ));

            match parse_collection_payload(&payload) {
                Ok(candidates) => break candidates,
                Err(e) if parse_failures < params.parse_retries => {
                    parse_failures += 1;
                    warn!("{}: unparseable payload ({}), asking again", task, e);
                    self.logger.log(ConversationEvent::failure(
                        "parse_error",
                        rater,
                        &task,
                        &e.to_string(),
                    ));
                }
                Err(e) => {
                    warn!("{}: unparseable payload ({}), cell failed", task, e);
                    self.logger.log(ConversationEvent::failure(
                        "parse_error",
                        rater,
                        &task,
                        &e.to_string(),
                    ));
                    result.provider_error = Some(format!("unparseable payload: {}", e));
                    return Ok(result);
                }
            }
        };

        let outcome = validate_candidates(&candidates, polarity, count, &existing_titles);
        for rejection in &outcome.rejected {
            warn!("{}: rejected: {}", task, rejection);
            self.logger.log(ConversationEvent::failure(
                "item_rejected",
                rater,
                &task,
                &rejection.to_string(),
            ));
        }

        let now = current_timestamp();
        let mut indices = Vec::with_capacity(outcome.accepted.len());
        let items: Vec<EvidenceItem> = outcome
            .accepted
            .into_iter()
            .zip(last_local + 1..)
            .map(|(c, local)| {
                indices.push(c.index);
                EvidenceItem {
                    key: ItemKey::new(
                        subject.id.clone(),
                        category.clone(),
                        rater.clone(),
                        polarity.sequence(local),
                    ),
                    title: c.title,
                    body: c.body,
                    source: c.source,
                    source_class: c.source_class,
                    polarity,
                    stance: c.stance,
                    collected_at: now,
                    self_rating: c.self_rating,
                }
            })
            .collect();
        result.rejected = outcome.rejected;

        if !items.is_empty() {
            let stored =
                match persist_with_retry(params, &task, || self.store.insert_items(&items)).await {
                    Ok(stored) => stored,
                    Err(e) => return persistence_failure(&task, result, e),
                };
            // Another cell of the same category may have stored the title first.
            for ((item, index), stored) in items.iter().zip(indices).zip(stored) {
                if stored {
                    result.accepted += 1;
                    continue;
                }
                let rejection = ValidationError::DuplicateContent {
                    index,
                    title: item.title.clone(),
                };
                warn!("{}: rejected at insert: {}", task, rejection);
                self.logger.log(ConversationEvent::failure(
                    "item_rejected",
                    rater,
                    &task,
                    &rejection.to_string(),
                ));
                result.rejected.push(rejection);
            }
        }

        info!(
            "{}: accepted {}/{} ({} rejected)",
            task,
            result.accepted,
            count,
            result.rejected.len()
        );
        Ok(result)
    }

    async fn resolve_subject(&self, id: &SubjectId) -> Result<Subject, StoreError> {
        Ok(match self.store.get_subject(id).await? {
            Some(subject) => subject,
            None => {
                debug!("Subject {} is not registered; using its id as name", id);
                Subject::new(id.clone(), id.as_str())
            }
        })
    }
}

/// Record a store failure on the cell, or abort when the store itself is gone.
fn persistence_failure(
    task: &str,
    mut result: CollectionResult,
    error: StoreError,
) -> Result<CollectionResult, CollectError> {
    if error.is_catastrophic() {
        return Err(error.into());
    }
    warn!("{}: persistence failed: {}", task, error);
    result.provider_error = Some(format!("persistence: {}", error));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionParams;
    use crate::fakes::{FaultyEvidenceStore, InMemoryEvidenceStore, ScriptedGateway};
    use crate::ports::llm_gateway::GatewayError;
    use assay_domain::RaterWeight;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Read the requested count and polarity back out of a collection prompt.
    fn requested(prompt: &str) -> (usize, &'static str) {
        let count = prompt
            .split("exactly ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        let stance = if prompt.contains("(polarity \"negative\")") {
            "negative"
        } else if prompt.contains("(polarity \"positive\")") {
            "positive"
        } else {
            "neutral"
        };
        (count, stance)
    }

    /// A collector that always delivers exactly what was asked for.
    fn obliging_gateway() -> ScriptedGateway {
        let counter = Arc::new(AtomicUsize::new(0));
        ScriptedGateway::new(move |rater, _, prompt| {
            let (count, stance) = requested(prompt);
            let items: Vec<serde_json::Value> = (0..count)
                .map(|_| {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    serde_json::json!({
                        "title": format!("{} finding {}", rater, n),
                        "body": "Documented in the public record.",
                        "source": "https://example.org",
                        "source_class": "public",
                        "polarity": stance,
                    })
                })
                .collect();
            Ok(format!("```json\n{}\n```", serde_json::Value::Array(items)))
        })
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
            .with_categories(vec![Category::new("vision"), Category::new("ethics")])
            .with_collectors(vec![
                RaterWeight::new(Rater::Claude, 0.5),
                RaterWeight::new(Rater::Gpt, 0.5),
            ])
            .with_target(20)
            .with_execution(
                ExecutionParams::default()
                    .with_backoff(Duration::ZERO, Duration::ZERO)
                    .with_provider_timeout(Duration::from_secs(5)),
            )
    }

    fn use_case(
        gateway: ScriptedGateway,
        store: Arc<InMemoryEvidenceStore>,
        config: PipelineConfig,
    ) -> CollectEvidenceUseCase<ScriptedGateway, InMemoryEvidenceStore> {
        CollectEvidenceUseCase::new(Arc::new(gateway), store, Arc::new(config))
    }

    #[tokio::test]
    async fn test_collect_all_fills_every_cell() {
        let gateway = obliging_gateway();
        let store = Arc::new(InMemoryEvidenceStore::new());
        let config = config();
        let plan = config.plan(false).unwrap();

        let uc = use_case(gateway.clone(), Arc::clone(&store), config);
        let summary = uc.collect_all(&"s1".into(), &plan).await.unwrap();

        assert_eq!(summary.status, RunStatus::Complete);
        assert_eq!(summary.accepted(), 20);
        assert!(summary.cells.iter().all(|c| c.collected == c.quota));
        assert_eq!(summary.provider_calls, gateway.call_count());

        let stored = store
            .list_items(&ItemFilter::subject("s1".into()))
            .await
            .unwrap();
        let negatives: Vec<_> = stored
            .iter()
            .filter(|i| i.polarity == Polarity::Negative)
            .collect();
        assert!(negatives.iter().all(|i| i.key.sequence > SEQUENCE_BLOCK));
        assert!(negatives.iter().all(|i| i.key.sequence < 2 * SEQUENCE_BLOCK));
    }

    #[tokio::test]
    async fn test_rerun_against_satisfied_store_makes_no_calls() {
        let store = Arc::new(InMemoryEvidenceStore::new());
        let config = config();
        let plan = config.plan(false).unwrap();

        let first = use_case(obliging_gateway(), Arc::clone(&store), config.clone());
        first.collect_all(&"s1".into(), &plan).await.unwrap();

        let gateway = obliging_gateway();
        let second = use_case(gateway.clone(), Arc::clone(&store), config);
        let summary = second.collect_all(&"s1".into(), &plan).await.unwrap();

        assert_eq!(gateway.call_count(), 0);
        assert!(summary.results.is_empty());
        assert_eq!(summary.status, RunStatus::Complete);
    }

    #[tokio::test]
    async fn test_parse_failure_retried_once_then_cell_fails() {
        let gateway = ScriptedGateway::new(|_, _, _| Ok("I could not find anything.".to_string()));
        let store = Arc::new(InMemoryEvidenceStore::new());
        let uc = use_case(gateway.clone(), store, config());
        let subject = Subject::new("s1", "Jane Doe");

        let result = uc
            .collect_cell(&subject, &Category::new("vision"), &Rater::Claude, Polarity::Free, 3)
            .await
            .unwrap();

        assert_eq!(gateway.call_count(), 2);
        assert!(result.provider_error.unwrap().contains("unparseable"));
        assert_eq!(result.accepted, 0);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_with_backoff() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let gateway = ScriptedGateway::new(move |_, _, _| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(GatewayError::RateLimited { retry_after: None })
            } else {
                Ok(r#"[{"title":"A","body":"B","polarity":"neutral"}]"#.to_string())
            }
        });
        let store = Arc::new(InMemoryEvidenceStore::new());
        let uc = use_case(gateway, Arc::clone(&store), config());

        let result = uc
            .collect_cell(
                &Subject::new("s1", "Jane"),
                &Category::new("vision"),
                &Rater::Claude,
                Polarity::Free,
                1,
            )
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.provider_calls, 3);
        assert_eq!(result.accepted, 1);
    }

    #[tokio::test]
    async fn test_non_transient_error_fails_cell_without_retry() {
        let gateway =
            ScriptedGateway::new(|_, _, _| Err(GatewayError::RequestFailed("400".to_string())));
        let uc = use_case(gateway.clone(), Arc::new(InMemoryEvidenceStore::new()), config());

        let result = uc
            .collect_cell(
                &Subject::new("s1", "Jane"),
                &Category::new("vision"),
                &Rater::Gpt,
                Polarity::Positive,
                2,
            )
            .await
            .unwrap();

        assert_eq!(gateway.call_count(), 1);
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_invalid_items_rejected_and_duplicates_skipped() {
        let gateway = ScriptedGateway::new(|_, _, _| {
            Ok(r#"{"items": [
                {"seq": 1, "title": "Budget vote", "body": "Voted no", "polarity": "negative"},
                {"seq": 1, "title": "Second", "body": "Dup seq", "polarity": "negative"},
                {"seq": 2, "title": "Praise", "body": "Nice", "polarity": "positive"},
                {"seq": 3, "title": "", "body": "No title", "polarity": "negative"},
                {"seq": 4, "title": "budget  VOTE", "body": "Same story", "polarity": "negative"}
            ]}"#
            .to_string())
        });
        let store = Arc::new(InMemoryEvidenceStore::new());
        let uc = use_case(gateway, Arc::clone(&store), config());

        let result = uc
            .collect_cell(
                &Subject::new("s1", "Jane"),
                &Category::new("ethics"),
                &Rater::Claude,
                Polarity::Negative,
                5,
            )
            .await
            .unwrap();

        assert_eq!(result.accepted, 1);
        assert_eq!(result.rejected.len(), 4);
        let stored = store
            .list_items(&ItemFilter::subject("s1".into()))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].key.sequence, Polarity::Negative.sequence(1));
    }

    /// Every cell leads with the same story, then fills up with unique ones.
    fn shared_story_gateway() -> ScriptedGateway {
        let counter = Arc::new(AtomicUsize::new(0));
        ScriptedGateway::new(move |rater, _, prompt| {
            let (count, stance) = requested(prompt);
            let items: Vec<serde_json::Value> = (0..count)
                .map(|i| {
                    let title = if i == 0 {
                        "Budget vote scandal".to_string()
                    } else {
                        format!("{} story {}", rater, counter.fetch_add(1, Ordering::SeqCst))
                    };
                    serde_json::json!({"title": title, "body": "b", "polarity": stance})
                })
                .collect();
            Ok(serde_json::Value::Array(items).to_string())
        })
    }

    #[tokio::test]
    async fn test_parallel_cells_store_a_shared_title_once() {
        let store = Arc::new(InMemoryEvidenceStore::new());
        let mut config = config()
            .with_categories(vec![Category::new("vision")])
            .with_target(12);
        config.execution = config
            .execution
            .clone()
            .with_parallel(true)
            .with_under_quota_tolerance(100);
        let plan = config.plan(false).unwrap();
        let uc = use_case(shared_story_gateway(), Arc::clone(&store), config);

        let summary = uc.collect_all(&"s1".into(), &plan).await.unwrap();

        let stored = store
            .list_items(&ItemFilter::subject("s1".into()))
            .await
            .unwrap();
        let shared = stored
            .iter()
            .filter(|i| normalize_title(&i.title) == "budget vote scandal")
            .count();
        assert_eq!(shared, 1);

        let duplicates = summary
            .results
            .iter()
            .flat_map(|r| &r.rejected)
            .filter(|e| matches!(e, ValidationError::DuplicateContent { .. }))
            .count();
        assert_eq!(duplicates, summary.results.len() - 1);
        assert_eq!(summary.accepted(), stored.len());
    }

    #[tokio::test]
    async fn test_title_stored_after_snapshot_is_rejected_at_insert() {
        let gateway = ScriptedGateway::new(|rater, _, _| {
            let title = match rater {
                Rater::Claude => "Budget vote scandal",
                _ => "  budget vote, SCANDAL ",
            };
            Ok(serde_json::json!([
                {"title": title, "body": "b", "polarity": "neutral"},
                {"title": format!("{} only", rater), "body": "b", "polarity": "neutral"}
            ])
            .to_string())
        });
        let store = Arc::new(FaultyEvidenceStore::new().with_stale_listings());
        let uc = CollectEvidenceUseCase::new(Arc::new(gateway), Arc::clone(&store), Arc::new(config()));
        let subject = Subject::new("s1", "Jane");
        let vision = Category::new("vision");

        let first = uc
            .collect_cell(&subject, &vision, &Rater::Claude, Polarity::Free, 2)
            .await
            .unwrap();
        let second = uc
            .collect_cell(&subject, &vision, &Rater::Gpt, Polarity::Free, 2)
            .await
            .unwrap();

        assert_eq!(first.accepted, 2);
        assert_eq!(second.accepted, 1);
        assert!(second.is_success());
        assert!(matches!(
            second.rejected.as_slice(),
            [ValidationError::DuplicateContent { index: 1, .. }]
        ));
        let count = store
            .inner()
            .count_items(&ItemFilter::subject("s1".into()))
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_store_failure_on_one_cell_does_not_abort_collection() {
        let store = Arc::new(FaultyEvidenceStore::new().with_item_fault(|item| {
            (item.key.category.as_str() == "ethics" && item.key.collector == Rater::Gpt)
                .then(|| StoreError::Busy("database is locked".into()))
        }));
        let config = config();
        let plan = config.plan(false).unwrap();
        let uc = CollectEvidenceUseCase::new(
            Arc::new(obliging_gateway()),
            Arc::clone(&store),
            Arc::new(config),
        );

        let summary = uc.collect_all(&"s1".into(), &plan).await.unwrap();

        let failed: Vec<_> = summary.failed_cells().collect();
        assert!(!failed.is_empty());
        assert!(failed.iter().all(|r| r.category.as_str() == "ethics" && r.rater == Rater::Gpt));
        assert!(
            failed
                .iter()
                .all(|r| r.provider_error.as_deref().unwrap_or("").starts_with("persistence"))
        );
        let vision = store
            .inner()
            .count_items(&ItemFilter::subject("s1".into()).with_category(Category::new("vision")))
            .await
            .unwrap();
        assert_eq!(vision, 10);
        match summary.status {
            RunStatus::Incomplete { categories, .. } => {
                assert_eq!(categories, vec![Category::new("ethics")]);
            }
            other => panic!("expected incomplete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_corrupt_store_aborts_collection() {
        let store = Arc::new(
            FaultyEvidenceStore::new()
                .with_item_fault(|_| Some(StoreError::Corrupt("malformed page".into()))),
        );
        let config = config();
        let plan = config.plan(false).unwrap();
        let uc = CollectEvidenceUseCase::new(Arc::new(obliging_gateway()), store, Arc::new(config));

        let result = uc.collect_all(&"s1".into(), &plan).await;
        assert!(matches!(
            result,
            Err(CollectError::Store(StoreError::Corrupt(_)))
        ));
    }

    #[tokio::test]
    async fn test_short_delivery_triggers_recollection_pass() {
        // First answer per cell is one item short; later answers are complete.
        let seen = Arc::new(std::sync::Mutex::new(HashSet::<String>::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        let gateway = ScriptedGateway::new(move |rater, _, prompt| {
            let (count, stance) = requested(prompt);
            let cell = format!("{}:{}:{}", rater, stance, prompt.lines().nth(1).unwrap_or(""));
            let first = seen.lock().unwrap().insert(cell);
            let deliver = if first { count.saturating_sub(1) } else { count };
            let items: Vec<serde_json::Value> = (0..deliver)
                .map(|_| {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    serde_json::json!({"title": format!("item {}", n), "body": "b", "polarity": stance})
                })
                .collect();
            Ok(serde_json::Value::Array(items).to_string())
        });
        let store = Arc::new(InMemoryEvidenceStore::new());
        let config = config();
        let plan = config.plan(false).unwrap();
        let uc = use_case(gateway, store, config);

        let summary = uc.collect_all(&"s1".into(), &plan).await.unwrap();

        assert_eq!(summary.recollection_passes, 1);
        assert_eq!(summary.status, RunStatus::Complete);
    }

    #[tokio::test]
    async fn test_incomplete_after_exhausting_passes() {
        let gateway = ScriptedGateway::new(|_, _, _| Ok("[]".to_string()));
        let store = Arc::new(InMemoryEvidenceStore::new());
        let config = config();
        let plan = config.plan(false).unwrap();
        let uc = use_case(gateway.clone(), store, config);

        let summary = uc.collect_all(&"s1".into(), &plan).await.unwrap();

        assert_eq!(summary.recollection_passes, 2);
        match summary.status {
            RunStatus::Incomplete {
                missing,
                categories,
            } => {
                assert_eq!(missing, summary.cells.len());
                assert_eq!(categories.len(), 2);
            }
            other => panic!("expected incomplete, got {:?}", other),
        }
        // One call per cell per pass: first pass plus two re-collection passes.
        assert_eq!(gateway.call_count(), summary.cells.len() * 3);
    }

    #[tokio::test]
    async fn test_shortfall_within_tolerance_is_flagged() {
        let gateway = ScriptedGateway::new(|_, _, _| Ok("[]".to_string()));
        let store = Arc::new(InMemoryEvidenceStore::new());
        let mut config = config();
        config.execution = config.execution.clone().with_under_quota_tolerance(100);
        let plan = config.plan(false).unwrap();
        let uc = use_case(gateway, store, config);

        let summary = uc.collect_all(&"s1".into(), &plan).await.unwrap();
        assert_eq!(summary.recollection_passes, 0);
        assert_eq!(summary.status, RunStatus::CompleteWithFlags(20));
    }

    #[tokio::test]
    async fn test_cancelled_run_dispatches_nothing() {
        let gateway = obliging_gateway();
        let token = CancellationToken::new();
        token.cancel();
        let config = config();
        let plan = config.plan(false).unwrap();
        let uc = use_case(gateway.clone(), Arc::new(InMemoryEvidenceStore::new()), config)
            .with_cancellation(token);

        let summary = uc.collect_all(&"s1".into(), &plan).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(gateway.call_count(), 0);
        assert!(!summary.status.is_complete());
    }

    #[tokio::test]
    async fn test_execute_rejects_unknown_filters() {
        let uc = use_case(
            obliging_gateway(),
            Arc::new(InMemoryEvidenceStore::new()),
            config(),
        );
        let mut input = CollectEvidenceInput::new("s1");
        input.rater = Some(Rater::Grok);
        assert!(matches!(
            uc.execute(input).await,
            Err(CollectError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_with_filters_only_drives_matching_cells() {
        let gateway = obliging_gateway();
        let store = Arc::new(InMemoryEvidenceStore::new());
        let uc = use_case(gateway.clone(), Arc::clone(&store), config());

        let mut input = CollectEvidenceInput::new("s1");
        input.category = Some(Category::new("vision"));
        input.rater = Some(Rater::Gpt);
        input.parallel = Some(false);
        let summary = uc.execute(input).await.unwrap();

        assert_eq!(gateway.calls_for(&Rater::Claude), 0);
        assert_eq!(summary.accepted(), 5);
        assert_eq!(summary.status, RunStatus::Complete);
    }
}
