//! Inspect Status use case
//!
//! Re-queries the store and reports how far a subject is through
//! collection (items per cell against quota) and pooling (records per
//! category against the expected pair count). Nothing is cached; every
//! number here is derived from stored items and records.

use crate::config::PipelineConfig;
use crate::ports::evidence_store::{EvaluationFilter, EvidenceStore, ItemFilter, StoreError};
use assay_domain::{
    Category, ConfigurationError, EvidenceItem, Polarity, QuotaPlan, Rater, SubjectId,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Collected items for one `(category, rater, polarity)` cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellStatus {
    pub category: Category,
    pub rater: Rater,
    pub polarity: Polarity,
    pub quota: usize,
    pub collected: usize,
}

impl CellStatus {
    pub fn shortfall(&self) -> usize {
        self.quota.saturating_sub(self.collected)
    }
}

/// Pooling coverage for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolingCoverage {
    pub category: Category,
    pub items: usize,
    /// (item, evaluator) pairs the roster implies
    pub expected_pairs: usize,
    /// Pairs with a record
    pub records: usize,
    pub under_sampled_items: usize,
}

/// Everything `status` reports for one subject.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectStatus {
    pub subject: SubjectId,
    pub target: usize,
    pub cells: Vec<CellStatus>,
    pub coverage: Vec<PoolingCoverage>,
    pub unavailable_pairs: usize,
}

impl SubjectStatus {
    pub fn collected(&self) -> usize {
        self.cells.iter().map(|c| c.collected.min(c.quota)).sum()
    }
}

/// Cell counts for every cell in `plan`, from a single store query.
pub async fn cell_statuses<S: EvidenceStore + ?Sized>(
    store: &S,
    subject: &SubjectId,
    plan: &QuotaPlan,
) -> Result<Vec<CellStatus>, StoreError> {
    let items = store.list_items(&ItemFilter::subject(subject.clone())).await?;
    Ok(tally_cells(&items, plan))
}

fn tally_cells(items: &[EvidenceItem], plan: &QuotaPlan) -> Vec<CellStatus> {
    let mut counts: HashMap<(&Category, &Rater, Polarity), usize> = HashMap::new();
    for item in items {
        *counts
            .entry((&item.key.category, &item.key.collector, item.polarity))
            .or_default() += 1;
    }
    plan.cells()
        .map(|cell| CellStatus {
            category: cell.category.clone(),
            rater: cell.rater.clone(),
            polarity: cell.polarity,
            quota: cell.quota,
            collected: counts
                .get(&(&cell.category, &cell.rater, cell.polarity))
                .copied()
                .unwrap_or(0),
        })
        .collect()
}

/// Total shortfall per category, in plan order, for categories that have one.
pub fn category_shortfalls(cells: &[CellStatus]) -> Vec<(Category, usize)> {
    let mut out: Vec<(Category, usize)> = Vec::new();
    for cell in cells.iter().filter(|c| c.shortfall() > 0) {
        match out.iter_mut().find(|(c, _)| c == &cell.category) {
            Some((_, total)) => *total += cell.shortfall(),
            None => out.push((cell.category.clone(), cell.shortfall())),
        }
    }
    out
}

#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Use case for reporting collection and pooling progress
pub struct InspectStatusUseCase<S: EvidenceStore + 'static> {
    store: Arc<S>,
    config: Arc<PipelineConfig>,
}

impl<S: EvidenceStore + 'static> InspectStatusUseCase<S> {
    pub fn new(store: Arc<S>, config: Arc<PipelineConfig>) -> Self {
        Self { store, config }
    }

    pub async fn execute(
        &self,
        subject: &SubjectId,
        test_mode: bool,
    ) -> Result<SubjectStatus, StatusError> {
        let plan = self.config.plan(test_mode)?;
        let items = self
            .store
            .list_items(&ItemFilter::subject(subject.clone()))
            .await?;
        let records = self
            .store
            .list_evaluations(&EvaluationFilter::subject(subject.clone()))
            .await?;
        let unavailable = self.store.list_unavailable(subject).await?;

        let mut per_item: HashMap<_, usize> = HashMap::new();
        for r in records
            .iter()
            .filter(|r| !(self.config.exclude_self_evaluation && r.is_self_evaluation()))
        {
            *per_item.entry(&r.item).or_default() += 1;
        }

        let categories: BTreeSet<&Category> = items.iter().map(|i| &i.key.category).collect();
        let coverage = self
            .config
            .categories
            .iter()
            .filter(|c| categories.contains(c))
            .map(|category| {
                let in_category: Vec<&EvidenceItem> =
                    items.iter().filter(|i| &i.key.category == category).collect();
                PoolingCoverage {
                    category: category.clone(),
                    items: in_category.len(),
                    expected_pairs: in_category
                        .iter()
                        .map(|i| self.config.evaluators_for(&i.key.collector).len())
                        .sum(),
                    records: in_category
                        .iter()
                        .map(|i| per_item.get(&i.key).copied().unwrap_or(0))
                        .sum(),
                    under_sampled_items: in_category
                        .iter()
                        .filter(|i| {
                            per_item.get(&i.key).copied().unwrap_or(0)
                                < self.config.min_evaluations_per_item
                        })
                        .count(),
                }
            })
            .collect();

        Ok(SubjectStatus {
            subject: subject.clone(),
            target: plan.target,
            cells: tally_cells(&items, &plan),
            coverage,
            unavailable_pairs: unavailable.len(),
        })
    }
}
