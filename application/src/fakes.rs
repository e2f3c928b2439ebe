//! In-memory fakes for the ports (testing only)
//!
//! Provides `InMemoryEvidenceStore` and `ScriptedGateway`, which satisfy the
//! port contracts without any external dependencies, and
//! `FaultyEvidenceStore` for exercising store failures.

use crate::ports::evidence_store::{
    EvaluationFilter, EvidenceStore, ItemFilter, StoreError, UnavailablePair,
};
use crate::ports::llm_gateway::{GatewayError, LlmGateway, LlmSession};
use assay_domain::core::string::normalize_title;
use assay_domain::{
    Category, EvaluationRecord, EvidenceItem, ItemKey, Rater, Subject, SubjectId,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

// ---------------------------------------------------------------------------
// InMemoryEvidenceStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tables {
    subjects: BTreeMap<SubjectId, Subject>,
    items: BTreeMap<ItemKey, EvidenceItem>,
    titles: BTreeSet<(SubjectId, Category, String)>,
    evaluations: BTreeMap<(ItemKey, Rater), EvaluationRecord>,
    unavailable: BTreeMap<(ItemKey, Rater), UnavailablePair>,
}

/// Evidence store backed by ordered maps keyed by the natural keys.
#[derive(Debug, Default)]
pub struct InMemoryEvidenceStore {
    tables: Mutex<Tables>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn put_subject(&self, subject: &Subject) -> Result<(), StoreError> {
        self.tables()
            .subjects
            .insert(subject.id.clone(), subject.clone());
        Ok(())
    }

    async fn get_subject(&self, id: &SubjectId) -> Result<Option<Subject>, StoreError> {
        Ok(self.tables().subjects.get(id).cloned())
    }

    async fn subject_ids(&self) -> Result<Vec<SubjectId>, StoreError> {
        let tables = self.tables();
        let ids: BTreeSet<SubjectId> = tables
            .subjects
            .keys()
            .cloned()
            .chain(tables.items.keys().map(|k| k.subject.clone()))
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn insert_items(&self, items: &[EvidenceItem]) -> Result<Vec<bool>, StoreError> {
        let mut tables = self.tables();
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let title = (
                item.key.subject.clone(),
                item.key.category.clone(),
                normalize_title(&item.title),
            );
            let stored = !tables.items.contains_key(&item.key) && !tables.titles.contains(&title);
            if stored {
                tables.titles.insert(title);
                tables.items.insert(item.key.clone(), item.clone());
            }
            inserted.push(stored);
        }
        Ok(inserted)
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<EvidenceItem>, StoreError> {
        Ok(self
            .tables()
            .items
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect())
    }

    async fn count_items(&self, filter: &ItemFilter) -> Result<usize, StoreError> {
        Ok(self
            .tables()
            .items
            .values()
            .filter(|i| filter.matches(i))
            .count())
    }

    async fn insert_evaluation(&self, record: &EvaluationRecord) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        let key = (record.item.clone(), record.evaluator.clone());
        if tables.evaluations.contains_key(&key) {
            return Ok(false);
        }
        tables.evaluations.insert(key, record.clone());
        Ok(true)
    }

    async fn list_evaluations(
        &self,
        filter: &EvaluationFilter,
    ) -> Result<Vec<EvaluationRecord>, StoreError> {
        Ok(self
            .tables()
            .evaluations
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn mark_unavailable(&self, pair: &UnavailablePair) -> Result<(), StoreError> {
        self.tables().unavailable.insert(
            (pair.item.clone(), pair.evaluator.clone()),
            pair.clone(),
        );
        Ok(())
    }

    async fn list_unavailable(
        &self,
        subject: &SubjectId,
    ) -> Result<Vec<UnavailablePair>, StoreError> {
        let tables = self.tables();
        Ok(tables
            .unavailable
            .iter()
            .filter(|((item, _), _)| &item.subject == subject)
            .filter(|(key, _)| !tables.evaluations.contains_key(key))
            .map(|(_, pair)| pair.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FaultyEvidenceStore
// ---------------------------------------------------------------------------

type Fault<T> = dyn Fn(&T) -> Option<StoreError> + Send + Sync;

/// An `InMemoryEvidenceStore` whose writes fail on demand.
///
/// A fault returning `Some(error)` fails that write; `None` lets it through.
/// With stale listings, `list_items` always sees an empty store, which is
/// what a cell observes when its snapshot predates a concurrent insert.
#[derive(Default)]
pub struct FaultyEvidenceStore {
    inner: InMemoryEvidenceStore,
    item_fault: Option<Box<Fault<EvidenceItem>>>,
    evaluation_fault: Option<Box<Fault<EvaluationRecord>>>,
    stale_listings: bool,
}

impl FaultyEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item_fault(
        mut self,
        fault: impl Fn(&EvidenceItem) -> Option<StoreError> + Send + Sync + 'static,
    ) -> Self {
        self.item_fault = Some(Box::new(fault));
        self
    }

    pub fn with_evaluation_fault(
        mut self,
        fault: impl Fn(&EvaluationRecord) -> Option<StoreError> + Send + Sync + 'static,
    ) -> Self {
        self.evaluation_fault = Some(Box::new(fault));
        self
    }

    pub fn with_stale_listings(mut self) -> Self {
        self.stale_listings = true;
        self
    }

    /// The wrapped store, for seeding and for assertions.
    pub fn inner(&self) -> &InMemoryEvidenceStore {
        &self.inner
    }
}

#[async_trait]
impl EvidenceStore for FaultyEvidenceStore {
    async fn put_subject(&self, subject: &Subject) -> Result<(), StoreError> {
        self.inner.put_subject(subject).await
    }

    async fn get_subject(&self, id: &SubjectId) -> Result<Option<Subject>, StoreError> {
        self.inner.get_subject(id).await
    }

    async fn subject_ids(&self) -> Result<Vec<SubjectId>, StoreError> {
        self.inner.subject_ids().await
    }

    async fn insert_items(&self, items: &[EvidenceItem]) -> Result<Vec<bool>, StoreError> {
        if let Some(fault) = &self.item_fault
            && let Some(error) = items.iter().find_map(|item| fault(item))
        {
            return Err(error);
        }
        self.inner.insert_items(items).await
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<EvidenceItem>, StoreError> {
        if self.stale_listings {
            return Ok(Vec::new());
        }
        self.inner.list_items(filter).await
    }

    async fn count_items(&self, filter: &ItemFilter) -> Result<usize, StoreError> {
        self.inner.count_items(filter).await
    }

    async fn insert_evaluation(&self, record: &EvaluationRecord) -> Result<bool, StoreError> {
        if let Some(error) = self.evaluation_fault.as_ref().and_then(|fault| fault(record)) {
            return Err(error);
        }
        self.inner.insert_evaluation(record).await
    }

    async fn list_evaluations(
        &self,
        filter: &EvaluationFilter,
    ) -> Result<Vec<EvaluationRecord>, StoreError> {
        self.inner.list_evaluations(filter).await
    }

    async fn mark_unavailable(&self, pair: &UnavailablePair) -> Result<(), StoreError> {
        self.inner.mark_unavailable(pair).await
    }

    async fn list_unavailable(
        &self,
        subject: &SubjectId,
    ) -> Result<Vec<UnavailablePair>, StoreError> {
        self.inner.list_unavailable(subject).await
    }
}

// ---------------------------------------------------------------------------
// ScriptedGateway
// ---------------------------------------------------------------------------

type Responder = dyn Fn(&Rater, &str, &str) -> Result<String, GatewayError> + Send + Sync;

struct Script {
    responder: Box<Responder>,
    calls: Mutex<Vec<(Rater, String)>>,
}

/// Gateway whose answers come from a closure of `(rater, system, prompt)`.
///
/// Records every prompt sent so tests can count provider calls.
#[derive(Clone)]
pub struct ScriptedGateway {
    script: Arc<Script>,
}

impl ScriptedGateway {
    pub fn new(
        responder: impl Fn(&Rater, &str, &str) -> Result<String, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Arc::new(Script {
                responder: Box::new(responder),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Total number of prompts sent.
    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    pub fn calls_for(&self, rater: &Rater) -> usize {
        self.calls().iter().filter(|(r, _)| r == rater).count()
    }

    pub fn prompts(&self) -> Vec<(Rater, String)> {
        self.calls().clone()
    }

    fn calls(&self) -> MutexGuard<'_, Vec<(Rater, String)>> {
        self.script.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct ScriptedSession {
    rater: Rater,
    system_prompt: String,
    script: Arc<Script>,
}

#[async_trait]
impl LlmSession for ScriptedSession {
    fn rater(&self) -> &Rater {
        &self.rater
    }

    async fn send(&self, content: &str) -> Result<String, GatewayError> {
        self.script
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((self.rater.clone(), content.to_string()));
        (self.script.responder)(&self.rater, &self.system_prompt, content)
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn create_session_with_system_prompt(
        &self,
        rater: &Rater,
        system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError> {
        Ok(Box::new(ScriptedSession {
            rater: rater.clone(),
            system_prompt: system_prompt.to_string(),
            script: Arc::clone(&self.script),
        }))
    }

    async fn available_raters(&self) -> Result<Vec<Rater>, GatewayError> {
        Ok(Rater::default_roster())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assay_domain::{Polarity, SourceClass, Stance};

    fn item(seq: u32) -> EvidenceItem {
        EvidenceItem {
            key: ItemKey::new("s1".into(), Category::new("vision"), Rater::Gpt, seq),
            title: format!("t{}", seq),
            body: "b".into(),
            source: String::new(),
            source_class: SourceClass::Public,
            polarity: Polarity::Free,
            stance: Stance::Neutral,
            collected_at: 0,
            self_rating: None,
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = InMemoryEvidenceStore::new();
        assert_eq!(
            store.insert_items(&[item(1), item(2)]).await.unwrap(),
            vec![true, true]
        );
        assert_eq!(
            store.insert_items(&[item(2), item(3)]).await.unwrap(),
            vec![false, true]
        );
        let all = store
            .count_items(&ItemFilter::subject("s1".into()))
            .await
            .unwrap();
        assert_eq!(all, 3);
        assert_eq!(
            store.subject_ids().await.unwrap(),
            vec![SubjectId::new("s1")]
        );
    }

    #[tokio::test]
    async fn test_repeated_title_is_skipped_within_category() {
        let store = InMemoryEvidenceStore::new();
        let mut copy = item(9);
        copy.title = "T1!".into();
        assert_eq!(
            store.insert_items(&[item(1), copy]).await.unwrap(),
            vec![true, false]
        );
    }

    #[tokio::test]
    async fn test_scripted_gateway_records_calls() {
        let gateway = ScriptedGateway::new(|rater, _, prompt| Ok(format!("{}:{}", rater, prompt)));
        let session = gateway
            .create_session_with_system_prompt(&Rater::Claude, "sys")
            .await
            .unwrap();
        assert_eq!(session.send("hi").await.unwrap(), "claude:hi");
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(gateway.calls_for(&Rater::Gpt), 0);
    }
}
