//! SQLite evidence store adapter

use super::rows::{
    EVALUATION_COLUMNS, EvaluationRow, ITEM_COLUMNS, ItemRow, UNAVAILABLE_COLUMNS,
    read_unavailable,
};
use super::schema::create_schema;
use assay_application::ports::evidence_store::{
    EvaluationFilter, EvidenceStore, ItemFilter, StoreError, UnavailablePair,
};
use assay_domain::core::string::normalize_title;
use assay_domain::{EvaluationRecord, EvidenceItem, Subject, SubjectId};
use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// How long SQLite itself waits on a lock before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn store_error(e: rusqlite::Error) -> StoreError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            StoreError::Busy(e.to_string())
        }
        Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => {
            StoreError::Corrupt(e.to_string())
        }
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure
            | ErrorCode::DiskFull
            | ErrorCode::ReadOnly
            | ErrorCode::PermissionDenied,
        ) => StoreError::Io(e.to_string()),
        _ => StoreError::Other(e.to_string()),
    }
}

/// Evidence store in a single SQLite file.
///
/// One connection is shared behind a mutex; every call runs on the
/// blocking pool so the async runtime never waits on disk.
#[derive(Clone)]
pub struct SqliteEvidenceStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteEvidenceStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Io(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            StoreError::Io(format!(
                "failed to open database at {}: {}",
                path.display(),
                e
            ))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(store_error)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(store_error)?;
        create_schema(&conn).map_err(store_error)?;
        debug!("Opened evidence store at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// A private database that disappears with the process.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(store_error)?;
        create_schema(&conn).map_err(store_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Other(format!("store task failed: {}", e)))?
    }
}

#[async_trait]
impl EvidenceStore for SqliteEvidenceStore {
    async fn put_subject(&self, subject: &Subject) -> Result<(), StoreError> {
        let subject = subject.clone();
        self.with_conn(move |conn| {
            let metadata = serde_json::to_string(&subject.metadata)
                .map_err(|e| StoreError::Other(e.to_string()))?;
            conn.execute(
                "INSERT INTO subjects (id, name, metadata) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, metadata = excluded.metadata",
                params![subject.id.as_str(), subject.name, metadata],
            )
            .map_err(store_error)?;
            Ok(())
        })
        .await
    }

    async fn get_subject(&self, id: &SubjectId) -> Result<Option<Subject>, StoreError> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT name, metadata FROM subjects WHERE id = ?1",
                    params![id.as_str()],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()
                .map_err(store_error)?;

            row.map(|(name, metadata)| {
                let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata)
                    .map_err(|e| StoreError::Corrupt(format!("subject metadata: {}", e)))?;
                Ok(Subject {
                    id: id.clone(),
                    name,
                    metadata,
                })
            })
            .transpose()
        })
        .await
    }

    async fn subject_ids(&self) -> Result<Vec<SubjectId>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id FROM subjects
                     UNION
                     SELECT DISTINCT subject FROM evidence_items
                     ORDER BY 1",
                )
                .map_err(store_error)?;
            let ids = stmt
                .query_map([], |r| r.get::<_, String>(0))
                .map_err(store_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(store_error)?;
            Ok(ids.into_iter().map(SubjectId::new).collect())
        })
        .await
    }

    async fn insert_items(&self, items: &[EvidenceItem]) -> Result<Vec<bool>, StoreError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let items = items.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(store_error)?;
            let mut inserted = Vec::with_capacity(items.len());
            {
                // Both the primary key and the title index make a row a no-op.
                let mut stmt = tx
                    .prepare(&format!(
                        "INSERT OR IGNORE INTO evidence_items ({}, normalized_title) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                        ITEM_COLUMNS
                    ))
                    .map_err(store_error)?;
                for item in &items {
                    let changed = stmt
                        .execute(params![
                            item.key.subject.as_str(),
                            item.key.category.as_str(),
                            item.key.collector.as_str(),
                            item.key.sequence,
                            item.title,
                            item.body,
                            item.source,
                            item.source_class.as_str(),
                            item.polarity.as_str(),
                            item.stance.as_str(),
                            item.collected_at as i64,
                            item.self_rating,
                            normalize_title(&item.title),
                        ])
                        .map_err(store_error)?;
                    inserted.push(changed == 1);
                }
            }
            tx.commit().map_err(store_error)?;
            Ok(inserted)
        })
        .await
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<EvidenceItem>, StoreError> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM evidence_items
                     WHERE subject = ?1
                       AND (?2 IS NULL OR category = ?2)
                       AND (?3 IS NULL OR collector = ?3)
                       AND (?4 IS NULL OR polarity = ?4)
                     ORDER BY category, collector, sequence",
                    ITEM_COLUMNS
                ))
                .map_err(store_error)?;
            let rows = stmt
                .query_map(
                    params![
                        filter.subject.as_str(),
                        filter.category.as_ref().map(|c| c.as_str()),
                        filter.collector.as_ref().map(|r| r.as_str()),
                        filter.polarity.map(|p| p.as_str()),
                    ],
                    ItemRow::read,
                )
                .map_err(store_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(store_error)?;
            rows.into_iter().map(ItemRow::into_item).collect()
        })
        .await
    }

    async fn count_items(&self, filter: &ItemFilter) -> Result<usize, StoreError> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM evidence_items
                     WHERE subject = ?1
                       AND (?2 IS NULL OR category = ?2)
                       AND (?3 IS NULL OR collector = ?3)
                       AND (?4 IS NULL OR polarity = ?4)",
                    params![
                        filter.subject.as_str(),
                        filter.category.as_ref().map(|c| c.as_str()),
                        filter.collector.as_ref().map(|r| r.as_str()),
                        filter.polarity.map(|p| p.as_str()),
                    ],
                    |r| r.get(0),
                )
                .map_err(store_error)?;
            Ok(count.max(0) as usize)
        })
        .await
    }

    async fn insert_evaluation(&self, record: &EvaluationRecord) -> Result<bool, StoreError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    &format!(
                        "INSERT OR IGNORE INTO evaluations ({}) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                        EVALUATION_COLUMNS
                    ),
                    params![
                        record.item.subject.as_str(),
                        record.item.category.as_str(),
                        record.item.collector.as_str(),
                        record.item.sequence,
                        record.evaluator.as_str(),
                        record.raw_rating,
                        record.scale.as_str(),
                        record.rating.value(),
                        record.rationale,
                        record.evaluated_at as i64,
                    ],
                )
                .map_err(store_error)?;
            Ok(changed == 1)
        })
        .await
    }

    async fn list_evaluations(
        &self,
        filter: &EvaluationFilter,
    ) -> Result<Vec<EvaluationRecord>, StoreError> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM evaluations
                     WHERE subject = ?1
                       AND (?2 IS NULL OR category = ?2)
                       AND (?3 IS NULL OR evaluator = ?3)
                     ORDER BY category, collector, sequence, evaluator",
                    EVALUATION_COLUMNS
                ))
                .map_err(store_error)?;
            let rows = stmt
                .query_map(
                    params![
                        filter.subject.as_str(),
                        filter.category.as_ref().map(|c| c.as_str()),
                        filter.evaluator.as_ref().map(|e| e.as_str()),
                    ],
                    EvaluationRow::read,
                )
                .map_err(store_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(store_error)?;
            rows.into_iter().map(EvaluationRow::into_record).collect()
        })
        .await
    }

    async fn mark_unavailable(&self, pair: &UnavailablePair) -> Result<(), StoreError> {
        let pair = pair.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO unavailable_pairs ({}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    UNAVAILABLE_COLUMNS
                ),
                params![
                    pair.item.subject.as_str(),
                    pair.item.category.as_str(),
                    pair.item.collector.as_str(),
                    pair.item.sequence,
                    pair.evaluator.as_str(),
                    pair.reason,
                    pair.recorded_at as i64,
                ],
            )
            .map_err(store_error)?;
            Ok(())
        })
        .await
    }

    async fn list_unavailable(
        &self,
        subject: &SubjectId,
    ) -> Result<Vec<UnavailablePair>, StoreError> {
        let subject = subject.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM unavailable_pairs u
                     WHERE u.subject = ?1
                       AND NOT EXISTS (
                           SELECT 1 FROM evaluations e
                           WHERE e.subject = u.subject
                             AND e.category = u.category
                             AND e.collector = u.collector
                             AND e.sequence = u.sequence
                             AND e.evaluator = u.evaluator
                       )
                     ORDER BY category, collector, sequence, evaluator",
                    UNAVAILABLE_COLUMNS
                ))
                .map_err(store_error)?;
            stmt.query_map(params![subject.as_str()], read_unavailable)
                .map_err(store_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(store_error)
        })
        .await
    }
}
