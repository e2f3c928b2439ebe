//! SQLite schema for the evidence store

use assay_domain::core::string::normalize_title;
use rusqlite::{Connection, Result, params};

pub const CURRENT_SCHEMA_VERSION: i32 = 2;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS subjects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);

-- Evidence items, keyed by (subject, category, collector, sequence)
CREATE TABLE IF NOT EXISTS evidence_items (
    subject TEXT NOT NULL,
    category TEXT NOT NULL,
    collector TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT '',
    source_class TEXT NOT NULL,
    polarity TEXT NOT NULL,
    stance TEXT NOT NULL,
    collected_at INTEGER NOT NULL,
    self_rating TEXT,
    normalized_title TEXT,
    PRIMARY KEY (subject, category, collector, sequence)
);
CREATE INDEX IF NOT EXISTS idx_items_cell ON evidence_items(subject, category, collector, polarity);

-- Pooled ratings, one per (item, evaluator)
CREATE TABLE IF NOT EXISTS evaluations (
    subject TEXT NOT NULL,
    category TEXT NOT NULL,
    collector TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    evaluator TEXT NOT NULL,
    raw_rating TEXT NOT NULL,
    scale TEXT NOT NULL,
    rating INTEGER NOT NULL CHECK (rating BETWEEN -4 AND 4),
    rationale TEXT NOT NULL DEFAULT '',
    evaluated_at INTEGER NOT NULL,
    PRIMARY KEY (subject, category, collector, sequence, evaluator)
);
CREATE INDEX IF NOT EXISTS idx_evaluations_evaluator ON evaluations(subject, evaluator);

-- Pairs that failed after retries; retried on the next run
CREATE TABLE IF NOT EXISTS unavailable_pairs (
    subject TEXT NOT NULL,
    category TEXT NOT NULL,
    collector TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    evaluator TEXT NOT NULL,
    reason TEXT NOT NULL,
    recorded_at INTEGER NOT NULL,
    PRIMARY KEY (subject, category, collector, sequence, evaluator)
);
"#;

/// One item per normalised title within a subject's category pool.
const TITLE_INDEX_SQL: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_items_title \
     ON evidence_items(subject, category, normalized_title)";

/// Create tables if missing and stamp the schema version.
///
/// A database written by a newer schema is refused rather than migrated.
pub fn create_schema(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version > CURRENT_SCHEMA_VERSION {
        return Err(rusqlite::Error::InvalidParameterName(format!(
            "database schema version {} is newer than supported version {}",
            version, CURRENT_SCHEMA_VERSION
        )));
    }

    if version == 1 {
        migrate_v1(conn)?;
    }
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(TITLE_INDEX_SQL, [])?;
    conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    Ok(CURRENT_SCHEMA_VERSION)
}

/// Add and backfill `normalized_title`.
///
/// Items that already share a title keep the first one; later ones stay
/// NULL, which the unique index does not constrain.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch("ALTER TABLE evidence_items ADD COLUMN normalized_title TEXT")?;
    conn.execute(TITLE_INDEX_SQL, [])?;

    let rows: Vec<(i64, String)> = {
        let mut stmt =
            conn.prepare("SELECT rowid, title FROM evidence_items ORDER BY collected_at, rowid")?;
        stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>>>()?
    };
    let mut update =
        conn.prepare("UPDATE OR IGNORE evidence_items SET normalized_title = ?1 WHERE rowid = ?2")?;
    for (rowid, title) in rows {
        update.execute(params![normalize_title(&title), rowid])?;
    }
    Ok(())
}
