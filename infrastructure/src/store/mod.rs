//! Persistent evidence store
//!
//! SQLite-backed implementation of the `EvidenceStore` port. Natural keys
//! are table primary keys and every insert is `INSERT OR IGNORE`, so
//! concurrent writers with the same key cannot create duplicates.

mod rows;
mod schema;
mod sqlite;

pub use schema::{CURRENT_SCHEMA_VERSION, create_schema};
pub use sqlite::SqliteEvidenceStore;
