//! Infrastructure layer for assay
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: HTTP provider adapters, the SQLite evidence
//! store, the JSONL provider log, and configuration file loading.

pub mod config;
pub mod logging;
pub mod providers;
pub mod store;

// Re-export commonly used types
pub use config::{ConfigError, ConfigLoader, FileConfig};
pub use logging::JsonlConversationLogger;
pub use providers::{
    AnthropicAdapter, OpenAiCompatibleAdapter, ProviderAdapter, ProviderKind, RoutingGateway,
};
pub use store::SqliteEvidenceStore;
