//! Port definitions (interfaces for external dependencies)

pub mod conversation_logger;
pub mod evidence_store;
pub mod llm_gateway;
pub mod progress;
