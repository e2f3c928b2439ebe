//! Application layer for assay
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
#[cfg(test)]
pub(crate) mod fakes;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{DEFAULT_CONFIG_VERSION, ExecutionParams, PipelineConfig};
pub use ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    evidence_store::{EvaluationFilter, EvidenceStore, ItemFilter, StoreError, UnavailablePair},
    llm_gateway::{GatewayError, LlmGateway, LlmSession},
    progress::{NoProgress, Phase, ProgressNotifier},
};
pub use use_cases::RunStatus;
pub use use_cases::analyze_consistency::AnalyzeConsistencyUseCase;
pub use use_cases::collect_evidence::{
    CollectError, CollectEvidenceInput, CollectEvidenceUseCase, CollectionResult,
    CollectionSummary,
};
pub use use_cases::evaluate_pool::{
    EvaluatePoolInput, EvaluatePoolUseCase, FailedPair, PoolingError, PoolingResult,
    PoolingSummary,
};
pub use use_cases::inspect_status::{
    CellStatus, InspectStatusUseCase, PoolingCoverage, StatusError, SubjectStatus,
};
pub use use_cases::register_subject::{RegisterError, RegisterSubjectUseCase};
pub use use_cases::score_subject::{ScoreError, ScoreReport, ScoreSubjectUseCase};
