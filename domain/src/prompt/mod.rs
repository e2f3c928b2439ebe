//! Prompt domain
//!
//! Request templates for collection and pooled evaluation. Only the
//! response protocol (the JSON shape) matters to the pipeline.

mod template;

pub use template::{CollectionRequest, EvaluationRequest, PromptTemplate};
