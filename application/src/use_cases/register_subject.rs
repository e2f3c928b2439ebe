//! Register Subject use case
//!
//! Stores a subject's display name and metadata so prompts can name it.
//! Registration is an upsert; re-registering replaces name and metadata
//! but never touches collected evidence.

use crate::ports::evidence_store::{EvidenceStore, StoreError};
use assay_domain::Subject;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("Invalid subject: {0}")]
    Invalid(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub struct RegisterSubjectUseCase<S: EvidenceStore + 'static> {
    store: Arc<S>,
}

impl<S: EvidenceStore + 'static> RegisterSubjectUseCase<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register `subject`. Returns `true` if it was not known before.
    pub async fn execute(&self, subject: Subject) -> Result<bool, RegisterError> {
        let id = subject.id.as_str().trim();
        if id.is_empty() {
            return Err(RegisterError::Invalid("subject id is empty".to_string()));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(RegisterError::Invalid(format!(
                "subject id '{}' contains whitespace",
                id
            )));
        }
        if subject.name.trim().is_empty() {
            return Err(RegisterError::Invalid(format!(
                "subject '{}' has an empty name",
                id
            )));
        }

        let is_new = self.store.get_subject(&subject.id).await?.is_none();
        self.store.put_subject(&subject).await?;
        info!(
            "{} subject {} ({})",
            if is_new { "Registered" } else { "Updated" },
            subject.id,
            subject.name
        );
        Ok(is_new)
    }
}
