//! Error types shared across the workspace.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VocabotError>;

#[derive(Debug, Error)]
pub enum VocabotError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl VocabotError {
    /// Connectivity-class failures: the unit of work is abandoned, nothing is
    /// written, and the process still exits normally.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            VocabotError::Store(_)
                | VocabotError::Http(_)
                | VocabotError::Delivery(_)
                | VocabotError::Lookup(_)
        )
    }
}
