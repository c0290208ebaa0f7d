//! Error types for the FinOps query router

use thiserror::Error;

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Request-level Errors
    // =============================

    /// The query was empty; rejected before any dispatch.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Credentials could not be checked out; fatal for the whole request.
    #[error("Credential error: {0}")]
    Credential(String),

    // =============================
    // Responder-level Errors
    // =============================

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Responder timed out after {0} seconds")]
    Timeout(u64),

    #[error("Responder task failed: {0}")]
    TaskFailed(String),

    // =============================
    // Collaborator Errors
    // =============================

    #[error("Data source error: {0}")]
    DataSource(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl OrchestrationError {
    /// True for errors that abort the whole request rather than one responder.
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            OrchestrationError::Validation(_) | OrchestrationError::Credential(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(OrchestrationError::Validation("empty".into()).is_request_fatal());
        assert!(OrchestrationError::Credential("denied".into()).is_request_fatal());
        assert!(!OrchestrationError::Transport("reset".into()).is_request_fatal());
        assert!(!OrchestrationError::Configuration("no endpoint".into()).is_request_fatal());
        assert!(!OrchestrationError::Timeout(30).is_request_fatal());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            OrchestrationError::Timeout(45).to_string(),
            "Responder timed out after 45 seconds"
        );
        assert_eq!(
            OrchestrationError::Credential("checkout failed".into()).to_string(),
            "Credential error: checkout failed"
        );
    }
}
