//! Error kinds for the retrieval core.
//!
//! Failures inside the embedding and indexing path are structural and abort
//! the operation. Failures in the optional collaborators (composer, storage)
//! are reported with their own variants so callers can degrade instead of
//! failing the whole request.

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Debug, thiserror::Error)]
pub enum QaError {
    /// No units have been ingested. The selector turns this into a sentinel
    /// answer rather than surfacing it.
    #[error("knowledge base is empty")]
    EmptyCorpus,

    /// The embedding model could not be loaded.
    #[error("embedding model failed to initialize: {0}")]
    ModelInit(String),

    /// The embedding backend failed or returned a malformed response.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A vector's length does not match the index dimensionality.
    #[error("vector dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The answer composer failed or timed out.
    #[error("answer composer failed: {0}")]
    Composer(String),

    /// The durable storage collaborator failed.
    #[error("storage failed: {0}")]
    Storage(String),

    /// The caller passed an unusable argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl QaError {
    /// Whether this error comes from a collaborator whose failure should
    /// degrade the response instead of aborting it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            QaError::EmptyCorpus | QaError::Composer(_) | QaError::Storage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_failures_are_recoverable() {
        assert!(QaError::Composer("timeout".into()).is_recoverable());
        assert!(QaError::Storage("disk full".into()).is_recoverable());
        assert!(QaError::EmptyCorpus.is_recoverable());
    }

    #[test]
    fn core_failures_are_not_recoverable() {
        assert!(!QaError::ModelInit("missing onnx".into()).is_recoverable());
        assert!(!QaError::Embedding("bad response".into()).is_recoverable());
        assert!(!QaError::DimensionMismatch {
            expected: 384,
            actual: 3
        }
        .is_recoverable());
    }

    #[test]
    fn display_mentions_dimensions() {
        let msg = QaError::DimensionMismatch {
            expected: 384,
            actual: 768,
        }
        .to_string();
        assert!(msg.contains("384"));
        assert!(msg.contains("768"));
    }
}
