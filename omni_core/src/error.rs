//! Error types for the scene runtime.

use omni_env::EnvError;
use thiserror::Error;

/// Why a generator response could not become a [`crate::SceneDocument`].
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Empty document")]
    Empty,

    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Document root is not a JSON object")]
    NotAnObject,
}

/// Failure of a whole generation request. The previous scene stays loaded.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Generator failed: {0}")]
    Service(#[from] EnvError),

    #[error("Invalid scene document: {0}")]
    Document(#[from] DocumentError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_error_display() {
        let err: DocumentError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("Malformed JSON"));
        assert_eq!(DocumentError::Empty.to_string(), "Empty document");
    }

    #[test]
    fn test_generation_error_from() {
        let err: GenerationError = EnvError::service("quota exceeded").into();
        assert!(matches!(err, GenerationError::Service(_)));
        assert!(err.to_string().contains("quota exceeded"));

        let err: GenerationError = DocumentError::NotAnObject.into();
        assert!(matches!(err, GenerationError::Document(_)));
    }
}
