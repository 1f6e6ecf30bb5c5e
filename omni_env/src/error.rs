//! Error types for the Omni-Engine environment abstraction.

use thiserror::Error;

/// Errors that can occur at the environment boundary.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The external service failed (transport, quota, model error, ...)
    #[error("Service error: {0}")]
    ServiceError(String),

    /// The service answered with no text at all
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// Request/response serialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a service error.
    pub fn service(msg: impl Into<String>) -> Self {
        Self::ServiceError(msg.into())
    }

    /// Creates an empty-response error for the named service.
    pub fn empty(service: impl std::fmt::Display) -> Self {
        Self::EmptyResponse(service.to_string())
    }
}

impl From<serde_json::Error> for EnvError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
