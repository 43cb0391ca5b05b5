//! Error types for the authentication core

use thiserror::Error;

/// Errors raised by the feature pipeline, aggregation and matching.
///
/// An empty sensor buffer is deliberately absent: it yields sentinel
/// statistics, not an error.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Cannot {operation} while {state}")]
    PrematureStateTransition {
        operation: &'static str,
        state: String,
    },

    #[error("Cannot average an empty set of feature vectors")]
    EmptyAggregate,

    #[error("Invalid sensor sample: {0}")]
    InvalidSample(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Capture session closed; sample for {0} discarded")]
    SessionClosed(&'static str),

    #[error("No enrolled embedding found; enroll before verifying")]
    NotEnrolled,

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors surfaced by an [`EmbeddingClient`](crate::embedding::EmbeddingClient).
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model input shape mismatch: expected {expected} values, got {actual}")]
    InputShape { expected: usize, actual: usize },

    #[error("Embedding backend failure: {0}")]
    Backend(String),
}

/// Errors surfaced by a [`CredentialStore`](crate::credential::CredentialStore).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Credential storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored credential is corrupt: {0}")]
    Corrupt(String),
}
