//! Core error types.

use thiserror::Error;

/// Core persistence errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The sled tree failed.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// A protocol type could not be converted.
    #[error("protocol error: {0}")]
    Protocol(#[from] strata_proto::Error),

    /// Model definition or validation error.
    #[error(transparent)]
    Model(#[from] strata_model::ModelError),

    /// Authorization or capability failure.
    #[error(transparent)]
    Security(#[from] crate::security::SecurityError),

    /// A stored row could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored row could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Model class not registered with the server.
    #[error("unknown model class: {0}")]
    UnknownModel(String),

    /// A mutation targeted a row that no longer exists.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A relationship points at an object that is unsaved or missing.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// A multi-op transaction aborted.
    #[error("transaction error: {0}")]
    Transaction(String),
}
