//! Protocol error type.

use thiserror::Error;

/// Failures encoding, decoding, or framing a wire message.
#[derive(Debug, Error)]
pub enum Error {
    /// A message could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A message could not be deserialized.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A frame or payload violates the wire format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
