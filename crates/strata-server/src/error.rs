//! Server error type.

use thiserror::Error;

/// Failures from the transport, configuration, and persistence layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Persistence engine error.
    #[error(transparent)]
    Core(#[from] strata_core::Error),

    /// Model definition or validation error.
    #[error(transparent)]
    Model(#[from] strata_model::ModelError),

    /// A message violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] strata_proto::Error),

    /// The nng socket or a worker failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The configuration cannot be served.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error while loading configuration inputs.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
