//! Client error type.

use thiserror::Error;

/// Everything that can go wrong talking to a server.
#[derive(Debug, Error)]
pub enum Error {
    /// The socket could not be created, configured, or dialed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A message violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] strata_proto::Error),

    /// The request or its reply did not arrive in time.
    #[error("request timed out")]
    Timeout,

    /// The server rejected the request.
    #[error("server error {code}: {message}")]
    Server {
        /// Error code from `strata_proto::error_codes`.
        code: u32,
        /// Human-readable error message.
        message: String,
    },
}
