//! Security error types.

use thiserror::Error;

/// Errors from permission and capability checks.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// A mutation was attempted without a valid capability, or the
    /// policy denied the operation.
    #[error("authorization error: {0}")]
    Authorization(String),
}

/// Result type for security operations.
pub type SecurityResult<T> = Result<T, SecurityError>;
