//! Model layer error types.

use thiserror::Error;

/// Errors raised while defining models or constructing instances.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Model definition is invalid. Raised at registration time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Instance construction or accessor validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced model class is not registered.
    #[error("unknown model class: {0}")]
    UnknownModel(String),
}
