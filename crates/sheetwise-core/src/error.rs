//! Domain-level error types.

use thiserror::Error;

/// Domain errors - invalid input or configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Invalid rate limit policy: {0}")]
    InvalidPolicy(String),

    #[error("{0}")]
    Validation(String),
}
