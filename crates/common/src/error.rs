//! Common error types shared across crates.

use thiserror::Error;

/// Request-level error surfaced to HTTP callers.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::NotFound`] → 404
/// - [`ServiceError::Forbidden`] → 403
/// - [`ServiceError::Internal`] → 500
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The package, or the file inside it, does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested path escapes the package root.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Reading or streaming a file failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) => 404,
            ServiceError::Forbidden(_) => 403,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Forbidden(_) => "access_denied",
            ServiceError::Internal(_) => "internal_error",
        }
    }

    /// The caller-safe message, without the status prefix.
    pub fn message(&self) -> &str {
        match self {
            ServiceError::NotFound(m) | ServiceError::Forbidden(m) | ServiceError::Internal(m) => m,
        }
    }
}
