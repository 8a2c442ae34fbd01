//! Response bodies returned by the gateway's JSON error paths.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"not_found"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        Self::new(err.code(), err.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_new() {
        let e = ErrorResponse::new("not_found", "package ghost not found");
        assert_eq!(e.code, "not_found");
        assert!(e.message.contains("ghost"));
    }

    #[test]
    fn from_service_error_uses_code_and_message() {
        let err = ServiceError::Forbidden("access denied".into());
        let body = ErrorResponse::from(&err);
        assert_eq!(body.code, "access_denied");
        assert_eq!(body.message, "access denied");
    }

    #[test]
    fn serialises_as_flat_object() {
        let json = serde_json::to_value(ErrorResponse::new("internal_error", "boom")).unwrap();
        assert_eq!(json["code"], "internal_error");
        assert_eq!(json["message"], "boom");
    }
}
