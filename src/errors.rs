use axum::http::StatusCode;
use std::fmt;
use thiserror::Error;

/// A single field that failed schema validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every way a single intake request can fail.
///
/// All variants except `Internal` are caller mistakes and surface their
/// message verbatim. `Internal` carries operator detail that is logged and
/// replaced by a generic message in the response.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("No request body found")]
    NoBody,
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Invalid base64 body: {0}")]
    InvalidBase64(String),
    #[error("Invalid multipart body: {0}")]
    InvalidMultipart(String),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),
    #[error("Unsupported Content-Type: {0}")]
    UnsupportedContentType(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntakeError {
    pub fn status(&self) -> StatusCode {
        match self {
            IntakeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to hand back to the caller.
    pub fn public_message(&self) -> String {
        match self {
            IntakeError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        IntakeError::Validation(vec![FieldError::new(field, reason)])
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_field() {
        let err = IntakeError::Validation(vec![
            FieldError::new("rv_id", "must be an integer"),
            FieldError::new("price", "must be a decimal number"),
        ]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.public_message(),
            "Validation failed: rv_id: must be an integer; price: must be a decimal number"
        );
    }

    #[test]
    fn internal_errors_hide_their_detail() {
        let err = IntakeError::from(anyhow::anyhow!("disk full at /var/data"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");
        assert!(err.to_string().contains("disk full"));
    }
}
