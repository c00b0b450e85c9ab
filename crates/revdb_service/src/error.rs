//! Error types for the service layer.

use revdb_core::{CoreError, ValidationErrors};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::REQUIRED;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A client-facing error: an HTTP-style status code, a message and,
/// for validation failures, the failing fields.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code} {message}")]
pub struct ServiceError {
    /// Status code: 400, 404 or 500.
    pub code: u16,
    /// Human-readable summary.
    pub message: String,
    /// Failing fields, for validation errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

impl ServiceError {
    /// Creates an error without field details.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            errors: None,
        }
    }

    /// A 400 carrying field failures.
    pub fn validation(errors: ValidationErrors) -> Self {
        Self {
            code: 400,
            message: "Validation error".to_string(),
            errors: Some(errors),
        }
    }

    /// A 404 for a missing document.
    pub fn not_found(id: &str) -> Self {
        Self::new(404, format!("Not found: {id}"))
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.code >= 500
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(errors) => Self::validation(errors),
            CoreError::MissingId => {
                Self::validation(ValidationErrors::new().with("id", REQUIRED))
            }
            CoreError::NotFound { id } => Self::not_found(&id),
            other @ CoreError::InvalidOperation { .. } => Self::new(400, other.to_string()),
            other if other.is_client_error() => Self::new(400, other.to_string()),
            other => Self::new(500, other.to_string()),
        }
    }
}
