//! Error taxonomy shared by the engine, the pool service and the HTTP layer.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Input that can never be accepted, e.g. splits not adding up to the expense.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller is known but not allowed to perform the action.
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// The request carried no valid credentials.
    #[error("Missing or invalid credentials")]
    Unauthenticated,

    /// Aggregated data that contradicts itself. Never corrected automatically.
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Authorization(_) => "authorization_error",
            Error::Unauthenticated => "unauthenticated",
            Error::DataIntegrity(_) => "data_integrity_error",
            Error::NotFound { .. } => "not_found",
            Error::InvalidTransition(_) => "invalid_transition",
            Error::Storage(_) => "storage_error",
            Error::Config(_) => "config_error",
        }
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<bson::ser::Error> for Error {
    fn from(err: bson::ser::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "type": self.error_type(),
                "message": self.to_string(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Authorization(_) => StatusCode::FORBIDDEN,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidTransition(_) => StatusCode::CONFLICT,
            Error::DataIntegrity(_) | Error::Storage(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_http_statuses() {
        assert_eq!(
            Error::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Authorization("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(Error::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::not_found("Pool", "p1").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::DataIntegrity("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(
            Error::not_found("Expense", "abc").to_string(),
            "Expense not found: abc"
        );
    }
}
