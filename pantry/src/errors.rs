use crate::db::errors::DbError;
use crate::validation::ValidationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or credentials did not match
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Payload failed field validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Invalid request data, e.g. a body that is not a JSON object
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Validation(_) | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::Validation(err) => err.message(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation {
                    field,
                    table,
                    conflicting_value,
                    ..
                } => match (table.as_deref(), field.as_deref(), conflicting_value.as_deref()) {
                    (Some(table), Some(field), Some(value)) => {
                        format!("{table} record with {field} '{value}' is a duplicate")
                    }
                    _ => "Record is a duplicate".to_string(),
                },
                DbError::Other(_) => "Database error occurred".to_string(),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } => {
                tracing::info!("Authentication error: {}", self);
            }
            Error::Validation(_) | Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorBody {
            message: self.user_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationReason;

    #[test]
    fn test_duplicate_is_a_bad_request_naming_the_value() {
        let err = Error::Database(DbError::UniqueViolation {
            field: Some("name".to_string()),
            table: Some("scores".to_string()),
            message: "UNIQUE constraint failed: scores.name".to_string(),
            conflicting_value: Some("Lina".to_string()),
        });

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "scores record with name 'Lina' is a duplicate");
    }

    #[test]
    fn test_validation_error_message_is_passed_through() {
        let err = Error::from(ValidationError {
            field: "link".to_string(),
            reason: ValidationReason::TooShort { min_length: 2 },
        });

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "link is missing, or is less than 2 characters");
    }

    #[test]
    fn test_internal_errors_do_not_leak_details() {
        let err = Error::Database(DbError::Other(anyhow::anyhow!("disk I/O error at /var/lib/pantry.db")));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("/var/lib"));

        let err = Error::Internal {
            operation: "connect to database".to_string(),
        };
        assert_eq!(err.user_message(), "Internal server error");
    }

    #[test]
    fn test_not_found_variants() {
        assert_eq!(Error::Database(DbError::NotFound).status_code(), StatusCode::NOT_FOUND);
        let err = Error::NotFound {
            resource: "recipes".to_string(),
            id: "12".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.user_message(), "recipes with ID 12 not found");
    }
}
