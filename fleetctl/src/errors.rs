use crate::db::errors::DbError;
use crate::types::{Operation, Permission};
use crate::validation::ValidationErrors;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// User lacks required permissions for the operation
    #[error("Insufficient permissions to {action:?} {resource}")]
    InsufficientPermissions {
        required: Permission,
        action: Operation,
        resource: String,
    },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// One or more fields failed validation
    #[error("Validation failed: {errors}")]
    Validation { errors: ValidationErrors },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// A lifecycle transition that the current state does not allow
    #[error("Cannot {action} {entity} in status {from}")]
    InvalidTransition { entity: String, from: String, action: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// Business rule conflict, e.g. assigning a vehicle that is in maintenance
    #[error("Conflict: {message}")]
    Conflict { message: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidTransition { .. } => StatusCode::CONFLICT,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::ProtectedEntity { .. } => StatusCode::CONFLICT,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Conflict { .. } => StatusCode::CONFLICT,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::InsufficientPermissions { action, resource, .. } => {
                format!("Insufficient permissions to {action} {resource}")
            }
            Error::BadRequest { message } => message.clone(),
            Error::Validation { .. } => "Validation failed".to_string(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::InvalidTransition { entity, from, action } => {
                format!("Cannot {action} {entity} in status {from}")
            }
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => unique_violation_message(table.as_deref(), constraint.as_deref()).0,
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::ProtectedEntity {
                    operation,
                    entity_type,
                    reason,
                    ..
                } => {
                    format!("Cannot {operation} {entity_type}: {reason}")
                }
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
            Error::Conflict { message } => message.clone(),
        }
    }
}

/// Friendly message and resource name for a unique constraint, keyed by table and constraint.
fn unique_violation_message(table: Option<&str>, constraint: Option<&str>) -> (String, &'static str) {
    let (message, resource) = match (table, constraint) {
        (Some("users"), Some(c)) if c.contains("email") => ("An account with this email address already exists", "user"),
        (Some("companies"), Some(c)) if c.contains("tax_id") => ("A company with this tax id already exists", "company"),
        (Some("companies"), Some(c)) if c.contains("name") => ("A company with this name already exists", "company"),
        (Some("vehicles"), Some(c)) if c.contains("plate") => ("A vehicle with this plate already exists", "vehicle"),
        (Some("drivers"), Some(c)) if c.contains("document_number") => {
            ("A driver with this document number already exists in the company", "driver")
        }
        (Some("routes"), Some(c)) if c.contains("code") => ("A route with this code already exists in the company", "route"),
        _ => ("Resource already exists", "unknown"),
    };
    (message.to_string(), resource)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::Validation { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Conflict { .. } | Error::InvalidTransition { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
        }

        let status = self.status_code();

        let body = match &self {
            Error::Validation { errors } => json!({
                "message": self.user_message(),
                "errors": errors,
            }),
            Error::Database(DbError::UniqueViolation { constraint, table, .. }) => {
                let (message, resource) = unique_violation_message(table.as_deref(), constraint.as_deref());
                json!({
                    "message": message,
                    "resource": resource,
                })
            }
            _ => json!({ "message": self.user_message() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Resource;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Unauthenticated { message: None }.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::InsufficientPermissions {
                required: Permission::Allow(Resource::Costs, Operation::ReadOwn),
                action: Operation::ReadOwn,
                resource: "costs".to_string(),
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::Validation {
                errors: ValidationErrors::new()
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::InvalidTransition {
                entity: "trip".to_string(),
                from: "completed".to_string(),
                action: "start".to_string(),
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Database(DbError::ProtectedEntity {
                operation: Operation::DeleteOwn,
                reason: "has routes".to_string(),
                entity_type: "carrier".to_string(),
                entity_id: None,
            })
            .status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let err = Error::Internal {
            operation: "connect to postgres at 10.0.0.3".to_string(),
        };
        assert_eq!(err.user_message(), "Internal server error");

        let err = Error::Other(anyhow::anyhow!("secret stack"));
        assert_eq!(err.user_message(), "Internal server error");
    }

    #[test]
    fn test_unique_violation_messages() {
        let err = Error::Database(DbError::UniqueViolation {
            constraint: Some("vehicles_plate_key".to_string()),
            table: Some("vehicles".to_string()),
            message: "duplicate key".to_string(),
            conflicting_value: None,
        });
        assert_eq!(err.user_message(), "A vehicle with this plate already exists");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
