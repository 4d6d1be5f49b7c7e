use crate::types::Operation;
use thiserror::Error;

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
        /// The conflicting value that caused the violation (if extractable)
        conflicting_value: Option<String>,
    },

    /// Foreign key constraint violation
    #[error("Foreign key constraint violation")]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Check constraint violation
    #[error("Check constraint violation")]
    CheckViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Entity cannot be modified or deleted due to protection rules
    /// NOTE: use this only for data-integrity rules (dependent records), not user roles etc. -
    /// that's handled at the API layer.
    #[error("{operation:?} cannot be applied to entity of type {entity_type}: {reason}")]
    ProtectedEntity {
        operation: Operation,      // delete / update
        reason: String,            // "has dependent routes", "is the last admin", etc.
        entity_type: String,       // "company", "carrier", "route", "user"
        entity_id: Option<String>, // ID for logging/debugging
    },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    let constraint = db_err.constraint().map(|s| s.to_string());

                    let conflicting_value = db_err
                        .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                        .and_then(|pg_err| pg_err.detail())
                        .and_then(extract_conflicting_value);

                    DbError::UniqueViolation {
                        constraint,
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                        conflicting_value,
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }
                } else if db_err.is_check_violation() {
                    DbError::CheckViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }
                } else {
                    // All other database errors are non-recoverable - convert to anyhow
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Extract the conflicting value from a PostgreSQL unique violation detail message, which looks
/// like `Key (plate)=(ABC1234) already exists.`
fn extract_conflicting_value(detail: &str) -> Option<String> {
    let start = detail.find("=(")? + 2;
    let end = detail[start..].find(')')?;
    Some(detail[start..start + end].to_string())
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Turn a foreign key violation raised by a DELETE into a protected-entity error, since it
    /// means other rows still point at the entity.
    pub fn protect_on_delete(self, entity_type: &str, entity_id: impl ToString) -> Self {
        match self {
            DbError::ForeignKeyViolation { table, .. } => DbError::ProtectedEntity {
                operation: Operation::DeleteOwn,
                reason: match table {
                    Some(table) => format!("it is still referenced by {table}"),
                    None => "it is still referenced by other records".to_string(),
                },
                entity_type: entity_type.to_string(),
                entity_id: Some(entity_id.to_string()),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_conflicting_value() {
        assert_eq!(
            extract_conflicting_value("Key (plate)=(ABC1234) already exists."),
            Some("ABC1234".to_string())
        );
        assert_eq!(extract_conflicting_value("no detail"), None);
    }

    #[test]
    fn test_protect_on_delete() {
        let err = DbError::ForeignKeyViolation {
            constraint: Some("routes_carrier_id_fkey".to_string()),
            table: Some("routes".to_string()),
            message: "violates foreign key".to_string(),
        }
        .protect_on_delete("carrier", "abc");
        assert!(matches!(err, DbError::ProtectedEntity { ref reason, .. } if reason.contains("routes")));

        assert!(matches!(DbError::NotFound.protect_on_delete("carrier", "abc"), DbError::NotFound));
    }
}
