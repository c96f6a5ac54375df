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
        /// The field (column) carrying the unique constraint, when known
        field: Option<String>,
        table: Option<String>,
        message: String,
        /// The conflicting value that caused the violation (if known)
        conflicting_value: Option<String>,
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
                    DbError::UniqueViolation {
                        field: None,
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                        conflicting_value: None,
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

impl DbError {
    /// Attach the table, field and value that a unique violation was about.
    ///
    /// SQLite reports the constraint only inside its message, so the repository fills these in
    /// from what it was writing.
    pub fn with_conflict(self, table: &str, field: &str, value: Option<String>) -> Self {
        match self {
            DbError::UniqueViolation { message, .. } => DbError::UniqueViolation {
                field: Some(field.to_string()),
                table: Some(table.to_string()),
                message,
                conflicting_value: value,
            },
            other => other,
        }
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(DbError::from(sqlx::Error::RowNotFound), DbError::NotFound));
    }

    #[test]
    fn test_with_conflict_only_touches_unique_violations() {
        let err = DbError::UniqueViolation {
            field: None,
            table: None,
            message: "UNIQUE constraint failed: scores.name".to_string(),
            conflicting_value: None,
        }
        .with_conflict("scores", "name", Some("Lina".to_string()));

        match err {
            DbError::UniqueViolation {
                field,
                table,
                conflicting_value,
                ..
            } => {
                assert_eq!(field.as_deref(), Some("name"));
                assert_eq!(table.as_deref(), Some("scores"));
                assert_eq!(conflicting_value.as_deref(), Some("Lina"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            DbError::NotFound.with_conflict("scores", "name", None),
            DbError::NotFound
        ));
    }
}
