//! Error taxonomy for the database layer.
//!
//! Driver errors are classified exactly once, here, into typed variants that
//! callers can pattern-match. No caller should ever need to parse a Postgres
//! message string to find out what went wrong.

use careline_core::ConditionError;
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Result type alias for database-layer operations.
pub type DbResult<T> = Result<T, DbError>;

/// Database-layer errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A child row referenced a parent that does not exist.
    #[error("foreign key violation{}", constraint_suffix(.constraint))]
    ForeignKeyViolation { constraint: Option<String> },

    /// A unique constraint fired. For idempotent creates this is the benign
    /// race signal and is recovered by re-fetching; it only surfaces when
    /// retries are exhausted.
    #[error("unique constraint violation{}", constraint_suffix(.constraint))]
    UniqueViolation { constraint: Option<String> },

    /// A genuine duplicate business key: the same natural key submitted
    /// twice non-concurrently (e.g. a case section resubmitted).
    #[error("{entity} already exists: {key}")]
    ResourceAlreadyExists { entity: &'static str, key: String },

    /// The caller asked for something structurally unanswerable, e.g. a
    /// timeline with every source excluded.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Malformed caller-supplied value (filter date, pagination field, ...).
    /// The whole query fails rather than silently dropping the filter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Permission rule structure failed to parse.
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// The connection pool timed out handing out a connection.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// The connection pool has been shut down.
    #[error("connection pool closed")]
    PoolClosed,

    /// Catch-all for any other storage engine failure.
    #[error("database operation failed")]
    Database(#[source] tokio_postgres::Error),
}

fn constraint_suffix(constraint: &Option<String>) -> String {
    match constraint {
        Some(name) => format!(" on {name}"),
        None => String::new(),
    }
}

impl DbError {
    /// Whether this is the benign concurrent-insert signal that idempotent
    /// creates recover from.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, DbError::ForeignKeyViolation { .. })
    }
}

/// Classify a driver error by SQLSTATE. This is the single point where raw
/// `tokio_postgres` errors enter the taxonomy.
impl From<tokio_postgres::Error> for DbError {
    fn from(err: tokio_postgres::Error) -> Self {
        let constraint = err
            .as_db_error()
            .and_then(|db| db.constraint())
            .map(str::to_string);
        match err.code() {
            Some(code) if *code == SqlState::UNIQUE_VIOLATION => {
                DbError::UniqueViolation { constraint }
            }
            Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => {
                DbError::ForeignKeyViolation { constraint }
            }
            _ => {
                tracing::error!(error = %err, "unclassified database error");
                DbError::Database(err)
            }
        }
    }
}

impl From<deadpool_postgres::PoolError> for DbError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Timeout(_) => DbError::PoolExhausted,
            deadpool_postgres::PoolError::Closed => DbError::PoolClosed,
            deadpool_postgres::PoolError::Backend(e) => DbError::from(e),
            other => {
                tracing::error!(error = %other, "connection pool error");
                DbError::PoolClosed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_predicate() {
        let err = DbError::UniqueViolation {
            constraint: Some("contacts_account_id_task_id_key".to_string()),
        };
        assert!(err.is_unique_violation());
        assert!(!err.is_foreign_key_violation());
    }

    #[test]
    fn display_includes_constraint_when_known() {
        let err = DbError::ForeignKeyViolation {
            constraint: Some("case_sections_case_id_fkey".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "foreign key violation on case_sections_case_id_fkey"
        );

        let bare = DbError::UniqueViolation { constraint: None };
        assert_eq!(bare.to_string(), "unique constraint violation");
    }

    #[test]
    fn resource_already_exists_names_the_key() {
        let err = DbError::ResourceAlreadyExists {
            entity: "case section",
            key: "12/note/n-1".to_string(),
        };
        assert_eq!(err.to_string(), "case section already exists: 12/note/n-1");
    }
}
