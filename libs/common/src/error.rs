//! Custom error types for the common library
//!
//! This module defines application-specific error types that can be used
//! throughout the application.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// PostgreSQL SQLSTATE for `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL SQLSTATE for `undefined_table`
const UNDEFINED_TABLE: &str = "42P01";

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// True when the failing statement hit a unique constraint
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Query(e) => has_sqlstate(e, UNIQUE_VIOLATION),
            _ => false,
        }
    }

    /// True when the statement referenced a table that does not exist
    pub fn is_undefined_table(&self) -> bool {
        match self {
            DatabaseError::Query(e) => has_sqlstate(e, UNDEFINED_TABLE),
            _ => false,
        }
    }
}

impl From<SqlxError> for DatabaseError {
    fn from(e: SqlxError) -> Self {
        DatabaseError::Query(e)
    }
}

fn has_sqlstate(e: &SqlxError, state: &str) -> bool {
    match e {
        SqlxError::Database(db) => db.code().as_deref() == Some(state),
        _ => false,
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_constraint_violations() {
        let err = DatabaseError::Query(SqlxError::RowNotFound);
        assert!(!err.is_unique_violation());
        assert!(!err.is_undefined_table());

        let err = DatabaseError::Configuration("bad url".to_string());
        assert!(!err.is_unique_violation());
    }
}
