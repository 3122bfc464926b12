//! Error types for the authentication library

use common::error::DatabaseError;
use thiserror::Error;

/// Authentication and identity errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Registration or login payload failed validation
    #[error("{0}")]
    Validation(String),

    /// Email or username already taken
    #[error("User already exists")]
    UserExists,

    /// Wrong email or password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Too many failed login attempts
    #[error("Too many login attempts, try again later")]
    RateLimited,

    /// Account is banned or timed out
    #[error("Account suspended")]
    Suspended,

    /// Token could not be issued or verified
    #[error("Token error: {0}")]
    Token(String),

    /// Password hashing failure
    #[error("Password hashing error: {0}")]
    Hashing(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database error
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Database(DatabaseError::from(e))
    }
}

/// Type alias for authentication results
pub type AuthResult<T> = Result<T, AuthError>;
