//! Error types for skylark_auth.

use miette::Diagnostic;
use thiserror::Error;

/// Result type for auth storage operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur in auth storage operations.
#[derive(Debug, Error, Diagnostic)]
pub enum AuthError {
    /// Database error from sqlx.
    #[error("Database error: {0}")]
    #[diagnostic(code(skylark_auth::database))]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    #[diagnostic(code(skylark_auth::migration))]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO error.
    #[error("IO error: {0}")]
    #[diagnostic(code(skylark_auth::io))]
    Io(#[from] std::io::Error),

    /// Sealing or opening a secret failed.
    #[error("Credential cipher error: {0}")]
    #[diagnostic(
        code(skylark_auth::crypto),
        help("The credential key may have changed since this secret was stored; sign in again")
    )]
    Crypto(String),

    /// The key file exists but does not hold a usable 256-bit key.
    #[error("Invalid credential key at {path}: {reason}")]
    #[diagnostic(
        code(skylark_auth::invalid_key),
        help("Delete the key file and sign in again to generate a new one")
    )]
    InvalidKey { path: String, reason: String },
}
