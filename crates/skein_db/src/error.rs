//! Error types for the state layer.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for state store operations.
pub type DbResult<T> = Result<T, DbError>;

/// State store error types.
#[derive(Debug, Error, Diagnostic)]
pub enum DbError {
    /// SQLite/sqlx error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(help("The state database may have been written by a newer version"))]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO error while preparing the database location
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
