//! SQLite error types.

use thiserror::Error;

pub type SqliteResult<T> = Result<T, SqliteError>;

/// SQLite-specific errors.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// Connection string is not `sqlite:<path>` / `sqlite://<path>`
    #[error("unsupported SQLite connection string: {0}")]
    InvalidPath(String),

    /// Failure reported by the SQLite worker thread
    #[error("SQLite error: {0}")]
    Worker(String),

    /// Connection closed
    #[error("connection closed")]
    ConnectionClosed,
}

impl From<tokio_rusqlite::Error> for SqliteError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        SqliteError::Worker(e.to_string())
    }
}
