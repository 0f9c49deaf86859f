//! SQLite driver.
//!
//! Backs the pool with rusqlite, run on tokio-rusqlite worker threads.
//! Accepts `sqlite::memory:`, `sqlite:<path>` and `sqlite://<path>`.
//! Every `:memory:` connection is its own database, so in-memory pools
//! should be sized to one connection.

pub mod connection;
pub mod error;
mod types;

#[cfg(test)]
mod tests;

pub use connection::SqliteConnection;
pub use error::{SqliteError, SqliteResult};

use crate::driver::{BoxFuture, Driver, DriverConnection, DriverResult};
use crate::error::BoxError;

/// [`Driver`] for SQLite connection strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn open<'a>(
        &'a self,
        connection_string: &'a str,
    ) -> BoxFuture<'a, DriverResult<Box<dyn DriverConnection>>> {
        Box::pin(async move {
            let path = sqlite_path(connection_string)?;
            let conn = SqliteConnection::open(path).await?;
            Ok::<_, BoxError>(Box::new(conn) as Box<dyn DriverConnection>)
        })
    }
}

/// Extract the database path from a `sqlite:` connection string.
pub fn sqlite_path(connection_string: &str) -> SqliteResult<&str> {
    let path = connection_string
        .strip_prefix("sqlite://")
        .or_else(|| connection_string.strip_prefix("sqlite:"))
        .ok_or_else(|| SqliteError::InvalidPath(connection_string.to_string()))?;

    if path.is_empty() {
        return Err(SqliteError::InvalidPath(connection_string.to_string()));
    }
    Ok(path)
}
