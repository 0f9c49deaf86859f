//! Driver extension point.
//!
//! The client never speaks a wire protocol itself. A [`Driver`] opens
//! physical connections for the pool, and each [`DriverConnection`] executes
//! statements. [`StubDriver`] is the default: connections open, but query
//! execution is left unimplemented.

use std::future::Future;
use std::pin::Pin;

use crate::error::BoxError;
use crate::types::{QueryResult, SqlValue};
use crate::url::ConnectionUrl;

/// Boxed, sendable future returned by driver methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, BoxError>;

/// Opens connections for a connection string.
pub trait Driver: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Open a new physical connection.
    fn open<'a>(
        &'a self,
        connection_string: &'a str,
    ) -> BoxFuture<'a, DriverResult<Box<dyn DriverConnection>>>;
}

/// A single physical connection owned by the pool.
pub trait DriverConnection: Send + 'static {
    /// Execute a statement with positional parameters.
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [SqlValue],
    ) -> BoxFuture<'a, DriverResult<QueryResult>>;

    /// Whether the connection can no longer be used.
    fn is_closed(&self) -> bool;

    /// Close the connection.
    fn close(self: Box<Self>) -> BoxFuture<'static, DriverResult<()>>;
}

// ============================================================================
// Stub driver
// ============================================================================

/// Driver that validates the connection string and opens placeholder
/// connections. Every query fails with "query execution is not implemented".
#[derive(Debug, Default, Clone, Copy)]
pub struct StubDriver;

impl Driver for StubDriver {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn open<'a>(
        &'a self,
        connection_string: &'a str,
    ) -> BoxFuture<'a, DriverResult<Box<dyn DriverConnection>>> {
        Box::pin(async move {
            ConnectionUrl::parse(connection_string)?;
            tokio::task::yield_now().await;
            Ok::<_, BoxError>(Box::new(StubConnection { closed: false }) as Box<dyn DriverConnection>)
        })
    }
}

struct StubConnection {
    closed: bool,
}

impl DriverConnection for StubConnection {
    fn execute<'a>(
        &'a mut self,
        _sql: &'a str,
        _params: &'a [SqlValue],
    ) -> BoxFuture<'a, DriverResult<QueryResult>> {
        Box::pin(async move {
            let reason = if self.closed {
                "connection is closed"
            } else {
                "query execution is not implemented"
            };
            Err::<QueryResult, BoxError>(reason.into())
        })
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(mut self: Box<Self>) -> BoxFuture<'static, DriverResult<()>> {
        self.closed = true;
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_opens_and_refuses_queries() {
        let mut conn = StubDriver.open("postgresql://localhost/test").await.unwrap();
        assert!(!conn.is_closed());

        let err = conn.execute("SELECT 1", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "query execution is not implemented");

        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_stub_rejects_malformed_connection_string() {
        assert!(StubDriver.open("not a url").await.is_err());
    }
}
