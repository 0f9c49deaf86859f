//! SQLite connection implementation.

use rusqlite::params_from_iter;
use tokio_rusqlite::Connection;

use super::error::{SqliteError, SqliteResult};
use super::types::from_value_ref;
use crate::driver::{BoxFuture, DriverConnection, DriverResult};
use crate::error::BoxError;
use crate::types::{QueryResult, SqlValue};

/// A SQLite connection.
pub struct SqliteConnection {
    conn: Connection,
    closed: bool,
}

impl SqliteConnection {
    /// Open a SQLite database.
    ///
    /// Supports:
    /// - `:memory:` for in-memory database
    /// - File path for disk-based database
    ///
    /// File databases are switched to WAL mode.
    pub async fn open(path: &str) -> SqliteResult<Self> {
        let is_memory = path == ":memory:";
        let conn = if is_memory {
            Connection::open_in_memory().await?
        } else {
            Connection::open(path).await?
        };

        if !is_memory {
            conn.call(|c| {
                c.execute_batch(
                    "PRAGMA journal_mode=WAL;
                     PRAGMA synchronous=NORMAL;
                     PRAGMA busy_timeout=5000;
                     PRAGMA cache_size=-64000;", // 64MB cache
                )?;
                Ok(())
            })
            .await?;
        }

        Ok(Self {
            conn,
            closed: false,
        })
    }

    /// Run one statement.
    ///
    /// Statements that produce columns return their rows; anything else
    /// reports the number of rows changed. Statements are prepared through
    /// the connection's statement cache.
    pub async fn run(&self, sql: &str, params: &[SqlValue]) -> SqliteResult<QueryResult> {
        if self.closed {
            return Err(SqliteError::ConnectionClosed);
        }

        let sql = sql.to_string();
        let params = params.to_vec();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;

                if stmt.column_count() == 0 {
                    let changed = stmt.execute(params_from_iter(params.iter()))?;
                    return Ok(QueryResult::affected(changed as u64));
                }

                let columns: Vec<String> =
                    stmt.column_names().iter().map(|s| s.to_string()).collect();

                let mut rows_data = Vec::new();
                let mut rows = stmt.query(params_from_iter(params.iter()))?;
                while let Some(row) = rows.next()? {
                    let mut values = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        values.push(from_value_ref(row.get_ref(i)?));
                    }
                    rows_data.push(values);
                }

                Ok(QueryResult {
                    columns,
                    rows: rows_data,
                    rows_affected: 0,
                })
            })
            .await
            .map_err(SqliteError::from)
    }

    /// Execute multiple statements (for DDL, etc.).
    pub async fn execute_batch(&self, sql: &str) -> SqliteResult<()> {
        if self.closed {
            return Err(SqliteError::ConnectionClosed);
        }

        let sql = sql.to_string();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await
            .map_err(SqliteError::from)
    }

    /// Check if the connection is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the connection, waiting for the worker thread to finish.
    pub async fn close(mut self) -> SqliteResult<()> {
        self.closed = true;
        self.conn.close().await.map_err(SqliteError::from)
    }
}

impl DriverConnection for SqliteConnection {
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [SqlValue],
    ) -> BoxFuture<'a, DriverResult<QueryResult>> {
        Box::pin(async move {
            self.run(sql, params)
                .await
                .map_err(|e| Box::new(e) as BoxError)
        })
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, DriverResult<()>> {
        Box::pin(async move {
            SqliteConnection::close(*self)
                .await
                .map_err(|e| Box::new(e) as BoxError)
        })
    }
}
