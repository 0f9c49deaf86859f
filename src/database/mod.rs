//! Pooled database client.
//!
//! [`Database`] owns the connection lifecycle and the connection pool:
//!
//! - `connect` and `disconnect` run under the write half of a single
//!   `RwLock`, so concurrent lifecycle calls serialize.
//! - `query` holds the read half from its state check until the borrowed
//!   connection is back in the pool. A `disconnect` therefore waits for
//!   in-flight queries, and no query can start against a pool being torn
//!   down.
//! - Every wait is bounded: by the configured timeouts, or by a caller
//!   deadline through the `*_within` variants. All futures can be dropped
//!   at any await point without leaving the client mid-transition.

mod state;


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{watch, RwLock};
use tokio::time::{timeout_at, Instant};

use crate::config::DatabaseConfig;
use crate::driver::{Driver, DriverResult, StubDriver};
use crate::error::{AppError, BoxError, Result};
use crate::logger::Logger;
use crate::pool::{Pool, PoolStatus};
use crate::types::{FromQueryResult, QueryResult, SqlValue};
use crate::url::mask_connection_string;

pub use state::ConnectionState;
use state::Transition;

/// A connection-pooled database client.
pub struct Database {
    config: DatabaseConfig,
    driver: Arc<dyn Driver>,
    logger: Logger,
    state: watch::Sender<ConnectionState>,
    /// Present exactly while the state is `Connected`
    pool: RwLock<Option<Pool>>,
}

impl Database {
    /// Validate `config` and build a disconnected client.
    ///
    /// No connection is opened. Logs go to a `[Database]` child of `logger`.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR` if the connection string is empty, the pool size is
    /// zero, or more eager connections than pool slots are requested.
    pub fn new(config: DatabaseConfig, driver: Arc<dyn Driver>, logger: &Logger) -> Result<Self> {
        let logger = logger.child("[Database]");
        if let Err(err) = config.validate() {
            logger.error_cause("Invalid database configuration", &err);
            return Err(err);
        }

        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Ok(Self {
            config,
            driver,
            logger,
            state,
            pool: RwLock::new(None),
        })
    }

    /// Build a client with the stub driver and a `tracing` logger.
    pub fn with_defaults(config: DatabaseConfig) -> Result<Self> {
        Self::new(config, Arc::new(StubDriver), &Logger::default())
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Pool counters, or `None` when not connected.
    pub async fn pool_status(&self) -> Option<PoolStatus> {
        self.pool.read().await.as_ref().map(Pool::status)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the pool. A no-op (with a warning) when already connected.
    pub async fn connect(&self) -> Result<()> {
        self.connect_within(self.config.connect_timeout).await
    }

    /// [`connect`](Self::connect) bounded by `timeout` instead of the
    /// configured connect timeout.
    pub async fn connect_within(&self, timeout: Duration) -> Result<()> {
        // Queries hold the read guard, so don't queue behind them for a no-op
        if self.state() == ConnectionState::Connected {
            self.logger.warn("Database is already connected");
            return Ok(());
        }

        let deadline = Instant::now() + timeout;
        let mut slot = match timeout_at(deadline, self.pool.write()).await {
            Ok(guard) => guard,
            Err(_) => {
                let cause = AppError::timeout(format!(
                    "Timed out after {:?} waiting for the connection lifecycle",
                    timeout
                ));
                return Err(self.connect_failed(cause.into()));
            }
        };

        if self.state() == ConnectionState::Connected {
            self.logger.warn("Database is already connected");
            return Ok(());
        }

        let transition = Transition::begin(
            &self.state,
            ConnectionState::Connecting,
            ConnectionState::Disconnected,
        );
        let pool_size = self.config.effective_pool_size();
        self.logger
            .info(&format!("Connecting to database with pool size: {}", pool_size));
        self.logger.debug(&format!(
            "Connection string: {}",
            mask_connection_string(&self.config.connection_string)
        ));

        let pool = Pool::new(
            Arc::clone(&self.driver),
            self.config.connection_string.clone(),
            pool_size,
            self.logger.child("[Pool]"),
        );
        let warmed = match timeout_at(deadline, pool.warm(self.config.effective_min_connections())).await {
            Ok(result) => result.map_err(|e| Box::new(e) as BoxError),
            Err(_) => Err(AppError::timeout(format!(
                "Timed out after {:?} opening connections",
                timeout
            ))
            .into()),
        };

        match warmed {
            Ok(()) => {
                *slot = Some(pool);
                transition.commit(ConnectionState::Connected);
                self.logger.info("Database connected successfully");
                Ok(())
            }
            Err(cause) => {
                pool.close();
                if let Err(e) = pool.drain().await {
                    self.logger
                        .warn(&format!("Failed to release partially opened connections: {}", e));
                }
                drop(transition);
                Err(self.connect_failed(cause))
            }
        }
    }

    /// Close the pool. A no-op (with a warning) when not connected.
    ///
    /// Waits for in-flight queries to finish. If closing fails or times out
    /// the client stays `Connected` with a usable pool, so the call can be
    /// retried.
    pub async fn disconnect(&self) -> Result<()> {
        self.disconnect_within(self.config.disconnect_timeout).await
    }

    /// [`disconnect`](Self::disconnect) bounded by `timeout` instead of the
    /// configured disconnect timeout.
    pub async fn disconnect_within(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut slot = match timeout_at(deadline, self.pool.write()).await {
            Ok(guard) => guard,
            Err(_) => {
                let cause = AppError::timeout(format!(
                    "Timed out after {:?} waiting for in-flight queries",
                    timeout
                ));
                return Err(self.disconnect_failed(cause.into()));
            }
        };

        // The pool stays in place until teardown succeeds
        let Some(pool) = slot.as_ref().cloned() else {
            self.logger.warn("Database is not connected");
            return Ok(());
        };

        let transition = Transition::begin(
            &self.state,
            ConnectionState::Disconnecting,
            ConnectionState::Connected,
        );
        self.logger.info("Disconnecting from database...");

        let drained = match timeout_at(deadline, pool.drain()).await {
            Ok(result) => result.map_err(|e| Box::new(e) as BoxError),
            Err(_) => Err(AppError::timeout(format!(
                "Timed out after {:?} closing connections",
                timeout
            ))
            .into()),
        };

        match drained {
            Ok(closed) => {
                pool.close();
                *slot = None;
                transition.commit(ConnectionState::Disconnected);
                self.logger
                    .debug(&format!("Closed {} pooled connection(s)", closed));
                self.logger.info("Database disconnected successfully");
                Ok(())
            }
            Err(cause) => {
                drop(transition);
                Err(self.disconnect_failed(cause))
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Run a statement and decode the result into `T`.
    ///
    /// # Errors
    ///
    /// `DATABASE_QUERY_ERROR` when not connected (nothing is borrowed), when
    /// no connection frees up within the acquire timeout, or when the driver
    /// or the decoding fails. The SQL text is kept in the error context.
    pub async fn query<T: FromQueryResult>(&self, sql: &str, params: &[SqlValue]) -> Result<T> {
        self.run_query(sql, params, None).await
    }

    /// [`query`](Self::query) with an overall deadline covering the wait for
    /// a connection and the execution.
    pub async fn query_within<T: FromQueryResult>(
        &self,
        sql: &str,
        params: &[SqlValue],
        timeout: Duration,
    ) -> Result<T> {
        self.run_query(sql, params, Some(Instant::now() + timeout))
            .await
    }

    /// Run a statement and return the number of rows affected.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.query::<u64>(sql, params).await
    }

    async fn run_query<T: FromQueryResult>(
        &self,
        sql: &str,
        params: &[SqlValue],
        deadline: Option<Instant>,
    ) -> Result<T> {
        if self.state() != ConnectionState::Connected {
            return Err(self.not_connected(sql));
        }

        let guard = match deadline {
            Some(deadline) => match timeout_at(deadline, self.pool.read()).await {
                Ok(guard) => guard,
                Err(_) => return Err(self.query_failed(sql, deadline_exceeded())),
            },
            None => self.pool.read().await,
        };

        // A disconnect may have completed while we waited for the lock
        let pool = match guard.as_ref() {
            Some(pool) if self.state() == ConnectionState::Connected => pool,
            _ => return Err(self.not_connected(sql)),
        };

        self.logger.debug_fields(
            "Executing query",
            &json!({ "sql": sql, "params": params_json(params) }),
        );

        let outcome = match deadline {
            Some(deadline) => timeout_at(deadline, self.execute_on(pool, sql, params))
                .await
                .unwrap_or_else(|_| Err(deadline_exceeded())),
            None => self.execute_on(pool, sql, params).await,
        };

        let result = match outcome {
            Ok(result) => result,
            Err(cause) => return Err(self.query_failed(sql, cause)),
        };
        self.logger.debug(&format!(
            "Query returned {} row(s), {} affected",
            result.rows.len(),
            result.rows_affected
        ));

        T::from_query_result(result).map_err(|cause| self.query_failed(sql, cause))
    }

    /// Borrow a connection for the duration of one statement.
    async fn execute_on(
        &self,
        pool: &Pool,
        sql: &str,
        params: &[SqlValue],
    ) -> DriverResult<QueryResult> {
        let mut conn = pool.acquire(self.config.acquire_timeout).await?;
        conn.execute(sql, params).await
    }

    // ========================================================================
    // Failure reporting
    // ========================================================================

    fn connect_failed(&self, cause: BoxError) -> AppError {
        self.logger
            .error_cause("Failed to connect to database", &*cause);
        AppError::database_connection("Unable to establish database connection").with_cause(cause)
    }

    fn disconnect_failed(&self, cause: BoxError) -> AppError {
        self.logger
            .error_cause("Failed to disconnect from database", &*cause);
        AppError::database_connection("Unable to disconnect from database")
            .with_context("operation", "disconnect")
            .with_cause(cause)
    }

    fn not_connected(&self, sql: &str) -> AppError {
        let message = "Cannot execute query: database not connected";
        self.logger.error(message);
        AppError::database_query(message, sql).with_context("state", self.state().as_str())
    }

    fn query_failed(&self, sql: &str, cause: BoxError) -> AppError {
        self.logger.error_cause("Query execution failed", &*cause);
        AppError::database_query("Failed to execute database query", sql).with_cause(cause)
    }
}

fn deadline_exceeded() -> BoxError {
    AppError::timeout("Query deadline exceeded").into()
}

fn params_json(params: &[SqlValue]) -> Value {
    Value::Array(params.iter().map(SqlValue::to_json).collect())
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.state() == ConnectionState::Connected {
            self.logger
                .warn("Database dropped while connected; pooled connections are discarded");
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field(
                "connection_string",
                &mask_connection_string(&self.config.connection_string),
            )
            .field("pool_size", &self.config.effective_pool_size())
            .field("driver", &self.driver.name())
            .field("state", &self.state())
            .finish()
    }
}
