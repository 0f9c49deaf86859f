//! poolkit - a connection-pooled async database client.
//!
//! [`Database`] wraps a bounded pool of driver connections with an explicit
//! lifecycle (`connect`, `query`, `disconnect`), structured logging with
//! credential masking, and classified [`AppError`]s.
//!
//! ```no_run
//! use poolkit::{Database, DatabaseConfig};
//!
//! # async fn run() -> poolkit::error::Result<()> {
//! let db = Database::with_defaults(DatabaseConfig::new("postgres://app:secret@db/app").pool_size(5))?;
//! db.connect().await?;
//! let changed = db.execute("UPDATE jobs SET done = true", &[]).await;
//! db.disconnect().await?;
//! # let _ = changed;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod driver;
pub mod error;
pub mod logger;
pub mod pool;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod types;
pub mod url;

pub use config::DatabaseConfig;
pub use database::{ConnectionState, Database};
pub use driver::{Driver, DriverConnection, StubDriver};
pub use error::{handle_error, is_app_error, AppError, ErrorCode};
pub use logger::{LogLevel, Logger, LoggerConfig, MemorySink};
pub use pool::{PoolError, PoolStatus};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;
pub use types::{FromQueryResult, QueryResult, Rows, SqlValue};
pub use url::{mask_connection_string, ConnectionUrl};
