//! Client configuration.

use std::time::Duration;

use crate::error::{AppError, Result};

/// Pool size used when none is configured.
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Default bound for connect, acquire and disconnect waits.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the connection string.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Environment variable holding the pool size.
pub const ENV_POOL_SIZE: &str = "DATABASE_POOL_SIZE";

/// Database client configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database connection string (may carry credentials)
    pub connection_string: String,
    /// Maximum number of pooled connections (default: 10)
    pub pool_size: Option<u32>,
    /// Connections opened eagerly on connect (default: 1)
    pub min_connections: Option<u32>,
    /// Bound on establishing the pool
    pub connect_timeout: Duration,
    /// Bound on waiting for a pooled connection
    pub acquire_timeout: Duration,
    /// Bound on draining and closing the pool
    pub disconnect_timeout: Duration,
}

impl DatabaseConfig {
    /// Create a configuration with defaults for everything but the URL.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            pool_size: None,
            min_connections: None,
            connect_timeout: DEFAULT_TIMEOUT,
            acquire_timeout: DEFAULT_TIMEOUT,
            disconnect_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the maximum number of connections.
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = Some(size);
        self
    }

    /// Set the number of connections opened on connect.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = Some(min);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// Load from `DATABASE_URL` and `DATABASE_POOL_SIZE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment, dotenv map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(ENV_DATABASE_URL).unwrap_or_default();
        let mut config = Self::new(url);

        if let Some(raw) = lookup(ENV_POOL_SIZE) {
            let size = raw.trim().parse::<u32>().map_err(|e| {
                AppError::validation("Database pool size must be at least 1")
                    .with_context("variable", ENV_POOL_SIZE)
                    .with_context("value", raw.clone())
                    .with_cause(e)
            })?;
            config = config.pool_size(size);
        }

        config.validate()?;
        Ok(config)
    }

    /// Pool size after applying the default.
    pub fn effective_pool_size(&self) -> u32 {
        self.pool_size.unwrap_or(DEFAULT_POOL_SIZE)
    }

    /// Eager connections after applying the default.
    pub fn effective_min_connections(&self) -> u32 {
        self.min_connections.unwrap_or(1)
    }

    /// Check the configuration invariants.
    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(AppError::validation("Database connection string is required")
                .with_context("field", "connection_string"));
        }

        if let Some(size) = self.pool_size {
            if size < 1 {
                return Err(AppError::validation("Database pool size must be at least 1")
                    .with_context("field", "pool_size")
                    .with_context("value", size));
            }
        }

        let min = self.effective_min_connections();
        let size = self.effective_pool_size();
        if min > size {
            return Err(AppError::validation(format!(
                "Database min connections ({}) cannot exceed pool size ({})",
                min, size
            ))
            .with_context("field", "min_connections"));
        }

        Ok(())
    }
}
