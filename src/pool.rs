//! Bounded connection pool.
//!
//! The pool hands out at most `size` connections at a time. Connections are
//! opened lazily through the [`Driver`] and returned to the idle list when
//! the [`PooledConnection`] guard is dropped, whatever path the borrower took.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::driver::{Driver, DriverConnection, DriverResult};
use crate::error::BoxError;
use crate::logger::Logger;
use crate::types::{QueryResult, SqlValue};

/// Errors produced by the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("connection pool is closed")]
    Closed,

    #[error("timed out after {0:?} waiting for a pooled connection")]
    Timeout(Duration),

    #[error("failed to open connection: {0}")]
    Open(#[source] BoxError),

    #[error("failed to close {failed} pooled connection(s): {source}")]
    Close {
        failed: usize,
        #[source]
        source: BoxError,
    },
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Maximum number of connections
    pub size: u32,
    /// Connections waiting in the idle list
    pub idle: usize,
    /// Connections currently borrowed
    pub in_use: usize,
}

/// A physical connection tagged with an id for log correlation.
struct Slot {
    id: Uuid,
    conn: Box<dyn DriverConnection>,
}

// ============================================================================
// Pooled Connection
// ============================================================================

/// A connection checked out from the pool.
///
/// When dropped, the connection is returned to the pool.
pub struct PooledConnection {
    /// The actual connection (None when returned to pool)
    slot: Option<Slot>,
    /// Reference back to the pool
    pool: Arc<PoolInner>,
    /// Semaphore permit (controls pool size)
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Id of the underlying connection.
    pub fn id(&self) -> Option<Uuid> {
        self.slot.as_ref().map(|s| s.id)
    }

    /// Execute a statement on this connection.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<QueryResult> {
        let slot = self.slot.as_mut().ok_or(PoolError::Closed)?;
        slot.conn.execute(sql, params).await
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            // Only return healthy connections to an open pool
            if !slot.conn.is_closed() && !self.pool.semaphore.is_closed() {
                self.pool.idle.lock().push(slot);
            } else {
                self.pool
                    .logger
                    .debug(&format!("Discarding connection {}", slot.id));
            }
        }
    }
}

// ============================================================================
// Pool
// ============================================================================

struct PoolInner {
    driver: Arc<dyn Driver>,
    connection_string: String,
    size: u32,
    /// Idle connections waiting to be used
    idle: Mutex<Vec<Slot>>,
    /// Semaphore to limit total connections
    semaphore: Arc<Semaphore>,
    logger: Logger,
}

/// A bounded pool of driver connections.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create an empty pool. No connection is opened yet.
    pub fn new(
        driver: Arc<dyn Driver>,
        connection_string: impl Into<String>,
        size: u32,
        logger: Logger,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                driver,
                connection_string: connection_string.into(),
                size,
                idle: Mutex::new(Vec::new()),
                semaphore: Arc::new(Semaphore::new(size as usize)),
                logger,
            }),
        }
    }

    /// Open `count` connections up front and park them in the idle list.
    pub async fn warm(&self, count: u32) -> Result<(), PoolError> {
        for _ in 0..count.min(self.inner.size) {
            let slot = self.open_slot().await?;
            self.inner.idle.lock().push(slot);
        }
        Ok(())
    }

    /// Borrow a connection, waiting at most `timeout` for a free slot.
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledConnection, PoolError> {
        // Acquire a permit (waits if pool is exhausted)
        let permit = tokio::time::timeout(timeout, Arc::clone(&self.inner.semaphore).acquire_owned())
            .await
            .map_err(|_| PoolError::Timeout(timeout))?
            .map_err(|_| PoolError::Closed)?;

        // Try to get an idle connection
        let idle = loop {
            let candidate = self.inner.idle.lock().pop();
            match candidate {
                Some(slot) if slot.conn.is_closed() => {
                    self.inner
                        .logger
                        .debug(&format!("Dropping closed idle connection {}", slot.id));
                }
                other => break other,
            }
        };

        let slot = match idle {
            Some(slot) => slot,
            None => self.open_slot().await?,
        };

        Ok(PooledConnection {
            slot: Some(slot),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Close every idle connection.
    ///
    /// The pool stays usable afterwards and reopens connections on demand.
    /// Returns the number of connections closed.
    pub async fn drain(&self) -> Result<usize, PoolError> {
        let slots = {
            let mut idle = self.inner.idle.lock();
            std::mem::take(&mut *idle)
        };

        let mut closed = 0;
        let mut failed = 0;
        let mut first_error = None;
        for slot in slots {
            let id = slot.id;
            match slot.conn.close().await {
                Ok(()) => closed += 1,
                Err(e) => {
                    self.inner
                        .logger
                        .debug(&format!("Failed to close connection {}: {}", id, e));
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(source) => Err(PoolError::Close { failed, source }),
            None => Ok(closed),
        }
    }

    /// Stop handing out connections. Borrowed connections are discarded when
    /// returned.
    pub fn close(&self) {
        self.inner.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.semaphore.is_closed()
    }

    pub fn status(&self) -> PoolStatus {
        let available = self.inner.semaphore.available_permits();
        PoolStatus {
            size: self.inner.size,
            idle: self.inner.idle.lock().len(),
            in_use: (self.inner.size as usize).saturating_sub(available),
        }
    }

    async fn open_slot(&self) -> Result<Slot, PoolError> {
        let conn = self
            .inner
            .driver
            .open(&self.inner.connection_string)
            .await
            .map_err(PoolError::Open)?;
        let id = Uuid::new_v4();
        self.inner.logger.debug(&format!(
            "Opened {} connection {}",
            self.inner.driver.name(),
            id
        ));
        Ok(Slot { id, conn })
    }
}
