//! Scoped database sessions
//!
//! A [`Session`] owns one pooled connection with an open transaction for the
//! duration of a single unit of work. [`Database::with_session`] is the only
//! supported way to obtain one outside this crate's tests.

use futures::future::BoxFuture;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::error::DbError;
use crate::metrics::{record_acquire, record_outcome, update_pool_metrics};

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub size: u32,
    pub idle: usize,
    pub max: u32,
}

/// Process-wide handle to the connection pool. Cloning is cheap and shares
/// the same pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    service: Arc<str>,
    acquire_timeout: Duration,
    ping_timeout: Duration,
}

/// A unit of work bound to one borrowed connection and one transaction.
///
/// Dropping a session without committing rolls the transaction back and
/// returns the connection to the pool, which covers aborted requests.
pub struct Session {
    tx: Transaction<'static, Sqlite>,
    service: Arc<str>,
    started: Instant,
}

impl Database {
    pub(crate) fn new(
        pool: SqlitePool,
        service: &str,
        acquire_timeout: Duration,
        ping_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            service: Arc::from(service),
            acquire_timeout,
            ping_timeout,
        }
    }

    /// Run `f` inside a fresh session.
    ///
    /// Commits when `f` returns `Ok`, rolls back and returns the original
    /// error when it returns `Err`. The connection goes back to the pool on
    /// every path. Waiting for a free connection is bounded by the pool's
    /// acquire timeout and surfaces as [`DbError::PoolExhausted`].
    ///
    /// # Example
    /// ```ignore
    /// let count: i64 = db
    ///     .with_session(|s| Box::pin(async move {
    ///         sqlx::query_scalar("SELECT COUNT(*) FROM users")
    ///             .fetch_one(s.conn())
    ///             .await
    ///             .map_err(DbError::from)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn with_session<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, E>>,
        E: From<DbError>,
    {
        let mut session = self.begin().await?;

        match f(&mut session).await {
            Ok(value) => {
                session.commit().await?;
                Ok(value)
            }
            Err(err) => {
                session.rollback().await;
                Err(err)
            }
        }
    }

    /// Acquire a connection and open a transaction.
    pub async fn begin(&self) -> Result<Session, DbError> {
        let started = Instant::now();
        let result = self.pool.begin().await;
        record_acquire(&self.service, started, result.as_ref().err());

        let tx = result.map_err(|e| self.classify_acquire_error(e))?;
        update_pool_metrics(&self.pool, &self.service);

        Ok(Session {
            tx,
            service: Arc::clone(&self.service),
            started: Instant::now(),
        })
    }

    /// Trivial round-trip with a timeout. Never mutates state.
    pub async fn ping(&self) -> bool {
        match tokio::time::timeout(
            self.ping_timeout,
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                error!(service = %self.service, error = %e, "Database ping failed");
                false
            }
            Err(_) => {
                error!(
                    service = %self.service,
                    timeout_ms = self.ping_timeout.as_millis() as u64,
                    "Database ping timed out"
                );
                false
            }
        }
    }

    pub fn pool_status(&self) -> PoolStatus {
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    /// Raw pool access for schema migrations at startup.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn classify_acquire_error(&self, err: sqlx::Error) -> DbError {
        match err {
            sqlx::Error::PoolTimedOut => {
                warn!(
                    service = %self.service,
                    waited_secs = self.acquire_timeout.as_secs(),
                    "Connection pool exhausted"
                );
                DbError::PoolExhausted {
                    service: self.service.to_string(),
                    waited_secs: self.acquire_timeout.as_secs(),
                }
            }
            sqlx::Error::PoolClosed => DbError::PoolClosed,
            other => DbError::Query(other),
        }
    }
}

impl Session {
    /// Connection to run queries on, valid for the life of the session.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    pub async fn commit(self) -> Result<(), DbError> {
        let Session {
            tx,
            service,
            started,
        } = self;

        match tx.commit().await {
            Ok(()) => {
                record_outcome(&service, "commit");
                debug!(
                    service = %service,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Session committed"
                );
                Ok(())
            }
            Err(e) => {
                // The failed transaction is rolled back when `tx` drops.
                record_outcome(&service, "commit_failed");
                error!(service = %service, error = %e, "Session commit failed");
                Err(DbError::TransactionFailed(e.to_string()))
            }
        }
    }

    /// Roll back. Failures are logged; the connection is released either way.
    pub async fn rollback(self) {
        let Session {
            tx,
            service,
            started,
        } = self;

        record_outcome(&service, "rollback");
        match tx.rollback().await {
            Ok(()) => debug!(
                service = %service,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Session rolled back"
            ),
            Err(e) => warn!(service = %service, error = %e, "Session rollback failed"),
        }
    }
}
