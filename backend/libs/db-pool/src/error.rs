use thiserror::Error;

/// Failures surfaced by the session manager.
#[derive(Debug, Error)]
pub enum DbError {
    /// No connection became free within the pool-wait timeout.
    #[error("connection pool exhausted for {service} after waiting {waited_secs}s")]
    PoolExhausted { service: String, waited_secs: u64 },

    #[error("connection pool is closed")]
    PoolClosed,

    /// Commit failed; the transaction was rolled back.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("failed to connect to database: {0}")]
    Connect(String),

    #[error("database error: {0}")]
    Query(#[from] sqlx::Error),
}

impl DbError {
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, DbError::PoolExhausted { .. })
    }
}
