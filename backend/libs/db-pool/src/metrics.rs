//! Prometheus metrics for the connection pool and scoped sessions
//!
//! Tracks pool size, session acquisition latency, acquisition errors and
//! how sessions ended.

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use sqlx::SqlitePool;
use std::time::Instant;

lazy_static::lazy_static! {
    /// Database connection pool size by state (idle/active/max)
    static ref DB_POOL_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "db_pool_connections",
        "Database pool connection count by state",
        &["service", "state"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Time to acquire a session from the pool
    static ref DB_SESSION_ACQUIRE_DURATION: HistogramVec = register_histogram_vec!(
        "db_session_acquire_duration_seconds",
        "Time to acquire a session from the pool",
        &["service"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Session acquisition errors by type
    static ref DB_SESSION_ACQUIRE_ERRORS: IntCounterVec = register_int_counter_vec!(
        "db_session_acquire_errors_total",
        "Session acquisition errors",
        &["service", "error_type"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// How scoped sessions ended (commit/rollback/commit_failed)
    static ref DB_SESSION_OUTCOMES: IntCounterVec = register_int_counter_vec!(
        "db_session_outcomes_total",
        "Scoped session outcomes",
        &["service", "outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");
}

/// Update connection pool gauges (called periodically and after acquisition)
pub(crate) fn update_pool_metrics(pool: &SqlitePool, service: &str) {
    let size = pool.size() as i64;
    let idle = pool.num_idle() as i64;

    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "idle"])
        .set(idle);

    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "active"])
        .set(size - idle);

    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "max"])
        .set(pool.options().get_max_connections() as i64);
}

pub(crate) fn record_acquire(service: &str, started: Instant, error: Option<&sqlx::Error>) {
    DB_SESSION_ACQUIRE_DURATION
        .with_label_values(&[service])
        .observe(started.elapsed().as_secs_f64());

    if let Some(e) = error {
        let error_type = match e {
            sqlx::Error::PoolTimedOut => "timeout",
            sqlx::Error::PoolClosed => "closed",
            _ => "other",
        };

        DB_SESSION_ACQUIRE_ERRORS
            .with_label_values(&[service, error_type])
            .inc();
    }
}

pub(crate) fn record_outcome(service: &str, outcome: &str) {
    DB_SESSION_OUTCOMES
        .with_label_values(&[service, outcome])
        .inc();
}
