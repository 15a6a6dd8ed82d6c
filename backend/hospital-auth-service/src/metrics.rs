use actix_web::{HttpResponse, Responder};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, TextEncoder};

/// Handler that serialises Prometheus metrics in text format.
pub async fn metrics_handler() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

// =========================
// Auth flow metrics
// =========================

/// Login attempts by outcome (`success`, `invalid_credentials`, `error`)
static LOGIN_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec!(
        "auth_login_attempts_total",
        "Login attempts by outcome",
        &["outcome"]
    )
    .expect("Prometheus metrics registration should succeed at startup")
});

/// Refresh exchanges by outcome
static TOKEN_REFRESH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec!(
        "auth_token_refresh_total",
        "Refresh token exchanges by outcome",
        &["outcome"]
    )
    .expect("Prometheus metrics registration should succeed at startup")
});

/// Revoked refresh tokens by reason
static TOKEN_REVOCATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec!(
        "auth_token_revocations_total",
        "Refresh tokens revoked by reason",
        &["reason"]
    )
    .expect("Prometheus metrics registration should succeed at startup")
});

pub fn record_login(outcome: &str) {
    LOGIN_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_refresh(outcome: &str) {
    TOKEN_REFRESH_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_revocation(reason: &str) {
    TOKEN_REVOCATIONS_TOTAL.with_label_values(&[reason]).inc();
}
