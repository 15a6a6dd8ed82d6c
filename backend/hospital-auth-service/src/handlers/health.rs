use actix_middleware::MaybeAuth;
use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::{config::SERVICE_NAME, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
}

/// GET /health and /api/health
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    if state.db.ping().await {
        HttpResponse::Ok().json(HealthResponse {
            status: "healthy",
            database: true,
        })
    } else {
        HttpResponse::ServiceUnavailable().json(HealthResponse {
            status: "unhealthy",
            database: false,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CallerInfo {
    pub subject: uuid::Uuid,
    pub role: jwt_security::Role,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<CallerInfo>,
}

/// GET /api/info. Describes the caller too when a valid access token came
/// along.
pub async fn info(caller: MaybeAuth) -> HttpResponse {
    HttpResponse::Ok().json(InfoResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        caller: caller.0.map(|ctx| CallerInfo {
            subject: ctx.subject,
            role: ctx.role,
        }),
    })
}
