/// Password lifecycle handlers
use actix_middleware::AuthContext;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AuthError,
    models::{ChangePasswordRequest, MessageResponse},
    AppState,
};

/// POST /api/password/change
pub async fn change_password(
    state: web::Data<AppState>,
    ctx: AuthContext,
    payload: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AuthError> {
    state
        .auth
        .change_password(ctx, payload.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Password changed successfully")))
}

/// GET /api/password/expiry
pub async fn password_expiry(
    state: web::Data<AppState>,
    ctx: AuthContext,
) -> Result<HttpResponse, AuthError> {
    let expiry = state.auth.password_expiry(ctx, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(expiry))
}

/// POST /api/password/force-change/{id} (admin)
pub async fn force_password_change(
    state: web::Data<AppState>,
    ctx: AuthContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AuthError> {
    state
        .auth
        .force_password_change(ctx, path.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "User will be required to change password at next login",
    )))
}

/// POST /api/password/reset-expiry/{id} (admin)
pub async fn reset_password_expiry(
    state: web::Data<AppState>,
    ctx: AuthContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AuthError> {
    let expires_at = state
        .auth
        .reset_password_expiry(ctx, path.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Password expiry reset",
        "password_expires_at": expires_at,
    })))
}
