/// Authentication handlers
use actix_middleware::AuthContext;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AuthError,
    models::{
        LoginRequest, LogoutRequest, MessageResponse, RefreshTokenRequest, RegisterRequest,
        UpdateProfileRequest, UpdateRoleRequest,
    },
    AppState,
};

/// POST /api/auth/login
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AuthError> {
    let response = state.auth.login(payload.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// POST /api/auth/refresh
pub async fn refresh_token(
    state: web::Data<AppState>,
    payload: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, AuthError> {
    let pair = state.auth.refresh(&payload.refresh_token, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(pair))
}

/// POST /api/auth/logout
///
/// The body is optional; without a refresh token this only acknowledges.
pub async fn logout(
    state: web::Data<AppState>,
    ctx: AuthContext,
    payload: Option<web::Json<LogoutRequest>>,
) -> Result<HttpResponse, AuthError> {
    let refresh_token = payload.and_then(|body| body.into_inner().refresh_token);
    state.auth.logout(ctx, refresh_token, Utc::now()).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Logged out successfully")))
}

/// POST /api/auth/register (admin)
pub async fn register(
    state: web::Data<AppState>,
    ctx: AuthContext,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AuthError> {
    let profile = state
        .auth
        .register(ctx, payload.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Created().json(profile))
}

/// GET /api/auth/profile
pub async fn profile(
    state: web::Data<AppState>,
    ctx: AuthContext,
) -> Result<HttpResponse, AuthError> {
    let profile = state.auth.profile(ctx, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    state: web::Data<AppState>,
    ctx: AuthContext,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AuthError> {
    let profile = state
        .auth
        .update_profile(ctx, payload.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PUT /api/auth/users/{id}/role (admin)
pub async fn set_role(
    state: web::Data<AppState>,
    ctx: AuthContext,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse, AuthError> {
    let profile = state
        .auth
        .set_role(ctx, path.into_inner(), payload.role, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// POST /api/auth/users/{id}/deactivate (admin)
pub async fn deactivate(
    state: web::Data<AppState>,
    ctx: AuthContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AuthError> {
    state
        .auth
        .deactivate(ctx, path.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("User deactivated")))
}
