/// Route table. Each resource is registered together with the guard
/// policy it requires.
use actix_middleware::AuthGuard;
use actix_web::{error::InternalError, web, HttpResponse, ResponseError};
use jwt_security::TokenManager;
use std::sync::Arc;

use crate::error::AuthError;
use crate::handlers::{auth, health, password};
use crate::metrics::metrics_handler;

pub fn configure(cfg: &mut web::ServiceConfig, tokens: Arc<TokenManager>) {
    // Malformed bodies and path ids answer with the same JSON error shape
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let response = AuthError::Validation(err.to_string()).error_response();
        InternalError::from_response(err, response).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        let response = AuthError::Validation(err.to_string()).error_response();
        InternalError::from_response(err, response).into()
    }))
    .route("/health", web::get().to(health::health))
    .route("/metrics", web::get().to(metrics_handler))
    .service(
        web::scope("/api")
            .route("/health", web::get().to(health::health))
            .service(
                web::resource("/info")
                    .wrap(AuthGuard::optional(tokens.clone()))
                    .route(web::get().to(health::info)),
            )
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(auth::login))
                    .route("/refresh", web::post().to(auth::refresh_token))
                    .service(
                        web::resource("/logout")
                            .wrap(AuthGuard::authenticated(tokens.clone()))
                            .route(web::post().to(auth::logout)),
                    )
                    .service(
                        web::resource("/profile")
                            .wrap(AuthGuard::authenticated(tokens.clone()))
                            .route(web::get().to(auth::profile))
                            .route(web::put().to(auth::update_profile)),
                    )
                    .service(
                        web::resource("/register")
                            .wrap(AuthGuard::admin_only(tokens.clone()))
                            .route(web::post().to(auth::register)),
                    )
                    .service(
                        web::scope("/users")
                            .wrap(AuthGuard::admin_only(tokens.clone()))
                            .route("/{id}/role", web::put().to(auth::set_role))
                            .route("/{id}/deactivate", web::post().to(auth::deactivate)),
                    ),
            )
            .service(
                web::scope("/password")
                    .service(
                        web::resource("/change")
                            .wrap(AuthGuard::authenticated(tokens.clone()))
                            .route(web::post().to(password::change_password)),
                    )
                    .service(
                        web::resource("/expiry")
                            .wrap(AuthGuard::authenticated(tokens.clone()))
                            .route(web::get().to(password::password_expiry)),
                    )
                    .service(
                        web::resource("/force-change/{id}")
                            .wrap(AuthGuard::admin_only(tokens.clone()))
                            .route(web::post().to(password::force_password_change)),
                    )
                    .service(
                        web::resource("/reset-expiry/{id}")
                            .wrap(AuthGuard::admin_only(tokens))
                            .route(web::post().to(password::reset_password_expiry)),
                    ),
            ),
    )
    .default_service(web::to(not_found));
}

async fn not_found() -> Result<HttpResponse, AuthError> {
    Err(AuthError::NotFound("Resource".to_string()))
}
