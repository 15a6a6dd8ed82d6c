//! Security-focused guard tests
//! Every protected route must reject missing, forged, expired and
//! wrong-kind credentials before the handler runs.

use actix_middleware::{AuthContext, AuthGuard, ErrorBody, MaybeAuth, RoleRequirement};
use actix_web::{
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test, web, App, HttpResponse,
};
use chrono::{Duration, Utc};
use jwt_security::{Role, SigningSecret, TokenKind, TokenManager};
use std::sync::Arc;
use uuid::Uuid;

const SECRET: &str = "y9K$mP2vRx#TnZ@s4Yw!cGf7Dh&e3Xa6Wq8Lj5BtNu1Zp0MkYhVgCxFbAsSdQwEr";

fn tokens() -> Arc<TokenManager> {
    Arc::new(
        TokenManager::new(
            &SigningSecret::new(SECRET),
            Duration::minutes(30),
            Duration::days(7),
        )
        .expect("token manager"),
    )
}

async fn whoami(ctx: AuthContext) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "subject": ctx.subject,
        "role": ctx.role,
    }))
}

async fn maybe(caller: MaybeAuth) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "authenticated": caller.0.is_some(),
    }))
}

async fn status_of<S, R, B>(app: &S, req: R) -> (StatusCode, Option<ErrorBody>)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
{
    match test::try_call_service(app, req).await {
        Ok(res) => (res.status(), None),
        Err(err) => {
            let res = err.error_response();
            let status = res.status();
            let bytes = actix_web::body::to_bytes(res.into_body())
                .await
                .unwrap_or_default();
            (status, serde_json::from_slice(&bytes).ok())
        }
    }
}

macro_rules! guarded_app {
    ($tokens:expr) => {
        test::init_service(
            App::new()
                .service(
                    web::resource("/admin")
                        .wrap(AuthGuard::admin_only($tokens.clone()))
                        .route(web::get().to(whoami)),
                )
                .service(
                    web::resource("/clinical")
                        .wrap(AuthGuard::require(
                            $tokens.clone(),
                            RoleRequirement::any_of(&[Role::Doctor, Role::Nurse]),
                        ))
                        .route(web::get().to(whoami)),
                )
                .service(
                    web::resource("/anyone")
                        .wrap(AuthGuard::authenticated($tokens.clone()))
                        .route(web::get().to(whoami)),
                )
                .service(
                    web::resource("/info")
                        .wrap(AuthGuard::optional($tokens.clone()))
                        .route(web::get().to(maybe)),
                ),
        )
        .await
    };
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

#[actix_web::test]
async fn test_missing_header_is_unauthenticated() {
    let tokens = tokens();
    let app = guarded_app!(tokens);

    let req = test::TestRequest::get().uri("/anyone").to_request();
    let (status, body) = status_of(&app, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.unwrap().error, "UNAUTHENTICATED");
}

#[actix_web::test]
async fn test_doctor_forbidden_on_admin_route_but_allowed_on_clinical() {
    let tokens = tokens();
    let app = guarded_app!(tokens);
    let subject = Uuid::new_v4();
    let pair = tokens.issue_pair(subject, Role::Doctor, Utc::now()).unwrap();

    let req = test::TestRequest::get()
        .uri("/admin")
        .insert_header(bearer(&pair.access_token))
        .to_request();
    let (status, body) = status_of(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body.unwrap().error, "FORBIDDEN");

    let req = test::TestRequest::get()
        .uri("/clinical")
        .insert_header(bearer(&pair.access_token))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["subject"], subject.to_string());
    assert_eq!(resp["role"], "doctor");
}

#[actix_web::test]
async fn test_admin_passes_every_requirement() {
    let tokens = tokens();
    let app = guarded_app!(tokens);
    let pair = tokens.issue_pair(Uuid::new_v4(), Role::Admin, Utc::now()).unwrap();

    for uri in ["/admin", "/clinical", "/anyone"] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(&pair.access_token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "uri {}", uri);
    }
}

#[actix_web::test]
async fn test_receptionist_rejected_from_clinical_route() {
    let tokens = tokens();
    let app = guarded_app!(tokens);
    let pair = tokens
        .issue_pair(Uuid::new_v4(), Role::Receptionist, Utc::now())
        .unwrap();

    let req = test::TestRequest::get()
        .uri("/clinical")
        .insert_header(bearer(&pair.access_token))
        .to_request();
    let (status, _) = status_of(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_refresh_token_is_not_a_bearer_credential() {
    let tokens = tokens();
    let app = guarded_app!(tokens);
    let pair = tokens.issue_pair(Uuid::new_v4(), Role::Admin, Utc::now()).unwrap();

    let req = test::TestRequest::get()
        .uri("/anyone")
        .insert_header(bearer(&pair.refresh_token))
        .to_request();
    let (status, body) = status_of(&app, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.unwrap().error, "WRONG_TOKEN_KIND");
}

#[actix_web::test]
async fn test_expired_and_forged_tokens_rejected() {
    let tokens = tokens();
    let app = guarded_app!(tokens);

    let expired = tokens
        .issue(
            Uuid::new_v4(),
            Role::Doctor,
            TokenKind::Access,
            Utc::now() - Duration::hours(2),
        )
        .unwrap();
    let req = test::TestRequest::get()
        .uri("/clinical")
        .insert_header(bearer(&expired.token))
        .to_request();
    let (status, body) = status_of(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.unwrap().error, "TOKEN_EXPIRED");

    let foreign = TokenManager::new(
        &SigningSecret::new("Qw8#Lp2$Zx7!Nv4@Rt6%Hy1^Jk9&Bm3*Cd5(Fg0)Ps2_Vu8+Ea4=Wi6~Ko1?Ml7"),
        Duration::minutes(30),
        Duration::days(7),
    )
    .unwrap();
    let forged = foreign
        .issue(Uuid::new_v4(), Role::Admin, TokenKind::Access, Utc::now())
        .unwrap();
    let req = test::TestRequest::get()
        .uri("/admin")
        .insert_header(bearer(&forged.token))
        .to_request();
    let (status, body) = status_of(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.unwrap().error, "INVALID_SIGNATURE");
}

#[actix_web::test]
async fn test_optional_auth_passes_through() {
    let tokens = tokens();
    let app = guarded_app!(tokens);
    let pair = tokens.issue_pair(Uuid::new_v4(), Role::Nurse, Utc::now()).unwrap();

    let req = test::TestRequest::get().uri("/info").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["authenticated"], false);

    let req = test::TestRequest::get()
        .uri("/info")
        .insert_header(("Authorization", "Bearer not-a-token"))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["authenticated"], false);

    let req = test::TestRequest::get()
        .uri("/info")
        .insert_header(bearer(&pair.access_token))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["authenticated"], true);
}
