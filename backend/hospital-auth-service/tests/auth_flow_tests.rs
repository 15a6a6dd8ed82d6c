//! End-to-end HTTP tests: login, guarded routes, refresh rotation, logout
//! and health, against a throwaway SQLite database.

use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::{header, StatusCode},
    test, web, App,
};
use actix_middleware::{MetricsMiddleware, RequestLogging};
use chrono::{Duration, Utc};
use db_pool::{create_pool, Database, DbConfig};
use hospital_auth_service::{
    config::BootstrapAdmin, db::run_migrations, routes, security::PasswordHasher,
    services::AuthService, AppState,
};
use jwt_security::{Role, SigningSecret, TokenKind, TokenManager};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

const SECRET: &str = "y9K$mP2vRx#TnZ@s4Yw!cGf7Dh&e3Xa6Wq8Lj5BtNu1Zp0MkYhVgCxFbAsSdQwEr";
const ADMIN_PASSWORD: &str = "AdminPass2024";
const STAFF_PASSWORD: &str = "StaffPass2024";

struct TestServer {
    _dir: TempDir,
    db: Database,
    tokens: Arc<TokenManager>,
    state: web::Data<AppState>,
}

async fn test_server() -> TestServer {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = create_pool(DbConfig {
        service_name: "auth-flow-test".to_string(),
        database_url: format!("sqlite://{}", dir.path().join("flow.db").display()),
        pool_size: 2,
        max_overflow: 2,
        acquire_timeout_secs: 2,
        ping_timeout_secs: 1,
        ..DbConfig::default()
    })
    .await
    .expect("test pool");
    run_migrations(&db).await.expect("migrations");

    let tokens = Arc::new(
        TokenManager::new(
            &SigningSecret::new(SECRET),
            Duration::minutes(30),
            Duration::days(7),
        )
        .expect("token manager"),
    );
    let hasher = PasswordHasher::new(argon2::Params::MIN_M_COST, 1, 1).expect("hasher");
    let auth = AuthService::new(db.clone(), Arc::clone(&tokens), hasher, Duration::days(90));

    let admin = BootstrapAdmin {
        username: "admin".to_string(),
        email: "admin@hospital.local".to_string(),
        password: ADMIN_PASSWORD.to_string(),
    };
    auth.bootstrap_admin(&admin, Utc::now())
        .await
        .expect("bootstrap admin");

    TestServer {
        _dir: dir,
        db: db.clone(),
        tokens,
        state: web::Data::new(AppState { auth, db }),
    }
}

macro_rules! init_app {
    ($server:expr) => {{
        let tokens = Arc::clone(&$server.tokens);
        test::init_service(
            App::new()
                .app_data($server.state.clone())
                .wrap(MetricsMiddleware)
                .wrap(RequestLogging)
                .configure(move |cfg| routes::configure(cfg, tokens)),
        )
        .await
    }};
}

/// Call the app and decode the JSON body, whether the response came from a
/// handler or from a guard rejection.
async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match test::try_call_service(app, req).await {
        Ok(res) => {
            let status = res.status();
            let bytes = test::read_body(res).await;
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
        Err(err) => {
            let res = err.error_response();
            let status = res.status();
            let bytes = actix_web::body::to_bytes(res.into_body())
                .await
                .unwrap_or_default();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
    }
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

async fn login<S, B>(app: &S, username: &str, password: &str) -> Value
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": username, "password": password }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK, "login as {} failed: {}", username, body);
    body
}

async fn register_staff<S, B>(app: &S, admin_token: &str, username: &str, role: Role) -> Value
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .insert_header(bearer(admin_token))
        .set_json(json!({
            "username": username,
            "email": format!("{}@hospital.local", username),
            "password": STAFF_PASSWORD,
            "role": role,
            "first_name": "Staff",
            "last_name": username,
        }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "register {} failed: {}", username, body);
    body
}

fn token(body: &Value, field: &str) -> String {
    body[field].as_str().expect("token field").to_string()
}

#[actix_web::test]
async fn test_doctor_login_and_route_authorization() {
    let server = test_server().await;
    let app = init_app!(server);

    let admin = login(&app, "admin", ADMIN_PASSWORD).await;
    let admin_token = token(&admin, "access_token");
    register_staff(&app, &admin_token, "dr.house", Role::Doctor).await;

    let doctor = login(&app, "dr.house", STAFF_PASSWORD).await;
    assert_eq!(doctor["token_type"], "bearer");
    assert_eq!(doctor["user"]["role"], "doctor");
    let doctor_token = token(&doctor, "access_token");

    // Admin-only route
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .insert_header(bearer(&doctor_token))
        .set_json(json!({}))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");

    // Any authenticated role
    let req = test::TestRequest::get()
        .uri("/api/auth/profile")
        .insert_header(bearer(&doctor_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "dr.house");

    // No credentials
    let req = test::TestRequest::get().uri("/api/auth/profile").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHENTICATED");
}

#[actix_web::test]
async fn test_login_failures_share_one_response() {
    let server = test_server().await;
    let app = init_app!(server);

    let admin = login(&app, "admin", ADMIN_PASSWORD).await;
    let admin_token = token(&admin, "access_token");
    let retired = register_staff(&app, &admin_token, "retired", Role::Nurse).await;

    let req = test::TestRequest::post()
        .uri(&format!(
            "/api/auth/users/{}/deactivate",
            retired["id"].as_str().unwrap()
        ))
        .insert_header(bearer(&admin_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let mut bodies = Vec::new();
    for (username, password) in [
        ("nobody", STAFF_PASSWORD),
        ("admin", "WrongPass2024"),
        ("retired", STAFF_PASSWORD),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "username": username, "password": password }))
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        bodies.push(body);
    }

    assert_eq!(bodies[0]["error"], "INVALID_CREDENTIALS");
    assert!(bodies.iter().all(|body| *body == bodies[0]));
}

#[actix_web::test]
async fn test_refresh_rejects_expired_and_wrong_kind() {
    let server = test_server().await;
    let app = init_app!(server);

    let admin = login(&app, "admin", ADMIN_PASSWORD).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({ "refresh_token": token(&admin, "access_token") }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "WRONG_TOKEN_KIND");

    let subject = admin["user"]["id"].as_str().unwrap().parse().unwrap();
    let stale = server
        .tokens
        .issue(
            subject,
            Role::Admin,
            TokenKind::Refresh,
            Utc::now() - Duration::days(8),
        )
        .unwrap();
    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({ "refresh_token": stale.token }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "TOKEN_EXPIRED");
}

#[actix_web::test]
async fn test_role_change_applies_on_refresh() {
    let server = test_server().await;
    let app = init_app!(server);

    let admin = login(&app, "admin", ADMIN_PASSWORD).await;
    let admin_token = token(&admin, "access_token");
    let staff = register_staff(&app, &admin_token, "dr.ross", Role::Doctor).await;
    let session = login(&app, "dr.ross", STAFF_PASSWORD).await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/auth/users/{}/role", staff["id"].as_str().unwrap()))
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "role": "nurse" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "nurse");

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({ "refresh_token": token(&session, "refresh_token") }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let access = server
        .tokens
        .verify(&token(&body, "access_token"), Utc::now(), TokenKind::Access)
        .unwrap();
    assert_eq!(access.role, Role::Nurse);
}

#[actix_web::test]
async fn test_logout_revokes_refresh_token() {
    let server = test_server().await;
    let app = init_app!(server);

    let session = login(&app, "admin", ADMIN_PASSWORD).await;
    let refresh = token(&session, "refresh_token");

    let req = test::TestRequest::post()
        .uri("/api/auth/logout")
        .insert_header(bearer(&token(&session, "access_token")))
        .set_json(json!({ "refresh_token": refresh }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({ "refresh_token": refresh }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "TOKEN_REVOKED");

    // Logout without a body still succeeds
    let req = test::TestRequest::post()
        .uri("/api/auth/logout")
        .insert_header(bearer(&token(&session, "access_token")))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn test_password_expiry_endpoints() {
    let server = test_server().await;
    let app = init_app!(server);

    let admin = login(&app, "admin", ADMIN_PASSWORD).await;
    let admin_token = token(&admin, "access_token");
    let staff = register_staff(&app, &admin_token, "front.desk", Role::Receptionist).await;
    let staff_id = staff["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/password/force-change/{}", staff_id))
        .insert_header(bearer(&admin_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let session = login(&app, "front.desk", STAFF_PASSWORD).await;
    assert_eq!(session["password_change_required"], true);
    let staff_token = token(&session, "access_token");

    let req = test::TestRequest::get()
        .uri("/api/auth/profile")
        .insert_header(bearer(&staff_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "PASSWORD_CHANGE_REQUIRED");

    let req = test::TestRequest::post()
        .uri("/api/password/change")
        .insert_header(bearer(&staff_token))
        .set_json(json!({
            "current_password": STAFF_PASSWORD,
            "new_password": "NewDesk2025",
            "confirm_password": "NewDesk2025",
        }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/password/expiry")
        .insert_header(bearer(&staff_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_expired"], false);
    assert_eq!(body["force_change"], false);

    // Receptionists cannot use admin password tools
    let req = test::TestRequest::post()
        .uri(&format!("/api/password/reset-expiry/{}", staff_id))
        .insert_header(bearer(&staff_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_expired_admin_must_change_password_first() {
    let server = test_server().await;
    let app = init_app!(server);

    let admin = login(&app, "admin", ADMIN_PASSWORD).await;
    let admin_token = token(&admin, "access_token");

    sqlx::query("UPDATE users SET password_expires_at = ?1 WHERE username = 'admin'")
        .bind(Utc::now() - Duration::days(1))
        .execute(server.db.pool())
        .await
        .unwrap();

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .insert_header(bearer(&admin_token))
        .set_json(json!({
            "username": "dr.blocked",
            "email": "dr.blocked@hospital.local",
            "password": STAFF_PASSWORD,
            "role": "doctor",
            "first_name": "Staff",
            "last_name": "Blocked",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "PASSWORD_CHANGE_REQUIRED");

    let req = test::TestRequest::get()
        .uri("/api/password/expiry")
        .insert_header(bearer(&admin_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_expired"], true);

    let req = test::TestRequest::post()
        .uri("/api/password/change")
        .insert_header(bearer(&admin_token))
        .set_json(json!({
            "current_password": ADMIN_PASSWORD,
            "new_password": "AdminPass2025",
            "confirm_password": "AdminPass2025",
        }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    register_staff(&app, &admin_token, "dr.unblocked", Role::Doctor).await;
}

#[actix_web::test]
async fn test_update_own_profile() {
    let server = test_server().await;
    let app = init_app!(server);

    let admin = login(&app, "admin", ADMIN_PASSWORD).await;
    register_staff(&app, &token(&admin, "access_token"), "nurse.hathaway", Role::Nurse).await;
    let nurse = login(&app, "nurse.hathaway", STAFF_PASSWORD).await;
    let nurse_token = token(&nurse, "access_token");

    let req = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&nurse_token))
        .set_json(json!({ "first_name": "Carol", "phone": "555-0177" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Carol");
    assert_eq!(body["phone"], "555-0177");
    assert_eq!(body["role"], "nurse");

    // Privileged fields are not accepted
    let req = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&nurse_token))
        .set_json(json!({ "role": "admin" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let req = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&nurse_token))
        .set_json(json!({ "email": "admin@hospital.local" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");

    let req = test::TestRequest::put()
        .uri("/api/auth/profile")
        .set_json(json!({ "first_name": "Anon" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_malformed_requests_get_json_errors() {
    let server = test_server().await;
    let app = init_app!(server);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let admin = login(&app, "admin", ADMIN_PASSWORD).await;
    let req = test::TestRequest::post()
        .uri("/api/password/force-change/not-a-uuid")
        .insert_header(bearer(&token(&admin, "access_token")))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let req = test::TestRequest::get().uri("/api/nowhere").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[actix_web::test]
async fn test_info_with_optional_auth() {
    let server = test_server().await;
    let app = init_app!(server);

    let req = test::TestRequest::get().uri("/api/info").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "hospital-auth-service");
    assert!(body.get("caller").is_none());

    let admin = login(&app, "admin", ADMIN_PASSWORD).await;
    let req = test::TestRequest::get()
        .uri("/api/info")
        .insert_header(bearer(&token(&admin, "access_token")))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["caller"]["role"], "admin");

    // A bad token on an optional route is treated as anonymous
    let req = test::TestRequest::get()
        .uri("/api/info")
        .insert_header(bearer("garbage"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("caller").is_none());
}

#[actix_web::test]
async fn test_health_reports_database_state() {
    let server = test_server().await;
    let app = init_app!(server);

    for uri in ["/health", "/api/health"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "healthy", "database": true }));
    }

    server.db.close().await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "status": "unhealthy", "database": false }));
}

#[actix_web::test]
async fn test_metrics_exposes_http_and_login_counters() {
    let server = test_server().await;
    let app = init_app!(server);

    login(&app, "admin", ADMIN_PASSWORD).await;
    let req = test::TestRequest::get().uri("/api/health").to_request();
    send(&app, req).await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(res).await.to_vec()).unwrap();
    assert!(body.contains("http_requests_total"));
    assert!(body.contains("auth_login_attempts_total"));
}
