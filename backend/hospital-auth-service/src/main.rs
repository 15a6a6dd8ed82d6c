/// Hospital Auth Service Main Entry Point
///
/// Starts the HTTP server with:
/// - SQLite connection pool (migrated on startup)
/// - Token manager built from JWT_SECRET
/// - Background database health probe
use actix_middleware::{MetricsMiddleware, RequestLogging};
use actix_web::{web, App, HttpServer};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use db_pool::{create_pool, Database};
use hospital_auth_service::{
    config::Config, db::run_migrations, routes, security::PasswordHasher,
    services::AuthService, AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is normal outside development
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "hospital_auth_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Hospital Auth Service");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    let tokens = Arc::new(
        config
            .token_manager()
            .context("Failed to initialize token manager")?,
    );

    config.database.log_config();
    let db = create_pool(config.database.clone())
        .await
        .context("Failed to initialize database pool")?;

    run_migrations(&db)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations applied");

    if !db.ping().await {
        bail!("Database health check failed at startup");
    }

    let hasher = PasswordHasher::from_config(&config.password)
        .context("Failed to initialize password hasher")?;
    let auth = AuthService::new(
        db.clone(),
        Arc::clone(&tokens),
        hasher,
        config.password.expiry(),
    );

    if let Some(admin) = &config.bootstrap_admin {
        auth.bootstrap_admin(admin, Utc::now())
            .await
            .context("Failed to bootstrap administrator account")?;
    }

    spawn_health_probe(
        db.clone(),
        Duration::from_secs(config.health_interval_secs.max(1)),
    );

    let state = web::Data::new(AppState {
        auth,
        db: db.clone(),
    });

    let bind_address = (config.server.host.clone(), config.server.port);
    info!(host = %bind_address.0, port = bind_address.1, "HTTP server listening");

    HttpServer::new(move || {
        let tokens = Arc::clone(&tokens);
        App::new()
            .app_data(state.clone())
            .wrap(MetricsMiddleware)
            .wrap(RequestLogging)
            .configure(move |cfg| routes::configure(cfg, tokens))
    })
    .bind(bind_address)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")?;

    info!("Shutting down, closing database pool");
    db.close().await;
    info!("Hospital auth service shutdown complete");

    Ok(())
}

/// Periodically ping the database and log transitions between healthy and
/// unhealthy.
fn spawn_health_probe(db: Database, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // First tick fires immediately; startup already pinged.
        interval.tick().await;

        let mut healthy = true;
        loop {
            interval.tick().await;
            let status = db.pool_status();
            match (db.ping().await, healthy) {
                (true, false) => {
                    info!(idle = status.idle, size = status.size, "Database connection recovered");
                    healthy = true;
                }
                (false, true) => {
                    error!(idle = status.idle, size = status.size, "Database health probe failed");
                    healthy = false;
                }
                (false, false) => warn!("Database still unhealthy"),
                (true, true) => {}
            }
        }
    });
}
