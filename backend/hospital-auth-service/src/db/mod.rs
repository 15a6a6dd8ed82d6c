pub mod token_revocation;
pub mod users;

use db_pool::Database;

/// Apply pending schema migrations. Runs once at startup before serving.
pub async fn run_migrations(db: &Database) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(db.pool()).await
}
