/// User database operations
///
/// Every function runs on the connection of an open session so callers
/// decide the transaction boundary.
use crate::error::AuthResult;
use crate::models::{ProfileChanges, User};
use chrono::{DateTime, Utc};
use jwt_security::Role;
use sqlx::SqliteConnection;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, first_name, last_name, \
     phone, is_active, created_at, updated_at, password_changed_at, password_expires_at, \
     force_password_change";

/// Find a user by username, or by email ignoring case. An exact username
/// match wins over an email match.
pub async fn find_by_identifier(
    conn: &mut SqliteConnection,
    identifier: &str,
) -> AuthResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?1 \
         ORDER BY username = ?1 DESC LIMIT 1"
    ))
    .bind(identifier.trim())
    .fetch_optional(conn)
    .await?;

    Ok(user)
}

pub async fn find_by_id(conn: &mut SqliteConnection, user_id: Uuid) -> AuthResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

    Ok(user)
}

/// Check if username or email is taken. Both values are compared against
/// both columns, since login accepts either as the identifier.
pub async fn username_or_email_exists(
    conn: &mut SqliteConnection,
    username: &str,
    email: &str,
) -> AuthResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users \
         WHERE username = ?1 OR username = ?2 COLLATE NOCASE OR email = ?1 OR email = ?2)",
    )
    .bind(username)
    .bind(email)
    .fetch_one(conn)
    .await?;

    Ok(exists)
}

/// Whether `email` is already an identifier of an account other than
/// `user_id`.
pub async fn email_taken_by_other(
    conn: &mut SqliteConnection,
    email: &str,
    user_id: Uuid,
) -> AuthResult<bool> {
    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE (username = ?1 COLLATE NOCASE OR email = ?1) AND id <> ?2)",
    )
    .bind(email)
    .bind(user_id)
    .fetch_one(conn)
    .await?;

    Ok(taken)
}

pub async fn insert_user(conn: &mut SqliteConnection, user: &User) -> AuthResult<()> {
    sqlx::query(
        r#"
        INSERT INTO users (
            id, username, email, password_hash, role, first_name, last_name, phone,
            is_active, created_at, updated_at, password_changed_at, password_expires_at,
            force_password_change
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone)
    .bind(user.is_active)
    .bind(user.created_at)
    .bind(user.updated_at)
    .bind(user.password_changed_at)
    .bind(user.password_expires_at)
    .bind(user.force_password_change)
    .execute(conn)
    .await?;

    Ok(())
}

/// Store a new password hash, restart the expiry window and clear the
/// forced-change flag.
pub async fn update_password(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    password_hash: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> AuthResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET password_hash = ?2,
            password_changed_at = ?3,
            password_expires_at = ?4,
            force_password_change = 0,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(user_id)
    .bind(password_hash)
    .bind(now)
    .bind(expires_at)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Apply the contact fields that are present; absent fields keep their
/// stored value.
pub async fn update_contact_details(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    changes: &ProfileChanges,
    now: DateTime<Utc>,
) -> AuthResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET first_name = COALESCE(?2, first_name),
            last_name = COALESCE(?3, last_name),
            phone = COALESCE(?4, phone),
            email = COALESCE(?5, email),
            updated_at = ?6
        WHERE id = ?1
        "#,
    )
    .bind(user_id)
    .bind(&changes.first_name)
    .bind(&changes.last_name)
    .bind(&changes.phone)
    .bind(&changes.email)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_role(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    role: Role,
    now: DateTime<Utc>,
) -> AuthResult<bool> {
    let result = sqlx::query("UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(user_id)
        .bind(role.as_str())
        .bind(now)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Soft-deactivate; the row is kept for audit.
pub async fn deactivate(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> AuthResult<bool> {
    let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ?2 WHERE id = ?1")
        .bind(user_id)
        .bind(now)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_force_password_change(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    force: bool,
    now: DateTime<Utc>,
) -> AuthResult<bool> {
    let result = sqlx::query(
        "UPDATE users SET force_password_change = ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(user_id)
    .bind(force)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Restart the expiry window and lift any forced change.
pub async fn reset_password_expiry(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AuthResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET password_expires_at = ?2,
            force_password_change = 0,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(user_id)
    .bind(expires_at)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn count_users(conn: &mut SqliteConnection) -> AuthResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(conn)
        .await?;

    Ok(count)
}
