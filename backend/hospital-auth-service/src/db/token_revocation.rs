/// Token revocation database operations
use crate::error::AuthResult;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Why a refresh token left circulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    /// Exchanged for a new pair at refresh
    Rotated,
    Logout,
}

impl RevocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationReason::Rotated => "rotated",
            RevocationReason::Logout => "logout",
        }
    }
}

/// Record a revoked jti until `expires_at` (unix seconds).
///
/// Returns false when the jti was already revoked.
pub async fn revoke_jti(
    conn: &mut SqliteConnection,
    jti: &str,
    user_id: Uuid,
    reason: RevocationReason,
    expires_at: i64,
    now: DateTime<Utc>,
) -> AuthResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO token_revocations (jti, user_id, reason, expires_at, revoked_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT (jti) DO NOTHING
        "#,
    )
    .bind(jti)
    .bind(user_id)
    .bind(reason.as_str())
    .bind(expires_at)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Check if a token (by JTI) is revoked
pub async fn is_jti_revoked(
    conn: &mut SqliteConnection,
    jti: &str,
    now: DateTime<Utc>,
) -> AuthResult<bool> {
    let revoked = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM token_revocations WHERE jti = ?1 AND expires_at > ?2)",
    )
    .bind(jti)
    .bind(now.timestamp())
    .fetch_one(conn)
    .await?;

    Ok(revoked)
}

/// Delete revocation records whose token has expired anyway
pub async fn cleanup_expired_revocations(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> AuthResult<u64> {
    let result = sqlx::query("DELETE FROM token_revocations WHERE expires_at <= ?1")
        .bind(now.timestamp())
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
