/// Staff account model and request/response payloads
use chrono::{DateTime, Duration, Utc};
use jwt_security::{Role, TokenPair};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub password_expires_at: Option<DateTime<Utc>>,
    pub force_password_change: bool,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .field("password_hash", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl User {
    pub fn is_password_expired(&self, now: DateTime<Utc>) -> bool {
        self.password_expires_at
            .map(|expires_at| now >= expires_at)
            .unwrap_or(false)
    }

    /// Whole days left before the password expires; negative once expired.
    pub fn days_until_password_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.password_expires_at
            .map(|expires_at| (expires_at - now).num_days())
    }

    /// Expired or administratively forced
    pub fn requires_password_change(&self, now: DateTime<Utc>) -> bool {
        self.force_password_change || self.is_password_expired(now)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Fields for a new account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl NewUser {
    pub fn into_user(self, now: DateTime<Utc>, password_expiry: Duration) -> User {
        User {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            role: self.role,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            is_active: true,
            created_at: now,
            updated_at: now,
            password_changed_at: Some(now),
            password_expires_at: Some(now + password_expiry),
            force_password_change: false,
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email
    #[serde(alias = "username", alias = "email")]
    #[validate(length(min = 1, max = 255))]
    pub identifier: String,

    #[validate(length(min = 1))]
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    pub password: String,

    pub role: Role,

    #[validate(length(min = 1, max = 100))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100))]
    pub last_name: String,

    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,

    pub new_password: String,

    pub confirm_password: String,
}

impl fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChangePasswordRequest { .. }")
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// Self-service contact update. Role, activation and password fields are
/// not part of this payload and are rejected as unknown.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,

    #[validate(email)]
    pub email: Option<String>,
}

/// Trimmed profile fields to store; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileChanges {
    fn from(req: UpdateProfileRequest) -> Self {
        let trim = |value: Option<String>| value.map(|v| v.trim().to_string());
        Self {
            first_name: trim(req.first_name),
            last_name: trim(req.last_name),
            phone: trim(req.phone),
            email: trim(req.email),
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub password_expires_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            phone: user.phone.clone(),
            is_active: user.is_active,
            created_at: user.created_at,
            password_expires_at: user.password_expires_at,
        }
    }
}

/// Login result: the token pair plus a summary of the account
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserProfile,
    /// Client should route the user to the change-password screen
    pub password_change_required: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordExpiryResponse {
    pub is_expired: bool,
    pub days_until_expiry: Option<i64>,
    pub password_expires_at: Option<DateTime<Utc>>,
    pub force_change: bool,
}

impl PasswordExpiryResponse {
    pub fn for_user(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            is_expired: user.is_password_expired(now),
            days_until_expiry: user.days_until_password_expiry(now),
            password_expires_at: user.password_expires_at,
            force_change: user.force_password_change,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_expiring_at(expires_at: Option<DateTime<Utc>>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "dr.house".into(),
            email: "house@hospital.local".into(),
            password_hash: "$argon2id$v=19$...".into(),
            role: Role::Doctor,
            first_name: "Gregory".into(),
            last_name: "House".into(),
            phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            password_changed_at: Some(now),
            password_expires_at: expires_at,
            force_password_change: false,
        }
    }

    #[test]
    fn test_password_expiry_boundaries() {
        let now = Utc::now();

        let fresh = user_expiring_at(Some(now + Duration::days(10)));
        assert!(!fresh.is_password_expired(now));
        assert_eq!(fresh.days_until_password_expiry(now), Some(10));

        let expired = user_expiring_at(Some(now - Duration::days(1)));
        assert!(expired.is_password_expired(now));
        assert!(expired.requires_password_change(now));

        let at_boundary = user_expiring_at(Some(now));
        assert!(at_boundary.is_password_expired(now));

        let never = user_expiring_at(None);
        assert!(!never.is_password_expired(now));
        assert_eq!(never.days_until_password_expiry(now), None);
    }

    #[test]
    fn test_profile_update_rejects_privileged_fields() {
        for body in [
            r#"{"role": "admin"}"#,
            r#"{"is_active": false}"#,
            r#"{"password_hash": "x"}"#,
        ] {
            assert!(serde_json::from_str::<UpdateProfileRequest>(body).is_err(), "{}", body);
        }

        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"first_name": "  Greg ", "phone": "555-0199"}"#).unwrap();
        assert!(req.validate().is_ok());
        let changes = ProfileChanges::from(req);
        assert_eq!(changes.first_name.as_deref(), Some("Greg"));
        assert!(changes.email.is_none());

        let bad = UpdateProfileRequest {
            email: Some("not-an-email".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_forced_change_requires_change() {
        let now = Utc::now();
        let mut user = user_expiring_at(Some(now + Duration::days(30)));
        assert!(!user.requires_password_change(now));

        user.force_password_change = true;
        assert!(user.requires_password_change(now));
    }

    #[test]
    fn test_debug_redacts_password_material() {
        let user = user_expiring_at(None);
        assert!(!format!("{:?}", user).contains("argon2id"));

        let login = LoginRequest {
            identifier: "dr.house".into(),
            password: "Vicodin123".into(),
        };
        assert!(!format!("{:?}", login).contains("Vicodin123"));
    }

    #[test]
    fn test_login_request_accepts_aliases() {
        for body in [
            r#"{"identifier":"dr.house","password":"x"}"#,
            r#"{"username":"dr.house","password":"x"}"#,
            r#"{"email":"dr.house","password":"x"}"#,
        ] {
            let req: LoginRequest = serde_json::from_str(body).unwrap();
            assert_eq!(req.identifier, "dr.house");
        }
    }

    #[test]
    fn test_register_request_validation() {
        let mut req = RegisterRequest {
            username: "nurse.joy".into(),
            email: "joy@hospital.local".into(),
            password: "Pokecenter1".into(),
            role: Role::Nurse,
            first_name: "Joy".into(),
            last_name: "Kanto".into(),
            phone: None,
        };
        assert!(req.validate().is_ok());

        req.email = "not-an-email".into();
        assert!(req.validate().is_err());

        req.email = "joy@hospital.local".into();
        req.username = "nj".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_unknown_role_rejected_at_deserialization() {
        let body = r#"{"role":"janitor"}"#;
        assert!(serde_json::from_str::<UpdateRoleRequest>(body).is_err());
    }
}
