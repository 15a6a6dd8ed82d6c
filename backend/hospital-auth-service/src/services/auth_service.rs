use actix_middleware::AuthContext;
use chrono::{DateTime, Duration, Utc};
use db_pool::Database;
use jwt_security::{Role, TokenKind, TokenManager, TokenPair};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::BootstrapAdmin;
use crate::db::token_revocation::{self, RevocationReason};
use crate::db::users;
use crate::error::{AuthError, AuthResult};
use crate::metrics::{record_login, record_refresh, record_revocation};
use crate::models::{
    ChangePasswordRequest, LoginRequest, LoginResponse, NewUser, PasswordExpiryResponse,
    ProfileChanges, RegisterRequest, UpdateProfileRequest, User, UserProfile,
};
use crate::security::{validate_password_strength, PasswordHasher};

/// Credential checks, token lifecycle and account administration.
///
/// Every method takes `now` explicitly; handlers pass the wall clock.
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    tokens: Arc<TokenManager>,
    hasher: PasswordHasher,
    password_expiry: Duration,
}

impl AuthService {
    pub fn new(
        db: Database,
        tokens: Arc<TokenManager>,
        hasher: PasswordHasher,
        password_expiry: Duration,
    ) -> Self {
        Self {
            db,
            tokens,
            hasher,
            password_expiry,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Exchange credentials for a token pair.
    ///
    /// Unknown identifier, wrong password and inactive account are
    /// indistinguishable to the caller.
    pub async fn login(&self, req: LoginRequest, now: DateTime<Utc>) -> AuthResult<LoginResponse> {
        req.validate()?;

        let identifier = req.identifier.trim().to_string();
        let user = self
            .db
            .with_session(move |s| {
                Box::pin(async move { users::find_by_identifier(s.conn(), &identifier).await })
            })
            .await?;

        let user = match user {
            Some(user) => user,
            None => {
                self.hasher.verify_dummy(req.password).await;
                record_login("invalid_credentials");
                debug!("Login failed: identifier matched no account");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let password_ok = self
            .hasher
            .verify_async(req.password, user.password_hash.clone())
            .await;
        if !password_ok || !user.is_active {
            record_login("invalid_credentials");
            warn!(
                user_id = %user.id,
                inactive = !user.is_active,
                "Login rejected"
            );
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.tokens.issue_pair(user.id, user.role, now)?;
        record_login("success");
        info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok(LoginResponse {
            tokens,
            user: UserProfile::from(&user),
            password_change_required: user.requires_password_change(now),
        })
    }

    /// Trade a refresh token for a new pair.
    ///
    /// The presented token is single-use: its jti is revoked in the same
    /// transaction that reloads the account. The new pair carries the role
    /// currently stored for the user, not the role inside the old token.
    pub async fn refresh(&self, refresh_token: &str, now: DateTime<Utc>) -> AuthResult<TokenPair> {
        let verified = self
            .tokens
            .verify(refresh_token, now, TokenKind::Refresh)
            .map_err(|failure| {
                record_refresh(failure.code());
                AuthError::from(failure)
            })?;

        let tokens = Arc::clone(&self.tokens);
        let presented_role = verified.role;
        let result = self
            .db
            .with_session(move |s| {
                Box::pin(async move {
                    if token_revocation::is_jti_revoked(s.conn(), &verified.jti, now).await? {
                        return Err(AuthError::TokenRevoked);
                    }

                    let user = users::find_by_id(s.conn(), verified.subject)
                        .await?
                        .filter(|user| user.is_active)
                        .ok_or(AuthError::Unauthenticated)?;

                    let rotated = token_revocation::revoke_jti(
                        s.conn(),
                        &verified.jti,
                        user.id,
                        RevocationReason::Rotated,
                        verified.expires_at,
                        now,
                    )
                    .await?;
                    if !rotated {
                        return Err(AuthError::TokenRevoked);
                    }

                    let pair = tokens.issue_pair(user.id, user.role, now)?;
                    Ok::<_, AuthError>((user.id, user.role, pair))
                })
            })
            .await;

        match result {
            Ok((user_id, role, pair)) => {
                record_refresh("success");
                record_revocation(RevocationReason::Rotated.as_str());
                if role != presented_role {
                    info!(
                        user_id = %user_id,
                        previous_role = %presented_role,
                        role = %role,
                        "Role changed since last issue; refreshed with current role"
                    );
                }
                Ok(pair)
            }
            Err(err) => {
                record_refresh(err.code());
                if matches!(err, AuthError::TokenRevoked) {
                    warn!("Revoked refresh token presented");
                }
                Err(err)
            }
        }
    }

    /// Revoke the caller's refresh token when one is supplied.
    ///
    /// Always succeeds for an authenticated caller: a missing, unusable or
    /// foreign refresh token is ignored.
    pub async fn logout(
        &self,
        ctx: AuthContext,
        refresh_token: Option<String>,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        let Some(token) = refresh_token else {
            info!(user_id = %ctx.subject, "User logged out");
            return Ok(());
        };

        match self.tokens.verify(&token, now, TokenKind::Refresh) {
            Ok(verified) if verified.subject == ctx.subject => {
                let revoked = self
                    .db
                    .with_session(move |s| {
                        Box::pin(async move {
                            let purged =
                                token_revocation::cleanup_expired_revocations(s.conn(), now)
                                    .await?;
                            if purged > 0 {
                                debug!(purged, "Purged expired token revocations");
                            }

                            token_revocation::revoke_jti(
                                s.conn(),
                                &verified.jti,
                                verified.subject,
                                RevocationReason::Logout,
                                verified.expires_at,
                                now,
                            )
                            .await
                        })
                    })
                    .await?;

                if revoked {
                    record_revocation(RevocationReason::Logout.as_str());
                }
            }
            Ok(_) => warn!(
                user_id = %ctx.subject,
                "Logout presented a refresh token of another subject; ignored"
            ),
            Err(failure) => debug!(
                user_id = %ctx.subject,
                reason = failure.code(),
                "Logout presented an unusable refresh token; ignored"
            ),
        }

        info!(user_id = %ctx.subject, "User logged out");
        Ok(())
    }

    /// Create a staff account. Caller must be an administrator.
    pub async fn register(
        &self,
        admin: AuthContext,
        req: RegisterRequest,
        now: DateTime<Utc>,
    ) -> AuthResult<UserProfile> {
        self.load_cleared_user(admin.subject, now).await?;
        req.validate()?;
        validate_password_strength(&req.password)?;

        let password_hash = self.hasher.hash_async(req.password).await?;
        let user = NewUser {
            username: req.username.trim().to_string(),
            email: req.email.trim().to_string(),
            password_hash,
            role: req.role,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
        }
        .into_user(now, self.password_expiry);

        let user = self.create_user(user).await?;
        info!(
            admin_id = %admin.subject,
            user_id = %user.id,
            role = %user.role,
            "User registered"
        );

        Ok(UserProfile::from(&user))
    }

    async fn create_user(&self, user: User) -> AuthResult<User> {
        self.db
            .with_session(move |s| {
                Box::pin(async move {
                    if users::username_or_email_exists(s.conn(), &user.username, &user.email)
                        .await?
                    {
                        return Err(AuthError::Conflict(
                            "Username or email already exists".to_string(),
                        ));
                    }
                    users::insert_user(s.conn(), &user).await?;
                    Ok::<_, AuthError>(user)
                })
            })
            .await
    }

    /// Current account of the caller. Refused while a password change is
    /// pending.
    pub async fn profile(&self, ctx: AuthContext, now: DateTime<Utc>) -> AuthResult<UserProfile> {
        let user = self.load_cleared_user(ctx.subject, now).await?;
        Ok(UserProfile::from(&user))
    }

    /// Update the caller's own contact details.
    pub async fn update_profile(
        &self,
        ctx: AuthContext,
        req: UpdateProfileRequest,
        now: DateTime<Utc>,
    ) -> AuthResult<UserProfile> {
        req.validate()?;
        let user_id = self.load_cleared_user(ctx.subject, now).await?.id;
        let changes = ProfileChanges::from(req);

        let user = self
            .db
            .with_session(move |s| {
                Box::pin(async move {
                    if let Some(email) = &changes.email {
                        if users::email_taken_by_other(s.conn(), email, user_id).await? {
                            return Err(AuthError::Conflict("Email already in use".to_string()));
                        }
                    }
                    if !users::update_contact_details(s.conn(), user_id, &changes, now).await? {
                        return Err(AuthError::NotFound("User".to_string()));
                    }
                    users::find_by_id(s.conn(), user_id)
                        .await?
                        .ok_or_else(|| AuthError::NotFound("User".to_string()))
                })
            })
            .await?;

        info!(user_id = %user.id, "Profile updated");
        Ok(UserProfile::from(&user))
    }

    pub async fn change_password(
        &self,
        ctx: AuthContext,
        req: ChangePasswordRequest,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        req.validate()?;
        if req.new_password != req.confirm_password {
            return Err(AuthError::Validation(
                "New password and confirmation do not match".to_string(),
            ));
        }
        if req.new_password == req.current_password {
            return Err(AuthError::Validation(
                "New password must differ from the current password".to_string(),
            ));
        }
        validate_password_strength(&req.new_password)?;

        let user = self.load_active_user(ctx.subject).await?;
        let current_ok = self
            .hasher
            .verify_async(req.current_password, user.password_hash.clone())
            .await;
        if !current_ok {
            warn!(user_id = %user.id, "Password change with wrong current password");
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = self.hasher.hash_async(req.new_password).await?;
        let expires_at = now + self.password_expiry;
        let user_id = user.id;
        let updated = self
            .db
            .with_session(move |s| {
                Box::pin(async move {
                    users::update_password(s.conn(), user_id, &password_hash, now, expires_at)
                        .await
                })
            })
            .await?;
        if !updated {
            return Err(AuthError::NotFound("User".to_string()));
        }

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub async fn password_expiry(
        &self,
        ctx: AuthContext,
        now: DateTime<Utc>,
    ) -> AuthResult<PasswordExpiryResponse> {
        let user = self.load_active_user(ctx.subject).await?;
        Ok(PasswordExpiryResponse::for_user(&user, now))
    }

    pub async fn force_password_change(
        &self,
        admin: AuthContext,
        target: Uuid,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        self.load_cleared_user(admin.subject, now).await?;
        let updated = self
            .db
            .with_session(move |s| {
                Box::pin(async move {
                    users::set_force_password_change(s.conn(), target, true, now).await
                })
            })
            .await?;
        if !updated {
            return Err(AuthError::NotFound("User".to_string()));
        }

        info!(admin_id = %admin.subject, user_id = %target, "Password change forced");
        Ok(())
    }

    /// Restart the target's expiry window and lift a forced change;
    /// returns the new expiry.
    pub async fn reset_password_expiry(
        &self,
        admin: AuthContext,
        target: Uuid,
        now: DateTime<Utc>,
    ) -> AuthResult<DateTime<Utc>> {
        self.load_cleared_user(admin.subject, now).await?;
        let expires_at = now + self.password_expiry;
        let updated = self
            .db
            .with_session(move |s| {
                Box::pin(async move {
                    users::reset_password_expiry(s.conn(), target, expires_at, now).await
                })
            })
            .await?;
        if !updated {
            return Err(AuthError::NotFound("User".to_string()));
        }

        info!(admin_id = %admin.subject, user_id = %target, "Password expiry reset");
        Ok(expires_at)
    }

    /// Change a user's role. Outstanding access tokens keep the old role
    /// until they expire; the next refresh picks up the new one.
    pub async fn set_role(
        &self,
        admin: AuthContext,
        target: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> AuthResult<UserProfile> {
        if target == admin.subject && role != Role::Admin {
            return Err(AuthError::Validation(
                "Administrators cannot remove their own admin role".to_string(),
            ));
        }
        self.load_cleared_user(admin.subject, now).await?;

        let user = self
            .db
            .with_session(move |s| {
                Box::pin(async move {
                    if !users::set_role(s.conn(), target, role, now).await? {
                        return Err(AuthError::NotFound("User".to_string()));
                    }
                    users::find_by_id(s.conn(), target)
                        .await?
                        .ok_or_else(|| AuthError::NotFound("User".to_string()))
                })
            })
            .await?;

        info!(admin_id = %admin.subject, user_id = %target, role = %role, "User role changed");
        Ok(UserProfile::from(&user))
    }

    pub async fn deactivate(
        &self,
        admin: AuthContext,
        target: Uuid,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        if target == admin.subject {
            return Err(AuthError::Validation(
                "Administrators cannot deactivate their own account".to_string(),
            ));
        }
        self.load_cleared_user(admin.subject, now).await?;

        let updated = self
            .db
            .with_session(move |s| {
                Box::pin(async move { users::deactivate(s.conn(), target, now).await })
            })
            .await?;
        if !updated {
            return Err(AuthError::NotFound("User".to_string()));
        }

        info!(admin_id = %admin.subject, user_id = %target, "User deactivated");
        Ok(())
    }

    /// Create the first administrator when no account exists yet.
    ///
    /// Returns whether an account was created.
    pub async fn bootstrap_admin(
        &self,
        admin: &BootstrapAdmin,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        validate_password_strength(&admin.password)?;

        let existing = self
            .db
            .with_session(|s| Box::pin(async move { users::count_users(s.conn()).await }))
            .await?;
        if existing > 0 {
            debug!(existing, "Users present; skipping admin bootstrap");
            return Ok(false);
        }

        let password_hash = self.hasher.hash_async(admin.password.clone()).await?;
        let user = NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash,
            role: Role::Admin,
            first_name: "System".to_string(),
            last_name: "Administrator".to_string(),
            phone: None,
        }
        .into_user(now, self.password_expiry);

        let user = self.create_user(user).await?;
        info!(user_id = %user.id, username = %user.username, "Bootstrap administrator created");
        Ok(true)
    }

    async fn load_active_user(&self, user_id: Uuid) -> AuthResult<User> {
        let user = self
            .db
            .with_session(move |s| {
                Box::pin(async move { users::find_by_id(s.conn(), user_id).await })
            })
            .await?;

        user.filter(|user| user.is_active)
            .ok_or(AuthError::Unauthenticated)
    }

    /// Active caller with no pending password change. Every authenticated
    /// operation except logout and the caller's own password endpoints
    /// goes through here.
    async fn load_cleared_user(&self, user_id: Uuid, now: DateTime<Utc>) -> AuthResult<User> {
        let user = self.load_active_user(user_id).await?;
        if user.requires_password_change(now) {
            debug!(user_id = %user.id, "Request refused until password is changed");
            return Err(AuthError::PasswordChangeRequired);
        }
        Ok(user)
    }
}
