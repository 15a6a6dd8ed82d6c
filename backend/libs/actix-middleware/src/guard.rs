//! Request authentication and role checks
//!
//! Each route is registered with a [`RoutePolicy`]. [`guard`] is the single
//! place where a policy is evaluated against a request's headers:
//!
//! ```text
//! Unauthenticated -> TokenPresent -> Authenticated{subject, role} -> Authorized | Forbidden
//! ```

use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use chrono::{DateTime, Utc};
use jwt_security::{Role, TokenKind, TokenManager, VerifiedToken};
use uuid::Uuid;

use crate::error::GuardError;

/// Verified caller identity attached to one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub subject: Uuid,
    pub role: Role,
}

impl From<VerifiedToken> for AuthContext {
    fn from(token: VerifiedToken) -> Self {
        Self {
            subject: token.subject,
            role: token.role,
        }
    }
}

/// Role requirement declared by an endpoint.
///
/// Admin satisfies every requirement; `AdminOnly` admits nobody else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Any authenticated caller
    AnyRole,
    AnyOf(Vec<Role>),
    AdminOnly,
}

impl RoleRequirement {
    pub fn one(role: Role) -> Self {
        match role {
            Role::Admin => RoleRequirement::AdminOnly,
            other => RoleRequirement::AnyOf(vec![other]),
        }
    }

    pub fn any_of(roles: &[Role]) -> Self {
        RoleRequirement::AnyOf(roles.to_vec())
    }

    pub fn is_satisfied_by(&self, role: Role) -> bool {
        match self {
            RoleRequirement::AnyRole => true,
            RoleRequirement::AdminOnly => role == Role::Admin,
            RoleRequirement::AnyOf(roles) => role == Role::Admin || roles.contains(&role),
        }
    }
}

/// How the guard treats a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePolicy {
    /// Guard is skipped entirely
    Public,
    /// Context is attached when a valid access token is present; never rejects
    OptionalAuth,
    Authenticated(RoleRequirement),
}

impl RoutePolicy {
    pub fn label(&self) -> &'static str {
        match self {
            RoutePolicy::Public => "public",
            RoutePolicy::OptionalAuth => "optional",
            RoutePolicy::Authenticated(RoleRequirement::AnyRole) => "authenticated",
            RoutePolicy::Authenticated(RoleRequirement::AnyOf(_)) => "roles",
            RoutePolicy::Authenticated(RoleRequirement::AdminOnly) => "admin",
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GuardError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(GuardError::Unauthenticated)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(GuardError::Unauthenticated)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer")
        || token.is_empty()
        || token.contains(char::is_whitespace)
    {
        return Err(GuardError::Unauthenticated);
    }

    Ok(token)
}

/// Resolve the caller from the bearer token, which must be an access token.
pub fn authenticate_request(
    headers: &HeaderMap,
    tokens: &TokenManager,
    now: DateTime<Utc>,
) -> Result<AuthContext, GuardError> {
    let token = bearer_token(headers)?;
    let verified = tokens.verify(token, now, TokenKind::Access)?;
    Ok(verified.into())
}

pub fn require_role(ctx: &AuthContext, requirement: &RoleRequirement) -> Result<(), GuardError> {
    if requirement.is_satisfied_by(ctx.role) {
        Ok(())
    } else {
        Err(GuardError::Forbidden)
    }
}

/// Evaluate `policy` for a request. `Ok(None)` means the request proceeds
/// without an identity.
pub fn guard(
    headers: &HeaderMap,
    tokens: &TokenManager,
    now: DateTime<Utc>,
    policy: &RoutePolicy,
) -> Result<Option<AuthContext>, GuardError> {
    match policy {
        RoutePolicy::Public => Ok(None),
        RoutePolicy::OptionalAuth => Ok(authenticate_request(headers, tokens, now).ok()),
        RoutePolicy::Authenticated(requirement) => {
            let ctx = authenticate_request(headers, tokens, now)?;
            require_role(&ctx, requirement)?;
            Ok(Some(ctx))
        }
    }
}
