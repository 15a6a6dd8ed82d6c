//! Token codec for the hospital auth core
//!
//! **Security Features**:
//! - HS256 signing with a strength-checked server secret
//! - Distinct access / refresh token kinds, checked on every verification
//! - JWT ID (jti) on every token so refresh tokens can be revoked
//! - Verification against an explicit clock, no implicit leeway
//!
//! Verification runs in a fixed order and stops at the first failure:
//! signature, claim decoding, expiry, kind.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use tracing::{debug, warn};
use uuid::Uuid;

pub mod claims;
pub mod error;
pub mod secret_validation;

pub use claims::{Claims, IssuedToken, Role, TokenKind, TokenPair, VerifiedToken};
pub use error::{TokenError, UnknownRole, VerificationFailure};
pub use secret_validation::{
    generate_secure_secret, validate_secret_strength, SecretStrength, SigningSecret,
};

pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 30;
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 7;
/// Upper bound for either lifetime; keeps expiry arithmetic in range.
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;
const TOKEN_TYPE_BEARER: &str = "bearer";

/// Issues and verifies signed tokens. Built once at startup and shared
/// read-only (usually behind an `Arc`).
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenManager {
    /// Build a manager from a signing secret and the two lifetimes.
    ///
    /// Fails when the secret is classified as weak or when the refresh
    /// lifetime does not exceed the access lifetime.
    pub fn new(
        secret: &SigningSecret,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, TokenError> {
        match secret.strength() {
            SecretStrength::Weak => return Err(TokenError::WeakSecret),
            SecretStrength::Acceptable => {
                warn!("JWT signing secret is acceptable but below recommended strength")
            }
            SecretStrength::Strong => {}
        }

        if access_ttl <= Duration::zero() {
            return Err(TokenError::InvalidTtl(
                "access token lifetime must be positive".to_string(),
            ));
        }
        if refresh_ttl <= access_ttl {
            return Err(TokenError::InvalidTtl(
                "refresh token lifetime must exceed access token lifetime".to_string(),
            ));
        }
        let max_ttl = Duration::try_days(MAX_TOKEN_TTL_DAYS).unwrap_or(Duration::MAX);
        if refresh_ttl > max_ttl {
            return Err(TokenError::InvalidTtl(format!(
                "token lifetime must not exceed {} days",
                MAX_TOKEN_TTL_DAYS
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `verify`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Sign a single token for `subject` with a fresh jti.
    pub fn issue(
        &self,
        subject: Uuid,
        role: Role,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl(kind))
            .ok_or_else(|| TokenError::InvalidTtl("token expiry is out of range".to_string()))?;
        // Round up so a token never lives shorter than its TTL.
        let exp = if expires_at.timestamp_subsec_nanos() > 0 {
            expires_at.timestamp() + 1
        } else {
            expires_at.timestamp()
        };

        let claims = Claims {
            sub: subject.to_string(),
            role,
            kind,
            iat: now.timestamp(),
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;

        Ok(IssuedToken {
            token,
            jti: claims.jti,
            expires_at: exp,
        })
    }

    /// Issue an access/refresh pair for the same subject and role.
    pub fn issue_pair(
        &self,
        subject: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        let access = self.issue(subject, role, TokenKind::Access, now)?;
        let refresh = self.issue(subject, role, TokenKind::Refresh, now)?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verify `token` at instant `now`, expecting `expected` kind.
    pub fn verify(
        &self,
        token: &str,
        now: DateTime<Utc>,
        expected: TokenKind,
    ) -> Result<VerifiedToken, VerificationFailure> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(classify_decode_error)?;
        let claims = data.claims;

        if claims.jti.trim().is_empty() {
            return Err(VerificationFailure::MalformedToken);
        }
        let subject =
            Uuid::parse_str(&claims.sub).map_err(|_| VerificationFailure::MalformedToken)?;

        if now.timestamp() >= claims.exp {
            return Err(VerificationFailure::Expired);
        }

        if claims.kind != expected {
            debug!(expected = %expected, found = %claims.kind, "token kind mismatch");
            return Err(VerificationFailure::WrongTokenKind {
                expected,
                found: claims.kind,
            });
        }

        Ok(VerifiedToken {
            subject,
            role: claims.role,
            kind: claims.kind,
            jti: claims.jti,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}

fn classify_decode_error(err: jsonwebtoken::errors::Error) -> VerificationFailure {
    match err.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat => VerificationFailure::InvalidSignature,
        ErrorKind::ExpiredSignature => VerificationFailure::Expired,
        _ => VerificationFailure::MalformedToken,
    }
}
