use thiserror::Error;

use crate::claims::TokenKind;

/// Why a presented token was rejected. Every variant is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is malformed")]
    MalformedToken,

    #[error("token has expired")]
    Expired,

    #[error("expected {expected} token, got {found}")]
    WrongTokenKind {
        expected: TokenKind,
        found: TokenKind,
    },
}

impl VerificationFailure {
    /// Stable machine-readable code for client responses
    pub fn code(&self) -> &'static str {
        match self {
            VerificationFailure::InvalidSignature => "INVALID_SIGNATURE",
            VerificationFailure::MalformedToken => "MALFORMED_TOKEN",
            VerificationFailure::Expired => "TOKEN_EXPIRED",
            VerificationFailure::WrongTokenKind { .. } => "WRONG_TOKEN_KIND",
        }
    }
}

/// Failures while building a token manager or signing a token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret is too weak")]
    WeakSecret,

    #[error("invalid token lifetime: {0}")]
    InvalidTtl(String),

    #[error("failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("failed to generate secret: {0}")]
    SecretGeneration(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);
