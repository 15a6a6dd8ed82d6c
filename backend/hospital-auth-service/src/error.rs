use actix_middleware::{ErrorBody, GuardError};
use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    HttpResponse,
};
use db_pool::DbError;
use jwt_security::{TokenError, VerificationFailure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown identifier, wrong password and inactive account all map here
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error(transparent)]
    Token(#[from] VerificationFailure),

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient privileges for this resource")]
    Forbidden,

    #[error("Password has expired or must be changed before continuing")]
    PasswordChangeRequired,

    #[error("Service temporarily unavailable, please retry")]
    PoolExhausted,

    #[error("Transaction could not be committed")]
    TransactionFailed,

    #[error("Password does not meet strength requirements: {0}")]
    WeakPassword(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Token(failure) => failure.code(),
            AuthError::TokenRevoked => "TOKEN_REVOKED",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::PasswordChangeRequired => "PASSWORD_CHANGE_REQUIRED",
            AuthError::PoolExhausted => "POOL_EXHAUSTED",
            AuthError::TransactionFailed => "TRANSACTION_FAILED",
            AuthError::WeakPassword(_) => "WEAK_PASSWORD",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::Database(_) | AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing message. Server-side failures never echo their cause.
    fn public_message(&self) -> String {
        match self {
            AuthError::Database(_) | AuthError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::Token(_)
            | AuthError::TokenRevoked
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden | AuthError::PasswordChangeRequired => StatusCode::FORBIDDEN,
            AuthError::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::WeakPassword(_) | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::TransactionFailed | AuthError::Database(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        let mut builder = HttpResponse::build(status);
        match status {
            StatusCode::UNAUTHORIZED => {
                builder.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                builder.insert_header((header::RETRY_AFTER, "1"));
            }
            _ => {}
        }
        builder.json(ErrorBody::new(self.code(), self.public_message(), status))
    }
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::PoolExhausted { .. } | DbError::PoolClosed => AuthError::PoolExhausted,
            DbError::TransactionFailed(_) => AuthError::TransactionFailed,
            DbError::Query(e) => AuthError::from(e),
            DbError::Connect(msg) => AuthError::Database(msg),
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AuthError::Conflict("Username or email already exists".to_string());
            }
        }
        AuthError::Database(err.to_string())
    }
}

impl From<GuardError> for AuthError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Unauthenticated => AuthError::Unauthenticated,
            GuardError::Token(failure) => AuthError::Token(failure),
            GuardError::Forbidden => AuthError::Forbidden,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::Validation(err.to_string())
    }
}
