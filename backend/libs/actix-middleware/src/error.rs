use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    HttpResponse,
};
use jwt_security::VerificationFailure;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON error body shared by every endpoint of the service.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            error: code.to_string(),
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

/// Rejections produced by the authorization guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// No usable bearer credential on the request
    #[error("authentication required")]
    Unauthenticated,

    #[error(transparent)]
    Token(#[from] VerificationFailure),

    /// Caller is authenticated but its role does not qualify
    #[error("insufficient privileges for this resource")]
    Forbidden,
}

impl GuardError {
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::Unauthenticated => "UNAUTHENTICATED",
            GuardError::Token(failure) => failure.code(),
            GuardError::Forbidden => "FORBIDDEN",
        }
    }
}

impl ResponseError for GuardError {
    fn status_code(&self) -> StatusCode {
        match self {
            GuardError::Unauthenticated | GuardError::Token(_) => StatusCode::UNAUTHORIZED,
            GuardError::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut builder = HttpResponse::build(status);
        if status == StatusCode::UNAUTHORIZED {
            builder.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
        }
        builder.json(ErrorBody::new(self.code(), self.to_string(), status))
    }
}
