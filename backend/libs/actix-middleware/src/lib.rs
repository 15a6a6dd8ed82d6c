//! # Actix Middleware Library
//!
//! Authorization guard and request instrumentation for the hospital auth
//! service.
//!
//! ## Modules
//! - `guard`: bearer-token authentication and role requirements
//! - `jwt_auth`: the `AuthGuard` middleware and identity extractors
//! - `logging`: request logging with the authenticated subject
//! - `metrics`: Prometheus HTTP and guard metrics

pub mod error;
pub mod guard;
pub mod jwt_auth;
pub mod logging;
pub mod metrics;

pub use error::{ErrorBody, GuardError};
pub use guard::{
    authenticate_request, bearer_token, guard, require_role, AuthContext, RoleRequirement,
    RoutePolicy,
};
pub use jwt_auth::{AuthGuard, MaybeAuth};
pub use logging::RequestLogging;
pub use metrics::MetricsMiddleware;
