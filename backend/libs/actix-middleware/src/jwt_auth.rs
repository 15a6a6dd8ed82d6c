use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use chrono::Utc;
use futures::future::{ready, Ready};
use jwt_security::TokenManager;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::GuardError;
use crate::guard::{guard, AuthContext, RoleRequirement, RoutePolicy};
use crate::metrics::record_guard_decision;

/// Authorization guard middleware, attached per scope or resource with the
/// policy that route requires.
///
/// ```ignore
/// web::scope("/api/admin")
///     .wrap(AuthGuard::admin_only(tokens.clone()))
/// ```
#[derive(Clone)]
pub struct AuthGuard {
    tokens: Arc<TokenManager>,
    policy: Arc<RoutePolicy>,
}

impl AuthGuard {
    pub fn new(tokens: Arc<TokenManager>, policy: RoutePolicy) -> Self {
        Self {
            tokens,
            policy: Arc::new(policy),
        }
    }

    pub fn authenticated(tokens: Arc<TokenManager>) -> Self {
        Self::new(tokens, RoutePolicy::Authenticated(RoleRequirement::AnyRole))
    }

    pub fn require(tokens: Arc<TokenManager>, requirement: RoleRequirement) -> Self {
        Self::new(tokens, RoutePolicy::Authenticated(requirement))
    }

    pub fn admin_only(tokens: Arc<TokenManager>) -> Self {
        Self::require(tokens, RoleRequirement::AdminOnly)
    }

    pub fn optional(tokens: Arc<TokenManager>) -> Self {
        Self::new(tokens, RoutePolicy::OptionalAuth)
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthGuardService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthGuardService {
            service: Rc::new(service),
            tokens: Arc::clone(&self.tokens),
            policy: Arc::clone(&self.policy),
        }))
    }
}

pub struct AuthGuardService<S> {
    service: Rc<S>,
    tokens: Arc<TokenManager>,
    policy: Arc<RoutePolicy>,
}

impl<S, B> Service<ServiceRequest> for AuthGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let decision = guard(req.headers(), &self.tokens, Utc::now(), &self.policy);
        let policy = self.policy.label();

        Box::pin(async move {
            match decision {
                Ok(Some(ctx)) => {
                    record_guard_decision(policy, "authorized");
                    req.extensions_mut().insert(ctx);
                }
                Ok(None) => record_guard_decision(policy, "anonymous"),
                Err(err) => {
                    record_guard_decision(policy, err.code());
                    tracing::warn!(
                        method = %req.method(),
                        path = %req.path(),
                        reason = err.code(),
                        "Request rejected by auth guard"
                    );
                    return Err(err.into());
                }
            }

            service.call(req).await
        })
    }
}

/// Handlers behind an authenticating guard take the caller as a parameter.
impl FromRequest for AuthContext {
    type Error = GuardError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthContext>() {
            Some(ctx) => ready(Ok(*ctx)),
            None => ready(Err(GuardError::Unauthenticated)),
        }
    }
}

/// Caller identity on optional-auth routes.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuth(pub Option<AuthContext>);

impl FromRequest for MaybeAuth {
    type Error = GuardError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(MaybeAuth(req.extensions().get::<AuthContext>().copied())))
    }
}
