// Per-route authorization gates
//
// Each gate implies the ones before it: a permission check also requires an
// activated account, which in turn requires an authenticated one.

use std::convert::Infallible;
use std::task::{Context, Poll};

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::middleware::identity::Identity;
use crate::services::permission::PermissionService;
use crate::utils::api_error::{log_auth_failure, ApiError};

/// Reject anonymous requests with 401
pub async fn require_authenticated_user(
    identity: Identity,
    request: Request,
    next: Next,
) -> Response {
    match identity.authenticated() {
        Ok(_) => next.run(request).await,
        Err(error) => {
            log_auth_failure(None, &error);
            error.into_response()
        },
    }
}

/// Reject anonymous requests with 401 and inactive accounts with 403
pub async fn require_activated_user(identity: Identity, request: Request, next: Next) -> Response {
    match identity.activated() {
        Ok(_) => next.run(request).await,
        Err(error) => {
            log_auth_failure(identity.user().map(|user| user.id), &error);
            error.into_response()
        },
    }
}

/// Layer that admits only activated users holding `code`
///
/// Permissions are loaded from the store on every request.
#[derive(Clone)]
pub struct RequirePermissionLayer {
    permissions: PermissionService,
    code: &'static str,
}

impl RequirePermissionLayer {
    pub fn new(permissions: PermissionService, code: &'static str) -> Self {
        Self { permissions, code }
    }
}

impl<S> Layer<S> for RequirePermissionLayer {
    type Service = RequirePermission<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermission {
            inner,
            permissions: self.permissions.clone(),
            code: self.code,
        }
    }
}

#[derive(Clone)]
pub struct RequirePermission<S> {
    inner: S,
    permissions: PermissionService,
    code: &'static str,
}

impl<S> Service<Request> for RequirePermission<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // Swap in a fresh clone so the instance polled ready is the one called
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let permissions = self.permissions.clone();
        let code = self.code;

        Box::pin(async move {
            let user_id = match Identity::from_extensions(request.extensions()).activated() {
                Ok(user) => user.id,
                Err(error) => {
                    log_auth_failure(None, &error);
                    return Ok(error.into_response());
                },
            };

            match permissions.all_for_user(user_id).await {
                Ok(granted) if granted.include(code) => inner.call(request).await,
                Ok(_) => {
                    let error = ApiError::NotPermitted;
                    tracing::warn!(user_id, permission = code, "Missing permission");
                    Ok(error.into_response())
                },
                Err(e) => Ok(ApiError::from(e).into_response()),
            }
        })
    }
}
