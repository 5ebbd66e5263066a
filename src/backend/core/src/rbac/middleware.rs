//! Axum guard that enforces a permission on every request it wraps.
//!
//! Authentication happens upstream and leaves a [`RequestPrincipal`] in the
//! request extensions. The guard denies with the uniform access-denied
//! response when the principal is missing or the check fails.

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

use super::models::{OrganizationId, UserId};
use super::permissions::Permission;
use super::policy::AccessEvaluator;
use crate::error::{AuthorizationError, AuthzError};

// ═══════════════════════════════════════════════════════════════════════════════
// Request Extensions
// ═══════════════════════════════════════════════════════════════════════════════

/// Caller identity and organization scope, set by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPrincipal {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
}

/// Authorization context for handlers behind [`RequirePermissionLayer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbacContext {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    /// The permission the guard checked.
    pub checked_permission: Permission,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RbacContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RbacContext>().cloned().ok_or_else(|| {
            AuthzError::configuration("RbacContext requested without RequirePermissionLayer")
                .into_response()
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer that wraps services with permission enforcement.
///
/// # Example
///
/// ```rust,ignore
/// use welltrack_authz::rbac::{AccessEvaluator, Permission, RequirePermissionLayer};
///
/// let app = Router::new()
///     .route("/wells/:id", patch(update_well))
///     .layer(RequirePermissionLayer::new(evaluator.clone(), Permission::WellEdit));
/// ```
#[derive(Clone)]
pub struct RequirePermissionLayer {
    evaluator: AccessEvaluator,
    permission: Permission,
}

impl RequirePermissionLayer {
    pub fn new(evaluator: AccessEvaluator, permission: Permission) -> Self {
        Self {
            evaluator,
            permission,
        }
    }
}

impl<S> Layer<S> for RequirePermissionLayer {
    type Service = RequirePermissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermissionService {
            inner,
            evaluator: self.evaluator.clone(),
            permission: self.permission,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Service that enforces a required permission per request.
#[derive(Clone)]
pub struct RequirePermissionService<S> {
    inner: S,
    evaluator: AccessEvaluator,
    permission: Permission,
}

impl<S> Service<Request<Body>> for RequirePermissionService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let evaluator = self.evaluator.clone();
        let permission = self.permission;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let principal = match request.extensions().get::<RequestPrincipal>().cloned() {
                Some(principal) => principal,
                None => {
                    warn!(permission = %permission, "Request reached guard without a principal");
                    return Ok(AuthorizationError::new(permission).into_response());
                }
            };

            if let Err(denied) = evaluator
                .require(&principal.user_id, &principal.organization_id, permission)
                .await
            {
                return Ok(denied.into_response());
            }

            request.extensions_mut().insert(RbacContext {
                user_id: principal.user_id,
                organization_id: principal.organization_id,
                checked_permission: permission,
            });

            inner.call(request).await
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
