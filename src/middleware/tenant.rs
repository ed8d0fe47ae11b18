use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::Instrument;

use crate::tenant::{context, TenantResolver};

/// Resolves the tenant once per request, before any handler runs.
///
/// The result is stored as a [`ResolvedTenant`](crate::tenant::ResolvedTenant)
/// extension and bound into the task-scoped context for the lifetime of the
/// downstream future. A request without a tenant is passed through unchanged.
pub async fn resolve_tenant_middleware(
    State(resolver): State<Arc<TenantResolver>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let resolved = resolver.resolve(&parts).await;

    let span = tracing::info_span!(
        "tenant",
        tenant_id = ?resolved.tenant_id(),
        source = %resolved.source,
    );
    let tenant = resolved.tenant.clone();

    parts.extensions.insert(resolved);
    let request = Request::from_parts(parts, body);

    context::scope(tenant, next.run(request)).instrument(span).await
}
