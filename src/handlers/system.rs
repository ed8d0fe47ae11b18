// handlers/system.rs - service info, health, and the resolved tenant

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::database::models::Tenant;
use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::tenant::{context, ResolvedTenant, TenantSource};

#[derive(Debug, Serialize)]
pub struct TenantInfo {
    pub tenant: Option<Tenant>,
    pub source: &'static str,
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Lectern API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Multi-tenant scripture content and annotation API",
            "tenant_resolution": ["X-Tenant-ID", "X-Tenant-Domain", "subdomain", "?tenant="],
            "endpoints": {
                "health": "/health",
                "tenant": "/api/v1/tenant",
                "auth": "/api/v1/auth/{register,login,whoami}",
                "catalog": "/api/v1/{books,chapters,verses}[/:id]",
                "audio": "/api/v1/audio/{reciters,chapter-audios,timestamps}[/:id]",
                "notes": "/api/v1/notes/{notes,bookmarks,history}[/:id] (authenticated)",
            }
        }
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": { "status": "degraded", "timestamp": now }
                })),
            )
                .into_response()
        }
    }
}

/// GET /api/v1/tenant
///
/// Reports the tenant bound to this request's task together with the
/// strategy that produced it.
pub async fn current_tenant(resolved: Option<Extension<ResolvedTenant>>) -> ApiResult<TenantInfo> {
    let source = resolved
        .map(|Extension(r)| r.source)
        .unwrap_or(TenantSource::Unresolved);

    Ok(ApiResponse::success(TenantInfo {
        tenant: context::current(),
        source: source.as_str(),
    }))
}
