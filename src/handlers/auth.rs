// handlers/auth.rs - /api/v1/auth/{register,login,whoami}

use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::{generate_jwt, Claims};
use crate::config::config;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::server::AppState;
use crate::services::user_service::{Credentials, NewUser};
use crate::tenant::TenantScope;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub user: User,
}

/// POST /api/v1/auth/register
///
/// The new account belongs to the resolved tenant; with none resolved the
/// request is refused with `TENANT_REQUIRED`.
pub async fn register(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<NewUser>,
) -> ApiResult<User> {
    Ok(ApiResponse::created(state.users.register(&scope, input).await?))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(credentials): Json<Credentials>,
) -> ApiResult<LoginResponse> {
    let user = state.users.authenticate(&scope, &credentials).await?;
    let token = generate_jwt(&Claims::for_user(&user)).map_err(ApiError::from)?;

    tracing::info!(user_id = user.id, tenant_id = user.tenant_id, "User logged in");

    Ok(ApiResponse::success(LoginResponse {
        token,
        expires_in: config().security.jwt_expiry_hours * 3600,
        user,
    }))
}

/// GET /api/v1/auth/whoami
pub async fn whoami(State(state): State<AppState>, user: AuthUser, scope: TenantScope) -> ApiResult<User> {
    Ok(ApiResponse::success(state.users.get_user(&scope, user.user_id).await?))
}
