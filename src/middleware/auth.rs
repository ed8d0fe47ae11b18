use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::auth::{bearer_token, validate_jwt, AuthError, Claims};
use crate::error::ApiError;
use crate::tenant::ResolvedTenant;

/// Authenticated user context extracted from the bearer JWT.
///
/// Only accepted when the token was issued under the tenant this request
/// resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub tenant_id: i64,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            tenant_id: claims.tenant_id,
        }
    }
}

impl AuthUser {
    /// Validate `claims` against the resolved tenant.
    pub fn authorize(claims: Claims, resolved: Option<&ResolvedTenant>) -> Result<Self, AuthError> {
        match resolved.and_then(ResolvedTenant::tenant_id) {
            Some(tenant_id) if tenant_id == claims.tenant_id => Ok(AuthUser::from(claims)),
            _ => {
                tracing::warn!(
                    "Rejecting token for user {} of tenant {} on request resolved to {:?}",
                    claims.username,
                    claims.tenant_id,
                    resolved.and_then(ResolvedTenant::tenant_id)
                );
                Err(AuthError::TenantMismatch)
            }
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let token = bearer_token(header)?;
        let claims = validate_jwt(token)?;

        Ok(AuthUser::authorize(claims, parts.extensions.get::<ResolvedTenant>())?)
    }
}
