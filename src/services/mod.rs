pub mod audio_service;
pub mod catalog_service;
pub mod library_service;
pub mod tenant_service;
pub mod user_service;

pub use audio_service::AudioService;
pub use catalog_service::CatalogService;
pub use library_service::LibraryService;
pub use tenant_service::{TenantError, TenantService};
pub use user_service::UserService;

use serde::Deserialize;
use sqlx::PgPool;

use crate::config::config;
use crate::database::manager::DatabaseError;
use crate::error::ApiError;
use crate::tenant::ScopeError;

/// Errors shared by the tenant-scoped data services
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(err.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => e.into(),
            ServiceError::Scope(e) => e.into(),
            ServiceError::NotFound { .. } => ApiError::not_found(err.to_string()),
            ServiceError::Validation { field, message } => ApiError::invalid_field(field, message),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// `?limit=&offset=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    pub fn limit(&self) -> i64 {
        config().page_size(self.limit)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> ServiceError {
    ServiceError::Validation {
        field,
        message: message.into(),
    }
}

pub(crate) fn require_text(field: &'static str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn require_min(field: &'static str, value: i64, min: i64) -> ServiceResult<()> {
    if value < min {
        return Err(invalid(field, format!("must be at least {}", min)));
    }
    Ok(())
}

/// Tenant owning the row found by `sql`, which must select a single BIGINT
/// tenant id for the bound `id`.
pub(crate) async fn owner_of(pool: &PgPool, sql: &str, id: i64) -> ServiceResult<Option<i64>> {
    let owner = sqlx::query_scalar::<_, i64>(sql).bind(id).fetch_optional(pool).await?;
    Ok(owner)
}
