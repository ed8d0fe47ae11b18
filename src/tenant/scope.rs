//! The tenant-scoping contract handed to every data-access call.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use thiserror::Error;

use crate::database::models::Tenant;

use super::resolver::ResolvedTenant;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("A tenant must be resolved before writing")]
    NoTenant,

    /// Referenced row is missing or belongs to another tenant. Both cases
    /// read the same to the client.
    #[error("Invalid {field}: {id} does not exist")]
    UnknownReference { field: &'static str, id: i64 },
}

/// Explicit per-request tenant, extracted from the [`ResolvedTenant`] extension.
///
/// A scope without a tenant is valid: reads through it are empty and writes are
/// refused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantScope {
    tenant: Option<Tenant>,
}

impl TenantScope {
    pub fn new(tenant: Option<Tenant>) -> Self {
        Self { tenant }
    }

    pub fn none() -> Self {
        Self { tenant: None }
    }

    pub fn tenant(&self) -> Option<&Tenant> {
        self.tenant.as_ref()
    }

    pub fn tenant_id(&self) -> Option<i64> {
        self.tenant.as_ref().map(|t| t.id)
    }

    /// Tenant id to filter reads by. `None` means the read must return nothing
    /// and need not reach the database.
    pub fn read_filter(&self) -> Option<i64> {
        self.tenant_id()
    }

    /// Tenant id to stamp on (or filter) a write.
    pub fn require_for_write(&self) -> Result<i64, ScopeError> {
        self.tenant_id().ok_or(ScopeError::NoTenant)
    }

    /// Check that a referenced row belongs to this scope's tenant.
    ///
    /// `owner` is the referenced row's tenant as found by an unscoped lookup,
    /// `None` when the row does not exist.
    pub fn ensure_owned(&self, field: &'static str, id: i64, owner: Option<i64>) -> Result<(), ScopeError> {
        let tenant_id = self.require_for_write()?;
        match owner {
            Some(owner) if owner == tenant_id => Ok(()),
            _ => Err(ScopeError::UnknownReference { field, id }),
        }
    }
}

impl From<&ResolvedTenant> for TenantScope {
    fn from(resolved: &ResolvedTenant) -> Self {
        Self::new(resolved.tenant.clone())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantScope
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Routes mounted outside the resolver are treated as unscoped
        Ok(parts
            .extensions
            .get::<ResolvedTenant>()
            .map(TenantScope::from)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::resolver::TenantSource;
    use axum::http::Request;
    use chrono::Utc;

    fn acme() -> Tenant {
        Tenant {
            id: 7,
            name: "Acme".into(),
            domain: "acme".into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_scope_filters_nothing_in_and_refuses_writes() {
        let scope = TenantScope::none();
        assert_eq!(scope.read_filter(), None);
        assert_eq!(scope.require_for_write(), Err(ScopeError::NoTenant));
        assert_eq!(scope.ensure_owned("book", 1, Some(1)), Err(ScopeError::NoTenant));
    }

    #[test]
    fn bound_scope_stamps_its_tenant() {
        let scope = TenantScope::new(Some(acme()));
        assert_eq!(scope.read_filter(), Some(7));
        assert_eq!(scope.require_for_write(), Ok(7));
    }

    #[test]
    fn foreign_and_missing_references_look_the_same() {
        let scope = TenantScope::new(Some(acme()));
        assert_eq!(scope.ensure_owned("book", 3, Some(7)), Ok(()));

        let foreign = scope.ensure_owned("book", 3, Some(8)).unwrap_err();
        let missing = scope.ensure_owned("book", 3, None).unwrap_err();
        assert_eq!(foreign, missing);
        assert_eq!(foreign.to_string(), "Invalid book: 3 does not exist");
    }

    #[tokio::test]
    async fn extracts_from_resolved_extension() {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let scope = TenantScope::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(scope, TenantScope::none());

        parts.extensions.insert(ResolvedTenant {
            tenant: Some(acme()),
            source: TenantSource::Subdomain,
        });
        let scope = TenantScope::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(scope.tenant_id(), Some(7));
    }
}
