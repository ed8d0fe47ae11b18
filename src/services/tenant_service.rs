use std::sync::Arc;
use tracing::info;

use crate::database::manager::DatabaseError;
use crate::database::models::Tenant;
use crate::tenant::TenantDirectory;

const MAX_FIELD_LEN: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Invalid tenant name: {0}")]
    InvalidName(String),
    #[error("Invalid tenant domain: {0}")]
    InvalidDomain(String),
    #[error("Tenant not found: {0}")]
    NotFound(String),
}

/// Administrative provisioning over a [`TenantDirectory`].
pub struct TenantService {
    directory: Arc<dyn TenantDirectory>,
}

impl TenantService {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self { directory }
    }

    /// Create a tenant for `domain`, or return the existing one unchanged.
    ///
    /// The boolean reports whether a new tenant was inserted.
    pub async fn create_or_get_tenant(&self, name: &str, domain: &str) -> Result<(Tenant, bool), TenantError> {
        validate_tenant_name(name)?;
        validate_tenant_domain(domain)?;

        let (tenant, created) = self.directory.create_or_get(name, domain).await?;
        if created {
            info!("Created tenant {} ({}) with id {}", tenant.name, tenant.domain, tenant.id);
        } else {
            info!("Tenant for domain {} already exists with id {}", tenant.domain, tenant.id);
        }
        Ok((tenant, created))
    }

    pub async fn get_tenant(&self, domain: &str) -> Result<Tenant, TenantError> {
        self.directory
            .find_by_domain(domain)
            .await?
            .ok_or_else(|| TenantError::NotFound(domain.to_string()))
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>, TenantError> {
        Ok(self.directory.list().await?)
    }

    pub async fn set_active(&self, domain: &str, active: bool) -> Result<Tenant, TenantError> {
        let tenant = self
            .directory
            .set_active(domain, active)
            .await?
            .ok_or_else(|| TenantError::NotFound(domain.to_string()))?;

        info!(
            "Tenant {} ({}) is now {}",
            tenant.name,
            tenant.domain,
            if tenant.is_active { "active" } else { "inactive" }
        );
        Ok(tenant)
    }
}

fn validate_tenant_name(name: &str) -> Result<(), TenantError> {
    if name.trim().is_empty() {
        return Err(TenantError::InvalidName("Tenant name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_FIELD_LEN {
        return Err(TenantError::InvalidName(format!(
            "Tenant name must be at most {} characters",
            MAX_FIELD_LEN
        )));
    }
    Ok(())
}

// Stored verbatim; resolution compares byte-for-byte.
fn validate_tenant_domain(domain: &str) -> Result<(), TenantError> {
    if domain.is_empty() {
        return Err(TenantError::InvalidDomain("Tenant domain must not be empty".to_string()));
    }
    if domain.chars().count() > MAX_FIELD_LEN {
        return Err(TenantError::InvalidDomain(format!(
            "Tenant domain must be at most {} characters",
            MAX_FIELD_LEN
        )));
    }
    if domain.chars().any(char::is_whitespace) {
        return Err(TenantError::InvalidDomain("Tenant domain must not contain whitespace".to_string()));
    }
    Ok(())
}
