//! Durable registry of tenants.
//!
//! The resolver only ever reads from a [`TenantDirectory`]. Writes
//! (`create_or_get`, `set_active`) belong to administrative provisioning.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::RwLock;

use crate::database::manager::DatabaseError;
use crate::database::models::Tenant;

const TENANT_COLUMNS: &str = "id, name, domain, is_active, created_at";

/// Lookup and provisioning operations over the tenant registry.
///
/// Lookups return tenants regardless of `is_active`; callers decide what an
/// inactive tenant means for them.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Tenant>, DatabaseError>;

    /// Exact, case-sensitive match on `domain`.
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, DatabaseError>;

    /// Return the tenant owning `domain`, creating an active one if none exists.
    /// The boolean is `true` only when a new row was inserted.
    async fn create_or_get(&self, name: &str, domain: &str) -> Result<(Tenant, bool), DatabaseError>;

    async fn list(&self) -> Result<Vec<Tenant>, DatabaseError>;

    /// Flip the active flag. Returns the updated tenant, or `None` for an unknown domain.
    async fn set_active(&self, domain: &str, active: bool) -> Result<Option<Tenant>, DatabaseError>;
}

/// PostgreSQL-backed directory over the `tenants` table.
#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn find_by_id(&self, id: i64) -> Result<Option<Tenant>, DatabaseError> {
        let sql = format!("SELECT {} FROM tenants WHERE id = $1", TENANT_COLUMNS);
        let tenant = sqlx::query_as::<_, Tenant>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, DatabaseError> {
        let sql = format!("SELECT {} FROM tenants WHERE domain = $1", TENANT_COLUMNS);
        let tenant = sqlx::query_as::<_, Tenant>(&sql)
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn create_or_get(&self, name: &str, domain: &str) -> Result<(Tenant, bool), DatabaseError> {
        // ON CONFLICT on domain only: a clashing name still surfaces as a unique violation
        let insert = format!(
            "INSERT INTO tenants (name, domain, is_active) VALUES ($1, $2, TRUE)
             ON CONFLICT (domain) DO NOTHING
             RETURNING {}",
            TENANT_COLUMNS
        );
        let created = sqlx::query_as::<_, Tenant>(&insert)
            .bind(name)
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(tenant) = created {
            return Ok((tenant, true));
        }

        let existing = self
            .find_by_domain(domain)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("tenant with domain '{}'", domain)))?;
        Ok((existing, false))
    }

    async fn list(&self) -> Result<Vec<Tenant>, DatabaseError> {
        let sql = format!("SELECT {} FROM tenants ORDER BY id", TENANT_COLUMNS);
        let tenants = sqlx::query_as::<_, Tenant>(&sql).fetch_all(&self.pool).await?;
        Ok(tenants)
    }

    async fn set_active(&self, domain: &str, active: bool) -> Result<Option<Tenant>, DatabaseError> {
        let sql = format!(
            "UPDATE tenants SET is_active = $2 WHERE domain = $1 RETURNING {}",
            TENANT_COLUMNS
        );
        let tenant = sqlx::query_as::<_, Tenant>(&sql)
            .bind(domain)
            .bind(active)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }
}

/// Process-local directory. Backs the test suites and single-node demos.
#[derive(Default)]
pub struct MemoryTenantDirectory {
    tenants: RwLock<Vec<Tenant>>,
}

impl MemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tenant with an explicit active flag, bypassing idempotence.
    pub fn insert(&self, name: &str, domain: &str, is_active: bool) -> Result<Tenant, DatabaseError> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| DatabaseError::QueryError("tenant directory lock poisoned".to_string()))?;

        if tenants.iter().any(|t| t.domain == domain) {
            return Err(DatabaseError::Conflict(format!("domain '{}' already registered", domain)));
        }
        if tenants.iter().any(|t| t.name == name) {
            return Err(DatabaseError::Conflict(format!("name '{}' already registered", name)));
        }

        let tenant = Tenant {
            id: tenants.iter().map(|t| t.id).max().unwrap_or(0) + 1,
            name: name.to_string(),
            domain: domain.to_string(),
            is_active,
            created_at: Utc::now(),
        };
        tenants.push(tenant.clone());
        Ok(tenant)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Tenant>>, DatabaseError> {
        self.tenants
            .read()
            .map_err(|_| DatabaseError::QueryError("tenant directory lock poisoned".to_string()))
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn find_by_id(&self, id: i64) -> Result<Option<Tenant>, DatabaseError> {
        Ok(self.read()?.iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, DatabaseError> {
        Ok(self.read()?.iter().find(|t| t.domain == domain).cloned())
    }

    async fn create_or_get(&self, name: &str, domain: &str) -> Result<(Tenant, bool), DatabaseError> {
        if let Some(existing) = self.find_by_domain(domain).await? {
            return Ok((existing, false));
        }
        let tenant = self.insert(name, domain, true)?;
        Ok((tenant, true))
    }

    async fn list(&self) -> Result<Vec<Tenant>, DatabaseError> {
        Ok(self.read()?.clone())
    }

    async fn set_active(&self, domain: &str, active: bool) -> Result<Option<Tenant>, DatabaseError> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| DatabaseError::QueryError("tenant directory lock poisoned".to_string()))?;
        Ok(tenants.iter_mut().find(|t| t.domain == domain).map(|t| {
            t.is_active = active;
            t.clone()
        }))
    }
}
