use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::{hash_password, verify_password, AuthError};
use crate::database::models::User;
use crate::error::ApiError;
use crate::tenant::TenantScope;

use super::{invalid, require_text, ServiceError, ServiceResult};

const USER_COLUMNS: &str = "id, tenant_id, username, email, bio, password_hash, created_at";
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> ServiceResult<()> {
        require_text("username", &self.username)?;
        if self.username.len() > 150 || self.username.chars().any(char::is_whitespace) {
            return Err(invalid("username", "must be at most 150 characters without whitespace"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(invalid(
                "password",
                format!("must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }
        if !self.email.is_empty() && !self.email.contains('@') {
            return Err(invalid("email", "must be a valid email address"));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Service(e) => e.into(),
            AccountError::Auth(e) => e.into(),
        }
    }
}

/// Accounts within a tenant
#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, scope: &TenantScope, input: NewUser) -> Result<User, AccountError> {
        let tenant_id = scope.require_for_write().map_err(ServiceError::from)?;
        input.validate()?;

        let password_hash = hash_password(&input.password).await?;
        let sql = format!(
            "INSERT INTO users (tenant_id, username, email, bio, password_hash)
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(tenant_id)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.bio)
            .bind(&password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(ServiceError::from)?;

        tracing::info!("Registered user {} in tenant {}", user.username, tenant_id);
        Ok(user)
    }

    /// Check credentials against users of the current tenant only.
    pub async fn authenticate(&self, scope: &TenantScope, credentials: &Credentials) -> Result<User, AccountError> {
        let Some(tenant_id) = scope.read_filter() else {
            return Err(AuthError::InvalidCredentials.into());
        };

        let sql = format!("SELECT {} FROM users WHERE tenant_id = $1 AND username = $2", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(tenant_id)
            .bind(&credentials.username)
            .fetch_optional(&self.pool)
            .await
            .map_err(ServiceError::from)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&credentials.password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(user)
    }

    pub async fn get_user(&self, scope: &TenantScope, id: i64) -> ServiceResult<User> {
        let not_found = ServiceError::NotFound { entity: "User", id };
        let Some(tenant_id) = scope.read_filter() else {
            return Err(not_found);
        };

        let sql = format!("SELECT {} FROM users WHERE id = $1 AND tenant_id = $2", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, password: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            password: password.into(),
            email: email.into(),
            bio: String::new(),
        }
    }

    #[test]
    fn registration_rules() {
        assert!(new_user("reader", "long-enough", "").validate().is_ok());
        assert!(new_user("reader", "long-enough", "reader@example.com").validate().is_ok());
        assert!(new_user("", "long-enough", "").validate().is_err());
        assert!(new_user("two words", "long-enough", "").validate().is_err());
        assert!(new_user("reader", "short", "").validate().is_err());
        assert!(new_user("reader", "long-enough", "nope").validate().is_err());
    }
}
