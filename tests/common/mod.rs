#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use lectern_api::auth::{encode_token, Claims};
use lectern_api::config::{config, DatabaseConfig, TenancyConfig};
use lectern_api::database::models::Tenant;
use lectern_api::database::{ensure_schema, DatabaseManager};
use lectern_api::tenant::{MemoryTenantDirectory, PgTenantDirectory, TenantDirectory};
use lectern_api::{app, AppState};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

/// Tenants every test router starts with.
pub struct Fixture {
    pub acme: Tenant,
    pub globex: Tenant,
    pub dormant: Tenant,
}

/// Router over an in-memory tenant directory and a pool that never connects.
///
/// Only paths that finish before touching the database are meaningful here:
/// tenant resolution, scope refusals, validation, auth checks.
pub fn test_app(allow_query_param: bool) -> Result<(Router, Fixture)> {
    let pool = DatabaseManager::connect_lazy(&DatabaseConfig {
        url: "postgres://lectern@127.0.0.1:1/unreachable".into(),
        max_connections: 1,
        connection_timeout: 1,
    })?;

    let directory = MemoryTenantDirectory::new();
    let fixture = Fixture {
        acme: directory.insert("Acme", "acme", true)?,
        globex: directory.insert("Globex", "globex", true)?,
        dormant: directory.insert("Dormant", "dormant", false)?,
    };

    let state = AppState::new(pool, Arc::new(directory), &TenancyConfig { allow_query_param });
    Ok((app(state), fixture))
}

/// Router over a live PostgreSQL database, or `None` when `DATABASE_URL` is unset.
pub struct DbApp {
    pub router: Router,
    pub pool: PgPool,
    pub directory: Arc<PgTenantDirectory>,
}

pub async fn db_app() -> Result<Option<DbApp>> {
    let _ = dotenvy::dotenv();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return Ok(None);
    };

    let pool = DatabaseManager::connect(&DatabaseConfig {
        url,
        max_connections: 5,
        connection_timeout: 5,
    })
    .await?;
    ensure_schema(&pool).await?;

    let directory = Arc::new(PgTenantDirectory::new(pool.clone()));
    let state = AppState::new(pool.clone(), directory.clone(), &TenancyConfig { allow_query_param: true });
    Ok(Some(DbApp {
        router: app(state),
        pool,
        directory,
    }))
}

/// Provision an active tenant whose name and domain no other run will reuse.
pub async fn fresh_tenant(directory: &PgTenantDirectory, label: &str) -> Result<Tenant> {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let domain = format!("{}-{}", label, &suffix[..12]);
    let (tenant, _) = directory.create_or_get(&domain.to_uppercase(), &domain).await?;
    Ok(tenant)
}

/// Drive one request through the router and decode the JSON body.
pub async fn send(router: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body: {:?}", bytes))?
    };
    Ok((status, body))
}

pub fn get(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).expect("valid request")
}

pub fn post_json(uri: &str, headers: &[(&str, &str)], body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).expect("valid request")
}

pub fn put_json(uri: &str, headers: &[(&str, &str)], body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).expect("valid request")
}

pub fn delete(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).expect("valid request")
}

/// Bearer token signed with the configured secret.
pub fn bearer_for(user_id: i64, tenant_id: i64) -> String {
    let claims = Claims::new(user_id, "reader".into(), tenant_id);
    let token = encode_token(&claims, &config().security.jwt_secret).expect("token");
    format!("Bearer {}", token)
}

/// The full app served over a real socket on a free port.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub fixture: Fixture,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let (router, fixture) = test_app(true)?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self { port, base_url, fixture };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(format!("{}/", self.base_url)).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}
