//! Tenant resolution from request metadata.
//!
//! The [`TenantResolver`] walks an ordered list of [`ResolutionStrategy`]
//! values. Each strategy turns the request into a directory lookup; the
//! first one that yields an active tenant wins. Nothing here ever fails a
//! request: misses, inactive tenants and directory errors all fall through.

use axum::http::{header::HOST, request::Parts};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::TenancyConfig;
use crate::database::models::Tenant;

use super::directory::TenantDirectory;

pub const X_TENANT_ID: &str = "x-tenant-id";
pub const X_TENANT_DOMAIN: &str = "x-tenant-domain";
pub const TENANT_QUERY_PARAM: &str = "tenant";

/// Where a resolved tenant came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    TenantIdHeader,
    TenantDomainHeader,
    Subdomain,
    QueryParameter,
    Unresolved,
}

impl TenantSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantSource::TenantIdHeader => "x_tenant_id",
            TenantSource::TenantDomainHeader => "x_tenant_domain",
            TenantSource::Subdomain => "subdomain",
            TenantSource::QueryParameter => "query_parameter",
            TenantSource::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for TenantSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory key a strategy extracted from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantLookup {
    Id(i64),
    Domain(String),
}

impl fmt::Display for TenantLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantLookup::Id(id) => write!(f, "id={}", id),
            TenantLookup::Domain(domain) => write!(f, "domain={}", domain),
        }
    }
}

/// Result of running a single strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Matched(Tenant),
    NoMatch,
}

/// Outcome of the whole resolution pass, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTenant {
    pub tenant: Option<Tenant>,
    pub source: TenantSource,
}

impl ResolvedTenant {
    pub fn unresolved() -> Self {
        Self {
            tenant: None,
            source: TenantSource::Unresolved,
        }
    }

    pub fn tenant_id(&self) -> Option<i64> {
        self.tenant.as_ref().map(|t| t.id)
    }
}

/// One ordered way of deriving a tenant key from a request.
pub trait ResolutionStrategy: Send + Sync {
    fn source(&self) -> TenantSource;

    /// Extract the directory key, or `None` when the request carries nothing usable.
    fn candidate(&self, parts: &Parts) -> Option<TenantLookup>;
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
}

/// `X-Tenant-ID: <integer>`
#[derive(Debug, Default)]
pub struct TenantIdHeaderStrategy;

impl ResolutionStrategy for TenantIdHeaderStrategy {
    fn source(&self) -> TenantSource {
        TenantSource::TenantIdHeader
    }

    fn candidate(&self, parts: &Parts) -> Option<TenantLookup> {
        let raw = header_value(parts, X_TENANT_ID)?;
        match raw.parse::<i64>() {
            Ok(id) => Some(TenantLookup::Id(id)),
            Err(_) => {
                debug!("ignoring non-numeric {} header: {:?}", X_TENANT_ID, raw);
                None
            }
        }
    }
}

/// `X-Tenant-Domain: <domain>`
#[derive(Debug, Default)]
pub struct TenantDomainHeaderStrategy;

impl ResolutionStrategy for TenantDomainHeaderStrategy {
    fn source(&self) -> TenantSource {
        TenantSource::TenantDomainHeader
    }

    fn candidate(&self, parts: &Parts) -> Option<TenantLookup> {
        header_value(parts, X_TENANT_DOMAIN).map(|d| TenantLookup::Domain(d.to_string()))
    }
}

/// First label of the host, when the host has at least two labels.
#[derive(Debug, Default)]
pub struct SubdomainStrategy;

impl SubdomainStrategy {
    fn host(parts: &Parts) -> Option<&str> {
        header_value(parts, HOST.as_str()).or_else(|| parts.uri.host())
    }
}

impl ResolutionStrategy for SubdomainStrategy {
    fn source(&self) -> TenantSource {
        TenantSource::Subdomain
    }

    fn candidate(&self, parts: &Parts) -> Option<TenantLookup> {
        let host = Self::host(parts)?;
        // IPv6 literals have no subdomain
        if host.starts_with('[') {
            return None;
        }

        let host = host.split(':').next().unwrap_or(host);
        let mut labels = host.split('.');
        let first = labels.next()?;
        if labels.next().is_none() || first.is_empty() {
            return None;
        }
        Some(TenantLookup::Domain(first.to_string()))
    }
}

/// `?tenant=<domain>`
#[derive(Debug, Default)]
pub struct QueryParameterStrategy;

impl ResolutionStrategy for QueryParameterStrategy {
    fn source(&self) -> TenantSource {
        TenantSource::QueryParameter
    }

    fn candidate(&self, parts: &Parts) -> Option<TenantLookup> {
        let query = parts.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| *key == TENANT_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .map(TenantLookup::Domain)
    }
}

/// Resolves the tenant for a request against a [`TenantDirectory`].
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl TenantResolver {
    /// Build the standard strategy chain. The query parameter strategy is only
    /// installed when the tenancy config allows it.
    pub fn new(directory: Arc<dyn TenantDirectory>, config: &TenancyConfig) -> Self {
        let mut strategies: Vec<Box<dyn ResolutionStrategy>> = vec![
            Box::new(TenantIdHeaderStrategy),
            Box::new(TenantDomainHeaderStrategy),
            Box::new(SubdomainStrategy),
        ];
        if config.allow_query_param {
            strategies.push(Box::new(QueryParameterStrategy));
        }

        Self { directory, strategies }
    }

    pub fn sources(&self) -> Vec<TenantSource> {
        self.strategies.iter().map(|s| s.source()).collect()
    }

    /// Run the strategies in order and return the first active match.
    pub async fn resolve(&self, parts: &Parts) -> ResolvedTenant {
        for strategy in &self.strategies {
            if let StrategyOutcome::Matched(tenant) = self.attempt(strategy.as_ref(), parts).await {
                debug!("resolved tenant {} ({}) via {}", tenant.domain, tenant.id, strategy.source());
                return ResolvedTenant {
                    tenant: Some(tenant),
                    source: strategy.source(),
                };
            }
        }

        ResolvedTenant::unresolved()
    }

    /// Run a single strategy against the directory.
    pub async fn attempt(&self, strategy: &dyn ResolutionStrategy, parts: &Parts) -> StrategyOutcome {
        let Some(lookup) = strategy.candidate(parts) else {
            return StrategyOutcome::NoMatch;
        };
        let source = strategy.source();

        let found = match &lookup {
            TenantLookup::Id(id) => self.directory.find_by_id(*id).await,
            TenantLookup::Domain(domain) => self.directory.find_by_domain(domain).await,
        };

        match found {
            Ok(Some(tenant)) if tenant.is_active => StrategyOutcome::Matched(tenant),
            Ok(Some(tenant)) => {
                // Known but deactivated: distinct from an unknown key, same outcome
                warn!("{}: tenant {} ({}) is inactive, skipping", source, tenant.domain, tenant.id);
                StrategyOutcome::NoMatch
            }
            Ok(None) => {
                debug!("{}: no tenant for {}", source, lookup);
                StrategyOutcome::NoMatch
            }
            Err(e) => {
                warn!("{}: tenant lookup for {} failed: {}", source, lookup, e);
                StrategyOutcome::NoMatch
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::manager::DatabaseError;
    use crate::tenant::directory::MemoryTenantDirectory;
    use async_trait::async_trait;
    use axum::http::Request;

    fn make_parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    struct Fixture {
        directory: Arc<MemoryTenantDirectory>,
        acme: Tenant,
        globex: Tenant,
        dormant: Tenant,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(MemoryTenantDirectory::new());
        let acme = directory.insert("Acme", "acme", true).unwrap();
        let globex = directory.insert("Globex", "globex", true).unwrap();
        let dormant = directory.insert("Dormant", "dormant", false).unwrap();
        Fixture {
            directory,
            acme,
            globex,
            dormant,
        }
    }

    fn resolver(directory: Arc<MemoryTenantDirectory>) -> TenantResolver {
        TenantResolver::new(directory, &TenancyConfig { allow_query_param: true })
    }

    struct FailingDirectory;

    #[async_trait]
    impl TenantDirectory for FailingDirectory {
        async fn find_by_id(&self, _id: i64) -> Result<Option<Tenant>, DatabaseError> {
            Err(DatabaseError::QueryError("connection refused".into()))
        }
        async fn find_by_domain(&self, _domain: &str) -> Result<Option<Tenant>, DatabaseError> {
            Err(DatabaseError::QueryError("connection refused".into()))
        }
        async fn create_or_get(&self, _name: &str, _domain: &str) -> Result<(Tenant, bool), DatabaseError> {
            Err(DatabaseError::QueryError("connection refused".into()))
        }
        async fn list(&self) -> Result<Vec<Tenant>, DatabaseError> {
            Err(DatabaseError::QueryError("connection refused".into()))
        }
        async fn set_active(&self, _domain: &str, _active: bool) -> Result<Option<Tenant>, DatabaseError> {
            Err(DatabaseError::QueryError("connection refused".into()))
        }
    }

    #[test]
    fn test_id_header_candidate() {
        let strategy = TenantIdHeaderStrategy;

        let parts = make_parts("/", &[(X_TENANT_ID, "42")]);
        assert_eq!(strategy.candidate(&parts), Some(TenantLookup::Id(42)));

        let parts = make_parts("/", &[(X_TENANT_ID, "acme")]);
        assert_eq!(strategy.candidate(&parts), None);

        let parts = make_parts("/", &[(X_TENANT_ID, "")]);
        assert_eq!(strategy.candidate(&parts), None);

        let parts = make_parts("/", &[]);
        assert_eq!(strategy.candidate(&parts), None);
    }

    #[test]
    fn test_subdomain_candidate() {
        let strategy = SubdomainStrategy;

        let parts = make_parts("/", &[("host", "acme.example.com")]);
        assert_eq!(strategy.candidate(&parts), Some(TenantLookup::Domain("acme".into())));

        let parts = make_parts("/", &[("host", "acme.example.com:8443")]);
        assert_eq!(strategy.candidate(&parts), Some(TenantLookup::Domain("acme".into())));

        let parts = make_parts("/", &[("host", "localhost:8000")]);
        assert_eq!(strategy.candidate(&parts), None);

        let parts = make_parts("/", &[("host", "[::1]:8000")]);
        assert_eq!(strategy.candidate(&parts), None);

        // Falls back to the request target's authority
        let parts = make_parts("http://globex.example.com/api", &[]);
        assert_eq!(strategy.candidate(&parts), Some(TenantLookup::Domain("globex".into())));
    }

    #[test]
    fn test_query_candidate() {
        let strategy = QueryParameterStrategy;

        let parts = make_parts("/api/v1/books?limit=5&tenant=acme", &[]);
        assert_eq!(strategy.candidate(&parts), Some(TenantLookup::Domain("acme".into())));

        let parts = make_parts("/api/v1/books?tenant=", &[]);
        assert_eq!(strategy.candidate(&parts), None);

        let parts = make_parts("/api/v1/books?tenant=a%20b", &[]);
        assert_eq!(strategy.candidate(&parts), Some(TenantLookup::Domain("a b".into())));
    }

    #[tokio::test]
    async fn test_resolves_each_source() {
        let f = fixture();
        let resolver = resolver(f.directory.clone());

        let id = f.acme.id.to_string();
        let resolved = resolver.resolve(&make_parts("/", &[(X_TENANT_ID, &id)])).await;
        assert_eq!(resolved.tenant.as_ref(), Some(&f.acme));
        assert_eq!(resolved.source, TenantSource::TenantIdHeader);

        let resolved = resolver.resolve(&make_parts("/", &[(X_TENANT_DOMAIN, "globex")])).await;
        assert_eq!(resolved.tenant.as_ref(), Some(&f.globex));
        assert_eq!(resolved.source, TenantSource::TenantDomainHeader);

        let resolved = resolver.resolve(&make_parts("/", &[("host", "acme.example.com")])).await;
        assert_eq!(resolved.tenant.as_ref(), Some(&f.acme));
        assert_eq!(resolved.source, TenantSource::Subdomain);

        let resolved = resolver
            .resolve(&make_parts("/?tenant=acme", &[("host", "localhost")]))
            .await;
        assert_eq!(resolved.tenant.as_ref(), Some(&f.acme));
        assert_eq!(resolved.source, TenantSource::QueryParameter);
    }

    #[tokio::test]
    async fn test_nothing_resolves_to_none() {
        let f = fixture();
        let resolver = resolver(f.directory.clone());

        let resolved = resolver.resolve(&make_parts("/", &[("host", "localhost:8000")])).await;
        assert_eq!(resolved, ResolvedTenant::unresolved());
    }

    #[tokio::test]
    async fn test_id_header_beats_domain_header() {
        let f = fixture();
        let resolver = resolver(f.directory.clone());

        let id = f.acme.id.to_string();
        let parts = make_parts("/", &[(X_TENANT_ID, &id), (X_TENANT_DOMAIN, "globex")]);
        let resolved = resolver.resolve(&parts).await;
        assert_eq!(resolved.tenant_id(), Some(f.acme.id));
        assert_eq!(resolved.source, TenantSource::TenantIdHeader);
    }

    #[tokio::test]
    async fn test_domain_header_beats_subdomain() {
        let f = fixture();
        let resolver = resolver(f.directory.clone());

        let parts = make_parts("/", &[(X_TENANT_DOMAIN, "acme"), ("host", "globex.example.com")]);
        let resolved = resolver.resolve(&parts).await;
        assert_eq!(resolved.tenant_id(), Some(f.acme.id));
        assert_eq!(resolved.source, TenantSource::TenantDomainHeader);
    }

    #[tokio::test]
    async fn test_unknown_id_falls_through() {
        let f = fixture();
        let resolver = resolver(f.directory.clone());

        let parts = make_parts("/", &[(X_TENANT_ID, "9999"), ("host", "globex.example.com")]);
        let resolved = resolver.resolve(&parts).await;
        assert_eq!(resolved.tenant_id(), Some(f.globex.id));
        assert_eq!(resolved.source, TenantSource::Subdomain);

        let parts = make_parts("/", &[(X_TENANT_ID, "9999")]);
        assert_eq!(resolver.resolve(&parts).await, ResolvedTenant::unresolved());
    }

    #[tokio::test]
    async fn test_non_numeric_id_falls_through() {
        let f = fixture();
        let resolver = resolver(f.directory.clone());

        let parts = make_parts("/", &[(X_TENANT_ID, "acme"), (X_TENANT_DOMAIN, "globex")]);
        let resolved = resolver.resolve(&parts).await;
        assert_eq!(resolved.tenant_id(), Some(f.globex.id));
    }

    #[tokio::test]
    async fn test_inactive_tenant_skipped_by_every_strategy() {
        let f = fixture();
        let resolver = resolver(f.directory.clone());
        let dormant_id = f.dormant.id.to_string();

        let cases: Vec<Parts> = vec![
            make_parts("/", &[(X_TENANT_ID, &dormant_id)]),
            make_parts("/", &[(X_TENANT_DOMAIN, "dormant")]),
            make_parts("/", &[("host", "dormant.example.com")]),
            make_parts("/?tenant=dormant", &[("host", "localhost")]),
        ];
        for parts in &cases {
            assert_eq!(resolver.resolve(parts).await, ResolvedTenant::unresolved());
        }

        // Inactive at a higher strategy falls through to an active one below
        let parts = make_parts(
            "/?tenant=acme",
            &[(X_TENANT_ID, &dormant_id), (X_TENANT_DOMAIN, "dormant"), ("host", "dormant.example.com")],
        );
        let resolved = resolver.resolve(&parts).await;
        assert_eq!(resolved.tenant_id(), Some(f.acme.id));
        assert_eq!(resolved.source, TenantSource::QueryParameter);
    }

    #[tokio::test]
    async fn test_subdomain_resolves_only_while_active() {
        let f = fixture();
        let resolver = resolver(f.directory.clone());
        let parts = make_parts("/", &[("host", "acme.example.com")]);

        assert_eq!(resolver.resolve(&parts).await.tenant_id(), Some(f.acme.id));

        f.directory.set_active("acme", false).await.unwrap();
        assert_eq!(resolver.resolve(&parts).await, ResolvedTenant::unresolved());
    }

    #[tokio::test]
    async fn test_query_parameter_disabled_by_config() {
        let f = fixture();
        let resolver = TenantResolver::new(f.directory.clone(), &TenancyConfig { allow_query_param: false });

        assert!(!resolver.sources().contains(&TenantSource::QueryParameter));
        let parts = make_parts("/?tenant=acme", &[("host", "localhost")]);
        assert_eq!(resolver.resolve(&parts).await, ResolvedTenant::unresolved());
    }

    #[tokio::test]
    async fn test_directory_errors_fall_through() {
        let resolver = TenantResolver::new(Arc::new(FailingDirectory), &TenancyConfig { allow_query_param: true });

        let parts = make_parts("/?tenant=acme", &[(X_TENANT_ID, "1"), ("host", "acme.example.com")]);
        let outcome = resolver.attempt(&TenantIdHeaderStrategy, &parts).await;
        assert_eq!(outcome, StrategyOutcome::NoMatch);
        assert_eq!(resolver.resolve(&parts).await, ResolvedTenant::unresolved());
    }

    #[test]
    fn test_source_display() {
        assert_eq!(TenantSource::TenantIdHeader.to_string(), "x_tenant_id");
        assert_eq!(TenantSource::QueryParameter.to_string(), "query_parameter");
        assert_eq!(TenantSource::Unresolved.to_string(), "unresolved");
    }
}
