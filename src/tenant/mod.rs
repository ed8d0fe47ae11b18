pub mod context;
pub mod directory;
pub mod resolver;
pub mod scope;

pub use directory::{MemoryTenantDirectory, PgTenantDirectory, TenantDirectory};
pub use resolver::{
    ResolutionStrategy, ResolvedTenant, StrategyOutcome, TenantLookup, TenantResolver, TenantSource,
};
pub use scope::{ScopeError, TenantScope};
