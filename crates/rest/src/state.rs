//! Application state shared by all request handlers.

use std::sync::Arc;

use ledgerdesk_persistence::backends::postgres::PostgresBackend;
use ledgerdesk_persistence::rls::TenantScopedExecutor;

use crate::config::ServerConfig;
use crate::tenant::TenantResolver;

/// The executor handlers run their tenant-scoped work through.
pub type Executor = TenantScopedExecutor<PostgresBackend>;

/// Shared application state for the HTTP API.
///
/// # Example
///
/// ```rust,no_run
/// use ledgerdesk_persistence::backends::postgres::{PostgresBackend, PostgresConfig};
/// use ledgerdesk_persistence::rls::TenantScopedExecutor;
/// use ledgerdesk_rest::{AppState, ServerConfig};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ServerConfig::default();
/// let backend = PostgresBackend::connect_lazy(PostgresConfig::default())?;
/// let executor = TenantScopedExecutor::new(backend, &config.tenancy.rls_config())?;
/// let state = AppState::new(executor, config);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AppState {
    executor: Arc<Executor>,
    resolver: Arc<TenantResolver>,
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Creates a new AppState; the tenant resolver follows `config.tenancy`.
    pub fn new(executor: Executor, config: ServerConfig) -> Self {
        Self {
            executor: Arc::new(executor),
            resolver: Arc::new(TenantResolver::new(&config.tenancy)),
            config: Arc::new(config),
        }
    }

    /// Returns the tenant-scoped executor.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Returns the PostgreSQL backend behind the executor.
    pub fn backend(&self) -> &PostgresBackend {
        self.executor.provider()
    }

    /// Returns the request tenant resolver.
    pub fn resolver(&self) -> &TenantResolver {
        &self.resolver
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("executor", &self.executor)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
