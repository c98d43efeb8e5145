//! # ledgerdesk-rest
//!
//! HTTP API for Ledgerdesk, where each request runs under one tenant and
//! all tenant data is read through PostgreSQL row-level security.
//!
//! ## Request Flow
//!
//! 1. [`tenant_scope_middleware`](middleware::tenant_scope_middleware)
//!    resolves the tenant from the `X-Tenant-ID` header, the host's
//!    subdomain or the configured default
//! 2. The rest of the request runs inside
//!    [`TenantScope::run`](ledgerdesk_persistence::TenantScope::run)
//! 3. Handlers run their queries through the
//!    [`TenantScopedExecutor`](ledgerdesk_persistence::TenantScopedExecutor)
//!    with no explicit tenant, so the ambient one is bound to the transaction
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Database health check |
//! | `GET` | `/api/tenant` | Current tenant context |
//! | `GET` / `POST` | `/api/services` | List / create services |
//! | `GET` / `PATCH` | `/api/services/{slug}` | Read / toggle a service |
//! | `GET` / `PATCH` | `/api/organization` | Organization settings |
//!
//! ## Example
//!
//! ```rust,no_run
//! use ledgerdesk_persistence::backends::postgres::{PostgresBackend, PostgresConfig};
//! use ledgerdesk_persistence::rls::TenantScopedExecutor;
//! use ledgerdesk_rest::{ServerConfig, create_app};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::default();
//! let backend = PostgresBackend::new(PostgresConfig::default()).await?;
//! let executor = TenantScopedExecutor::new(backend, &config.tenancy.rls_config())?;
//!
//! let app = create_app(executor, config.clone());
//! let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routing;
pub mod state;
pub mod tenant;

pub use config::{ServerConfig, TenancyConfig};
pub use error::{RestError, RestResult};
pub use state::{AppState, Executor};

use axum::Router;
use ledgerdesk_persistence::core::TransactionProvider;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Creates the Axum application.
///
/// Sets up all routes, the tenant scope middleware, tracing, the request
/// timeout and, when enabled, CORS.
pub fn create_app(executor: Executor, config: ServerConfig) -> Router {
    info!(
        backend = executor.provider().backend_name(),
        setting = executor.binder().setting_name(),
        "Creating API server"
    );

    let state = AppState::new(executor, config.clone());
    let router = routing::create_routes(state);

    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ));

    let router = if config.enable_cors {
        router.layer(build_cors_layer(&config))
    } else {
        router
    };

    router.layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// Call once at startup. `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "ledgerdesk_rest={level},ledgerdesk_persistence={level},ledgerdesk={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
