//! Ledgerdesk API server.
//!
//! Serves the tenant-scoped HTTP API on top of PostgreSQL row-level
//! security. The database role it connects as must not bypass RLS.

use clap::Parser;
use ledgerdesk_persistence::backends::postgres::PostgresBackend;
use ledgerdesk_persistence::rls::TenantScopedExecutor;
use ledgerdesk_rest::{ServerConfig, create_app, init_logging};
use tracing::{info, warn};

/// Creates the PostgreSQL backend from the server configuration.
///
/// A `postgres://` URL wins; otherwise the `LEDGERDESK_PG_*` variables apply.
async fn create_backend(config: &ServerConfig) -> anyhow::Result<PostgresBackend> {
    let backend = match config.database_url.as_deref() {
        Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
            info!("Initializing PostgreSQL backend from connection string");
            PostgresBackend::from_connection_string(url).await?
        }
        Some(_) => {
            anyhow::bail!("DATABASE_URL must start with postgres:// or postgresql://")
        }
        None => {
            info!("Initializing PostgreSQL backend from environment variables");
            PostgresBackend::from_env().await?
        }
    };

    if config.init_schema {
        backend.init_schema(&config.tenancy.rls_config()).await?;
        info!("Schema initialized");
    }

    Ok(backend)
}

/// Starts the Axum HTTP server and stops on Ctrl-C.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        setting = %config.tenancy.setting_name,
        base_domain = ?config.tenancy.base_domain,
        strict = config.tenancy.strict,
        "Starting Ledgerdesk server"
    );

    let backend = create_backend(&config).await?;
    let executor = TenantScopedExecutor::new(backend, &config.tenancy.rls_config())?;

    let app = create_app(executor, config.clone());
    serve(app, &config).await
}
