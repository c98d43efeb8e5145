//! PostgreSQL backend implementation.
//!
//! Connections come from a deadpool-postgres pool. Tenant-scoped work goes
//! through [`TenantScopedExecutor`](crate::rls::TenantScopedExecutor), which
//! uses [`PostgresBackend`] as its [`TransactionProvider`](crate::core::TransactionProvider).
//!
//! # Example
//!
//! ```no_run
//! use ledgerdesk_persistence::backends::postgres::{PostgresBackend, PostgresConfig};
//! use ledgerdesk_persistence::rls::RlsConfig;
//!
//! # async fn main_example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = PostgresBackend::new(PostgresConfig::default()).await?;
//! backend.init_schema(&RlsConfig::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE organization_settings (
//!     tenant_id TEXT PRIMARY KEY DEFAULT current_setting('app.current_tenant', true),
//!     display_name TEXT NOT NULL,
//!     default_currency TEXT NOT NULL DEFAULT 'USD',
//!     timezone TEXT NOT NULL DEFAULT 'UTC',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//!
//! CREATE TABLE services (
//!     id UUID PRIMARY KEY,
//!     tenant_id TEXT DEFAULT current_setting('app.current_tenant', true),
//!     slug TEXT NOT NULL,
//!     name TEXT NOT NULL,
//!     description TEXT,
//!     price_cents BIGINT NOT NULL,
//!     currency TEXT NOT NULL DEFAULT 'USD',
//!     active BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     UNIQUE (tenant_id, slug)
//! );
//! ```
//!
//! Both tables get the prepare-phase `tenant_isolation` policy on creation.
//! Later phases are applied with [`RlsRollout`](crate::rls::RlsRollout).

mod backend;
pub(crate) mod schema;
mod transaction;

pub use backend::{PostgresBackend, PostgresConfig, PostgresSslMode};
pub use schema::{SCHEMA_VERSION, TENANT_TABLES};
pub use transaction::PostgresTransaction;
