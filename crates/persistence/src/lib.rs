//! Ledgerdesk Persistence Layer
//!
//! Tenant-scoped access to PostgreSQL where isolation is enforced by the
//! database through row-level security (RLS) rather than by `WHERE` clauses
//! in application queries.
//!
//! # Architecture
//!
//! - [`tenant`] - Tenant identity, the ambient per-task tenant scope and CLI resolution
//! - [`core`] - Transaction traits the executor is generic over
//! - [`rls`] - Session binding, the tenant-scoped executor, policy DDL and phased rollout
//! - [`backends`] - The PostgreSQL backend
//! - [`catalog`] - Tenant-owned services and organization settings
//! - [`error`] - Error types for all operations
//!
//! # Tenant Scope
//!
//! A request handler establishes a tenant once; everything it awaits can then
//! read it without threading it through every call.
//!
//! ```
//! use ledgerdesk_persistence::tenant::{TenantContext, TenantId, TenantScope};
//!
//! # tokio_test::block_on(async {
//! let ctx = TenantContext::new(TenantId::new("acme"));
//! let seen = TenantScope::run(ctx, async {
//!     TenantScope::current_tenant_id().map(|t| t.to_string())
//! })
//! .await;
//!
//! assert_eq!(seen.as_deref(), Some("acme"));
//! assert!(TenantScope::current().is_none());
//! # });
//! ```
//!
//! # Scoped Work
//!
//! Database work runs through [`TenantScopedExecutor`](rls::TenantScopedExecutor),
//! which binds the tenant to a fresh transaction with
//! `SELECT set_config($1, $2, true)` and commits or rolls back as a unit.
//!
//! ```no_run
//! use ledgerdesk_persistence::backends::postgres::{PostgresBackend, PostgresConfig};
//! use ledgerdesk_persistence::catalog::{self, NewService};
//! use ledgerdesk_persistence::rls::{RlsConfig, TenantScopedExecutor};
//! use ledgerdesk_persistence::StorageError;
//!
//! # async fn example() -> Result<(), StorageError> {
//! let backend = PostgresBackend::new(PostgresConfig::default()).await?;
//! let executor = TenantScopedExecutor::new(backend, &RlsConfig::default())?;
//!
//! let service = executor
//!     .with_tenant_scope(Some("acme"), |tx| {
//!         Box::pin(async move {
//!             catalog::create_service(tx, &NewService::new("tune-up", "Tune up", 4500)).await
//!         })
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod catalog;
pub mod core;
pub mod error;
pub mod rls;
pub mod tenant;

// Re-export commonly used types at crate root
pub use error::{StorageError, StorageResult};
pub use tenant::{TenantContext, TenantId, TenantScope};

// Re-export core traits
pub use core::{ScopedTransaction, TransactionOptions, TransactionProvider};

pub use rls::{RlsConfig, TenantScopedExecutor};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
