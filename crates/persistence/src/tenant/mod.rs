//! Tenant management for tenant-scoped storage.
//!
//! This module provides the tenant types every other part of the crate
//! builds on.
//!
//! # Core Types
//!
//! - [`TenantId`] - Opaque tenant identifier
//! - [`TenantContext`] - Per-request or per-job tenant metadata
//! - [`TenantScope`] - Ambient carrier that makes the current context visible
//!   to nested async code without passing it around
//! - [`resolve_tenant_id`] - Tenant resolution for command line tools
//!
//! # Ambient Scope
//!
//! HTTP middleware or a CLI entry point opens a scope once; everything
//! awaited inside it can ask for the current tenant:
//!
//! ```
//! use ledgerdesk_persistence::tenant::{TenantContext, TenantId, TenantScope};
//!
//! async fn deep_inside_a_handler() -> Option<TenantId> {
//!     TenantScope::current_tenant_id()
//! }
//!
//! # tokio_test::block_on(async {
//! let ctx = TenantContext::new(TenantId::new("acme"));
//! let seen = TenantScope::run(ctx, deep_inside_a_handler()).await;
//! assert_eq!(seen.unwrap().as_str(), "acme");
//! # });
//! ```
//!
//! Absence of a scope is not an error by itself. The tenant-scoped executor
//! in [`crate::rls`] is what turns a missing tenant into
//! [`TenantError::MissingTenant`](crate::error::TenantError::MissingTenant).

mod context;
mod id;
mod resolve;
mod scope;

pub use context::{TenantContext, TenantContextBuilder};
pub use id::TenantId;
pub use resolve::{resolve_tenant_id, resolve_tenant_id_from, TenantResolveOptions};
pub use scope::TenantScope;
