//! Ambient tenant scope.
//!
//! [`TenantScope`] associates a [`TenantContext`] with the logical flow of
//! one unit of work. It is backed by a tokio task-local, so concurrent units
//! of work interleaving on the same runtime threads never observe each
//! other's context.
//!
//! ```
//! use ledgerdesk_persistence::tenant::{TenantContext, TenantId, TenantScope};
//!
//! # tokio_test::block_on(async {
//! assert!(TenantScope::current().is_none());
//!
//! let tenant = TenantScope::run(TenantContext::new(TenantId::new("acme")), async {
//!     tokio::task::yield_now().await;
//!     TenantScope::current_tenant_id()
//! })
//! .await;
//!
//! assert_eq!(tenant, Some(TenantId::new("acme")));
//! assert!(TenantScope::current().is_none());
//! # });
//! ```

use std::future::Future;

use tokio::task::JoinHandle;

use super::context::TenantContext;
use super::id::TenantId;

tokio::task_local! {
    static CURRENT_TENANT: TenantContext;
}

/// Entry point to the ambient tenant context.
///
/// Task-locals are not inherited by `tokio::spawn`; use
/// [`TenantScope::spawn`] to carry the current context into a new task.
pub struct TenantScope;

impl TenantScope {
    /// Runs `future` with `ctx` as the ambient tenant context.
    ///
    /// The context is visible to everything awaited inside `future`, on any
    /// worker thread, and is gone once `future` completes, fails or is
    /// dropped. A nested `run` shadows the outer context for its own extent
    /// only.
    pub async fn run<F>(ctx: TenantContext, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TENANT.scope(ctx, future).await
    }

    /// Synchronous variant of [`TenantScope::run`].
    pub fn sync_run<R>(ctx: TenantContext, f: impl FnOnce() -> R) -> R {
        CURRENT_TENANT.sync_scope(ctx, f)
    }

    /// Returns a copy of the active context, or `None` outside any scope.
    pub fn current() -> Option<TenantContext> {
        CURRENT_TENANT.try_with(|ctx| ctx.clone()).ok()
    }

    /// Returns the tenant of the active context, or `None` outside any scope.
    pub fn current_tenant_id() -> Option<TenantId> {
        CURRENT_TENANT.try_with(|ctx| ctx.tenant_id().clone()).ok()
    }

    /// Spawns `future` on the tokio runtime inside the caller's current scope.
    ///
    /// Without an active scope the task runs with none.
    pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match Self::current() {
            Some(ctx) => tokio::spawn(CURRENT_TENANT.scope(ctx, future)),
            None => tokio::spawn(future),
        }
    }
}
