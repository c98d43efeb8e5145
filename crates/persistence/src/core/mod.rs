//! Core storage traits and abstractions.
//!
//! - [`TransactionProvider`] - Opens transactions on a backend
//! - [`ScopedTransaction`] - A transaction the RLS layer can bind to a tenant
//!
//! Application code does not use these traits directly. It goes through
//! [`TenantScopedExecutor`](crate::rls::TenantScopedExecutor), which is the
//! only place transactions are opened, bound and finished.

mod transaction;

pub use transaction::{
    IsolationLevel, ScopedTransaction, SqlParam, TransactionOptions, TransactionProvider,
};
pub(crate) use transaction::{already_bound, ensure_rebind_allowed};
