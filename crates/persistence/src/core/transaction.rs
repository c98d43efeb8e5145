//! Transaction traits for tenant-scoped work.
//!
//! Backends expose transactions through [`TransactionProvider`]. The
//! transactions they hand out implement [`ScopedTransaction`], the narrow
//! surface the RLS layer needs to bind a tenant and finish the transaction.

use async_trait::async_trait;
use tokio_postgres::types::ToSql;

use crate::error::{StorageResult, TenantError};
use crate::tenant::TenantId;

/// A borrowed, bindable SQL parameter.
pub type SqlParam<'a> = &'a (dyn ToSql + Sync);

/// Transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Read committed - sees only committed data.
    #[default]
    ReadCommitted,
    /// Repeatable read - consistent reads within transaction.
    RepeatableRead,
    /// Serializable - full isolation (may reduce concurrency).
    Serializable,
}

impl IsolationLevel {
    /// Returns the SQL keyword sequence for this level.
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsolationLevel::ReadCommitted => write!(f, "read-committed"),
            IsolationLevel::RepeatableRead => write!(f, "repeatable-read"),
            IsolationLevel::Serializable => write!(f, "serializable"),
        }
    }
}

/// Options for starting a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// The isolation level for the transaction.
    pub isolation_level: IsolationLevel,
    /// Whether this is a read-only transaction.
    pub read_only: bool,
}

impl TransactionOptions {
    /// Creates new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the isolation level.
    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// Marks this as a read-only transaction.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Renders the `BEGIN` statement for these options.
    ///
    /// ```
    /// use ledgerdesk_persistence::core::{IsolationLevel, TransactionOptions};
    ///
    /// let opts = TransactionOptions::new()
    ///     .isolation_level(IsolationLevel::Serializable)
    ///     .read_only();
    /// assert_eq!(opts.begin_statement(), "BEGIN ISOLATION LEVEL SERIALIZABLE READ ONLY");
    /// ```
    pub fn begin_statement(&self) -> String {
        let mut sql = format!("BEGIN ISOLATION LEVEL {}", self.isolation_level.as_sql());
        if self.read_only {
            sql.push_str(" READ ONLY");
        }
        sql
    }
}

/// An open database transaction that can be bound to a tenant.
///
/// Implementations own exactly one pooled connection for their lifetime.
/// A transaction that is dropped without [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) must not leave its connection inside an open
/// transaction.
#[async_trait]
pub trait ScopedTransaction: Send {
    /// Executes a session configuration statement with bound parameters.
    ///
    /// This is the only statement a transaction accepts before it has been
    /// bound, and it is refused once a tenant is bound. It is reserved for
    /// the RLS binder.
    ///
    /// # Errors
    ///
    /// * `TenantError::InvalidArgument` - the transaction is already bound
    async fn configure_session(&mut self, sql: &str, params: &[SqlParam<'_>]) -> StorageResult<()>;

    /// Commits the transaction.
    async fn commit(self) -> StorageResult<()>;

    /// Rolls back the transaction.
    async fn rollback(self) -> StorageResult<()>;

    /// Returns the tenant this transaction was bound to, if any.
    fn bound_tenant(&self) -> Option<&TenantId>;

    /// Records that the session setting for `tenant` has been applied.
    ///
    /// A transaction is bound at most once. Marking it again with the same
    /// tenant is a no-op; a different tenant is refused.
    fn mark_bound(&mut self, tenant: TenantId) -> Result<(), TenantError>;

    /// Returns whether this transaction is still active.
    fn is_active(&self) -> bool;
}

/// Checks that a transaction bound to `current` may be marked for `requested`.
pub(crate) fn ensure_rebind_allowed(
    current: Option<&TenantId>,
    requested: &TenantId,
) -> Result<(), TenantError> {
    match current {
        Some(bound) if bound != requested => Err(already_bound(bound)),
        _ => Ok(()),
    }
}

/// The error for any attempt to re-point a bound transaction.
pub(crate) fn already_bound(bound: &TenantId) -> TenantError {
    TenantError::InvalidArgument {
        message: format!("transaction is already bound to tenant {bound}"),
    }
}

/// Provider for transaction support.
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    /// The transaction type returned by this provider.
    type Transaction: ScopedTransaction;

    /// Begins a new transaction on a connection of its own.
    ///
    /// # Errors
    ///
    /// * `StorageError::Backend` - If a connection cannot be acquired
    /// * `StorageError::Transaction(BeginFailed)` - If `BEGIN` is rejected
    async fn begin(&self, options: TransactionOptions) -> StorageResult<Self::Transaction>;

    /// Returns a short name for log messages.
    fn backend_name(&self) -> &'static str;
}
