//! Recording in-memory transaction provider for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{already_bound, ensure_rebind_allowed};
use crate::core::{ScopedTransaction, SqlParam, TransactionOptions, TransactionProvider};
use crate::error::{BackendError, StorageResult, TenantError, TransactionError};
use crate::tenant::TenantId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Begin,
    Configure { sql: String, params: Vec<String> },
    Statement { tenant: TenantId, sql: String },
    Commit,
    Rollback,
}

#[derive(Clone, Default)]
pub(crate) struct RecordingProvider {
    events: Arc<Mutex<Vec<Event>>>,
    committed: Arc<Mutex<Vec<(TenantId, String)>>>,
    fail_begin: bool,
    fail_configure: bool,
    fail_commit: bool,
}

impl RecordingProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    pub(crate) fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    pub(crate) fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub(crate) fn committed_rows(&self, tenant: &str) -> Vec<String> {
        self.committed
            .lock()
            .iter()
            .filter(|(t, _)| t.as_str() == tenant)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub(crate) fn open(&self) -> RecordingTransaction {
        RecordingTransaction {
            events: self.events.clone(),
            committed: self.committed.clone(),
            staged: Vec::new(),
            bound: None,
            active: true,
            fail_configure: self.fail_configure,
            fail_commit: self.fail_commit,
        }
    }
}

#[async_trait]
impl TransactionProvider for RecordingProvider {
    type Transaction = RecordingTransaction;

    async fn begin(&self, _options: TransactionOptions) -> StorageResult<Self::Transaction> {
        if self.fail_begin {
            return Err(BackendError::ConnectionFailed {
                backend_name: "recording".to_string(),
                message: "pool closed".to_string(),
            }
            .into());
        }
        self.events.lock().push(Event::Begin);
        tokio::task::yield_now().await;
        Ok(self.open())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

pub(crate) struct RecordingTransaction {
    events: Arc<Mutex<Vec<Event>>>,
    committed: Arc<Mutex<Vec<(TenantId, String)>>>,
    staged: Vec<(TenantId, String)>,
    bound: Option<TenantId>,
    active: bool,
    fail_configure: bool,
    fail_commit: bool,
}

impl RecordingTransaction {
    /// Stages a row for the bound tenant; refuses to run unbound.
    pub(crate) async fn insert(&mut self, value: &str) -> StorageResult<()> {
        let tenant = self.bound.clone().ok_or(TenantError::UnboundTransaction)?;
        tokio::task::yield_now().await;
        self.events.lock().push(Event::Statement {
            tenant: tenant.clone(),
            sql: format!("INSERT {value}"),
        });
        self.staged.push((tenant, value.to_string()));
        Ok(())
    }

    /// Rows visible to the bound tenant, including staged ones.
    pub(crate) async fn select(&mut self) -> StorageResult<Vec<String>> {
        let tenant = self.bound.clone().ok_or(TenantError::UnboundTransaction)?;
        tokio::task::yield_now().await;
        self.events.lock().push(Event::Statement {
            tenant: tenant.clone(),
            sql: "SELECT".to_string(),
        });
        let committed = self.committed.lock();
        Ok(committed
            .iter()
            .chain(self.staged.iter())
            .filter(|(t, _)| *t == tenant)
            .map(|(_, v)| v.clone())
            .collect())
    }
}

#[async_trait]
impl ScopedTransaction for RecordingTransaction {
    async fn configure_session(&mut self, sql: &str, params: &[SqlParam<'_>]) -> StorageResult<()> {
        if let Some(bound) = &self.bound {
            return Err(already_bound(bound).into());
        }
        if self.fail_configure {
            return Err(BackendError::QueryError {
                message: "connection closed".to_string(),
            }
            .into());
        }
        let params = params.iter().map(|p| format!("{:?}", p)).collect();
        self.events.lock().push(Event::Configure {
            sql: sql.to_string(),
            params,
        });
        Ok(())
    }

    async fn commit(mut self) -> StorageResult<()> {
        self.active = false;
        if self.fail_commit {
            return Err(TransactionError::CommitFailed {
                message: "serialization failure".to_string(),
            }
            .into());
        }
        let staged = std::mem::take(&mut self.staged);
        self.committed.lock().extend(staged);
        self.events.lock().push(Event::Commit);
        Ok(())
    }

    async fn rollback(mut self) -> StorageResult<()> {
        self.active = false;
        self.staged.clear();
        self.events.lock().push(Event::Rollback);
        Ok(())
    }

    fn bound_tenant(&self) -> Option<&TenantId> {
        self.bound.as_ref()
    }

    fn mark_bound(&mut self, tenant: TenantId) -> Result<(), TenantError> {
        ensure_rebind_allowed(self.bound.as_ref(), &tenant)?;
        self.bound = Some(tenant);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
