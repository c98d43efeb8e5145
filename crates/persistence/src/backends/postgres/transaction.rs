//! Transaction support for PostgreSQL backend.

use async_trait::async_trait;
use deadpool_postgres::Client;
use tokio_postgres::Row;
use tokio_postgres::error::SqlState;
use tracing::warn;

use crate::core::{already_bound, ensure_rebind_allowed};
use crate::core::{ScopedTransaction, SqlParam, TransactionOptions, TransactionProvider};
use crate::error::{
    ResourceError, StorageError, StorageResult, TenantError, TransactionError,
};
use crate::tenant::TenantId;

use super::PostgresBackend;

/// Maps a driver error, turning unique violations into `AlreadyExists`.
pub(crate) fn map_pg_error(err: tokio_postgres::Error) -> StorageError {
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        let db = err.as_db_error();
        return StorageError::Resource(ResourceError::AlreadyExists {
            resource_type: db
                .and_then(|d| d.table())
                .unwrap_or("row")
                .to_string(),
            id: db
                .and_then(|d| d.constraint())
                .unwrap_or("unique key")
                .to_string(),
        });
    }
    StorageError::from(err)
}

/// A PostgreSQL transaction.
///
/// Wraps a pooled client that has an open transaction. Statements are only
/// accepted after a tenant has been bound. The transaction is rolled back
/// on drop if it was neither committed nor rolled back.
pub struct PostgresTransaction {
    client: Option<Client>,
    active: bool,
    bound: Option<TenantId>,
}

impl std::fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTransaction")
            .field("active", &self.active)
            .field("bound", &self.bound)
            .finish()
    }
}

impl PostgresTransaction {
    fn new(client: Client) -> Self {
        Self {
            client: Some(client),
            active: true,
            bound: None,
        }
    }

    fn client(&self) -> StorageResult<&Client> {
        if !self.active {
            return Err(TransactionError::InvalidTransaction.into());
        }
        self.client
            .as_ref()
            .ok_or(StorageError::Transaction(TransactionError::InvalidTransaction))
    }

    fn scoped_client(&self) -> StorageResult<&Client> {
        if self.bound.is_none() {
            return Err(TenantError::UnboundTransaction.into());
        }
        self.client()
    }

    /// Executes a statement, returning the number of rows modified.
    pub async fn execute(&self, sql: &str, params: &[SqlParam<'_>]) -> StorageResult<u64> {
        self.scoped_client()?
            .execute(sql, params)
            .await
            .map_err(map_pg_error)
    }

    /// Executes a query, returning all rows.
    pub async fn query(&self, sql: &str, params: &[SqlParam<'_>]) -> StorageResult<Vec<Row>> {
        self.scoped_client()?
            .query(sql, params)
            .await
            .map_err(map_pg_error)
    }

    /// Executes a query that must return exactly one row.
    pub async fn query_one(&self, sql: &str, params: &[SqlParam<'_>]) -> StorageResult<Row> {
        self.scoped_client()?
            .query_one(sql, params)
            .await
            .map_err(map_pg_error)
    }

    /// Executes a query that returns at most one row.
    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[SqlParam<'_>],
    ) -> StorageResult<Option<Row>> {
        self.scoped_client()?
            .query_opt(sql, params)
            .await
            .map_err(map_pg_error)
    }
}

#[async_trait]
impl ScopedTransaction for PostgresTransaction {
    async fn configure_session(&mut self, sql: &str, params: &[SqlParam<'_>]) -> StorageResult<()> {
        if let Some(bound) = &self.bound {
            return Err(already_bound(bound).into());
        }
        self.client()?.query(sql, params).await.map_err(map_pg_error)?;
        Ok(())
    }

    async fn commit(mut self) -> StorageResult<()> {
        let client = self
            .client
            .take()
            .ok_or(TransactionError::InvalidTransaction)?;
        self.active = false;

        client.batch_execute("COMMIT").await.map_err(|e| {
            StorageError::Transaction(TransactionError::CommitFailed {
                message: e.to_string(),
            })
        })
    }

    async fn rollback(mut self) -> StorageResult<()> {
        let client = self
            .client
            .take()
            .ok_or(TransactionError::InvalidTransaction)?;
        self.active = false;

        client.batch_execute("ROLLBACK").await.map_err(|e| {
            StorageError::Transaction(TransactionError::RollbackFailed {
                message: e.to_string(),
            })
        })
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

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let Some(client) = self.client.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(tenant = ?self.bound, "transaction dropped while active; rolling back");
                handle.spawn(async move {
                    if let Err(e) = client.batch_execute("ROLLBACK").await {
                        warn!(error = %e, "rollback of dropped transaction failed; discarding connection");
                        drop(Client::take(client));
                    }
                });
            }
            Err(_) => {
                // No runtime to roll back on: detach the connection from the
                // pool so it is closed instead of being reused mid-transaction.
                warn!("transaction dropped outside a runtime; discarding connection");
                drop(Client::take(client));
            }
        }
    }
}

#[async_trait]
impl TransactionProvider for PostgresBackend {
    type Transaction = PostgresTransaction;

    async fn begin(&self, options: TransactionOptions) -> StorageResult<Self::Transaction> {
        let client = self.get_client().await?;

        client
            .batch_execute(&options.begin_statement())
            .await
            .map_err(|e| {
                StorageError::Transaction(TransactionError::BeginFailed {
                    message: e.to_string(),
                })
            })?;

        Ok(PostgresTransaction::new(client))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

