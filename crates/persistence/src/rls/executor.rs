//! Transactional tenant-scoped executor.

use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::core::{ScopedTransaction, TransactionOptions, TransactionProvider};
use crate::error::{StorageError, TenantError, ValidationError};
use crate::tenant::{TenantId, TenantScope};

use super::{RlsBinder, RlsConfig};

/// Boxed future returned by work closures, borrowing the bound transaction.
pub type ScopedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A transaction whose session has been bound to a tenant.
///
/// Values of this type only exist inside
/// [`TenantScopedExecutor::with_tenant_scope`]. Functions that issue
/// tenant-scoped statements take `&mut BoundTransaction<_>`, so they cannot
/// be called with a connection that skipped the binder. The inner
/// transaction refuses to be bound again, so the tenant stays fixed for the
/// whole scope.
pub struct BoundTransaction<T> {
    inner: T,
    tenant_id: TenantId,
}

impl<T> BoundTransaction<T> {
    /// Returns the tenant the transaction is bound to.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    fn into_parts(self) -> (T, TenantId) {
        (self.inner, self.tenant_id)
    }
}

impl<T> Deref for BoundTransaction<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for BoundTransaction<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> std::fmt::Debug for BoundTransaction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundTransaction")
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

/// Runs work inside a transaction bound to one tenant.
///
/// This is the sanctioned entry point for tenant-scoped database work. For
/// each call it:
///
/// 1. resolves the tenant from the explicit argument or the ambient
///    [`TenantScope`], failing with `MissingTenant` before touching the
///    database when neither is present
/// 2. opens a transaction
/// 3. binds the tenant with [`RlsBinder`], rolling back if that fails
/// 4. runs the work with the [`BoundTransaction`]
/// 5. commits on `Ok`, rolls back on `Err`
///
/// Errors returned by the work are passed through unchanged. Executor
/// failures are converted with `E: From<StorageError>`.
pub struct TenantScopedExecutor<P> {
    provider: P,
    binder: RlsBinder,
    options: TransactionOptions,
    slow_threshold: Duration,
}

impl<P: TransactionProvider> TenantScopedExecutor<P> {
    /// Creates an executor over `provider` using the given RLS configuration.
    pub fn new(provider: P, config: &RlsConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            provider,
            binder: RlsBinder::new(config.setting_name.clone())?,
            options: TransactionOptions::default(),
            slow_threshold: config.slow_scope_threshold(),
        })
    }

    /// Creates an executor from an existing binder.
    pub fn with_binder(provider: P, binder: RlsBinder) -> Self {
        Self {
            provider,
            binder,
            options: TransactionOptions::default(),
            slow_threshold: RlsConfig::default().slow_scope_threshold(),
        }
    }

    /// Sets the options used to begin every transaction.
    pub fn with_options(mut self, options: TransactionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the duration after which a scope is logged as slow.
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Returns the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the binder.
    pub fn binder(&self) -> &RlsBinder {
        &self.binder
    }

    /// Runs `work` in a new transaction bound to the effective tenant.
    ///
    /// `tenant` takes precedence when it is non-blank; otherwise the tenant
    /// of the ambient [`TenantScope`] is used.
    ///
    /// All statements must go through the `&mut BoundTransaction` passed to
    /// `work`. Anything issued on another connection is not tenant scoped.
    ///
    /// If the returned future is dropped before completion the transaction
    /// is abandoned and the backend rolls it back when it is dropped.
    pub async fn with_tenant_scope<T, E, F>(&self, tenant: Option<&str>, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut BoundTransaction<P::Transaction>) -> ScopedFuture<'t, Result<T, E>>
            + Send,
        T: Send,
        E: From<StorageError> + Send,
    {
        let tenant_id = resolve_effective_tenant(tenant).map_err(|e| E::from(StorageError::from(e)))?;
        let started = Instant::now();

        let mut tx = self.provider.begin(self.options).await.map_err(E::from)?;

        let tenant_id = match self.binder.bind(&mut tx, tenant_id.as_str()).await {
            Ok(bound) => bound,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed tenant binding failed");
                }
                return Err(E::from(StorageError::from(err)));
            }
        };

        let mut bound = BoundTransaction {
            inner: tx,
            tenant_id,
        };
        let outcome = work(&mut bound).await;
        let (tx, tenant_id) = bound.into_parts();

        let result = match outcome {
            Ok(value) => tx.commit().await.map(|()| value).map_err(E::from),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(tenant = %tenant_id, error = %rollback_err, "rollback after failed work failed");
                }
                Err(err)
            }
        };

        let elapsed = started.elapsed();
        if elapsed > self.slow_threshold {
            warn!(
                tenant = %tenant_id,
                backend = self.provider.backend_name(),
                elapsed_ms = elapsed.as_millis() as u64,
                "slow tenant scope"
            );
        } else {
            debug!(tenant = %tenant_id, elapsed_ms = elapsed.as_millis() as u64, "tenant scope finished");
        }

        result
    }
}

impl<P> std::fmt::Debug for TenantScopedExecutor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantScopedExecutor")
            .field("binder", &self.binder)
            .field("options", &self.options)
            .field("slow_threshold", &self.slow_threshold)
            .finish_non_exhaustive()
    }
}

fn resolve_effective_tenant(explicit: Option<&str>) -> Result<TenantId, TenantError> {
    if let Some(tenant) = explicit.and_then(|t| TenantId::parse(t).ok()) {
        return Ok(tenant);
    }

    TenantScope::current_tenant_id().ok_or_else(|| TenantError::MissingTenant {
        hint: "pass a tenant id or run inside a tenant scope".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ResourceError;
    use crate::rls::testing::{Event, RecordingProvider, RecordingTransaction};
    use crate::rls::SET_TENANT_SQL;
    use crate::tenant::TenantContext;

    fn executor(provider: &RecordingProvider) -> TenantScopedExecutor<RecordingProvider> {
        TenantScopedExecutor::new(provider.clone(), &RlsConfig::default()).unwrap()
    }

    fn configure(tenant: &str) -> Event {
        Event::Configure {
            sql: SET_TENANT_SQL.to_string(),
            params: vec![r#""app.current_tenant""#.to_string(), format!("{:?}", tenant)],
        }
    }

    fn statement(tenant: &str, sql: &str) -> Event {
        Event::Statement {
            tenant: TenantId::new(tenant),
            sql: sql.to_string(),
        }
    }

    #[tokio::test]
    async fn test_binding_happens_before_work_and_commits() {
        let provider = RecordingProvider::new();
        let exec = executor(&provider);

        let tenant = exec
            .with_tenant_scope(Some("acme"), |tx| {
                Box::pin(async move {
                    tx.insert("row-1").await?;
                    Ok::<_, StorageError>(tx.tenant_id().clone())
                })
            })
            .await
            .unwrap();

        assert_eq!(tenant.as_str(), "acme");
        assert_eq!(
            provider.events(),
            vec![
                Event::Begin,
                configure("acme"),
                statement("acme", "INSERT row-1"),
                Event::Commit,
            ]
        );
        assert_eq!(provider.committed_rows("acme"), vec!["row-1".to_string()]);
    }

    #[tokio::test]
    async fn test_work_cannot_rebind_to_another_tenant() {
        let provider = RecordingProvider::new();
        let exec = executor(&provider);

        exec.with_tenant_scope(Some("acme"), |tx| {
            Box::pin(async move {
                let err = RlsBinder::default().bind(&mut **tx, "other").await.unwrap_err();
                assert!(matches!(err, TenantError::InvalidArgument { .. }));

                let setting: &str = "app.current_tenant";
                let other: &str = "other";
                let params: [crate::core::SqlParam<'_>; 2] = [&setting, &other];
                assert!(tx.configure_session(SET_TENANT_SQL, &params).await.is_err());
                assert!(tx.mark_bound(TenantId::new("other")).is_err());

                tx.insert("row-1").await?;
                assert_eq!(tx.tenant_id().as_str(), "acme");
                assert_eq!(tx.bound_tenant(), Some(&TenantId::new("acme")));
                Ok::<_, StorageError>(())
            })
        })
        .await
        .unwrap();

        assert_eq!(
            provider.events(),
            vec![
                Event::Begin,
                configure("acme"),
                statement("acme", "INSERT row-1"),
                Event::Commit,
            ]
        );
        assert_eq!(provider.committed_rows("acme"), vec!["row-1".to_string()]);
        assert!(provider.committed_rows("other").is_empty());
    }

    #[tokio::test]
    async fn test_custom_binder_and_threshold() {
        let provider = RecordingProvider::new();
        let exec = TenantScopedExecutor::with_binder(
            provider.clone(),
            RlsBinder::new("app.org_id").unwrap(),
        )
        .with_slow_threshold(Duration::ZERO);

        assert_eq!(exec.binder().setting_name(), "app.org_id");

        exec.with_tenant_scope(Some("acme"), |tx| Box::pin(async move { tx.insert("row").await }))
            .await
            .unwrap();

        assert_eq!(
            provider.events()[1],
            Event::Configure {
                sql: SET_TENANT_SQL.to_string(),
                params: vec![r#""app.org_id""#.to_string(), r#""acme""#.to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_work_sees_bound_transaction() {
        let provider = RecordingProvider::new();
        let exec = executor(&provider);

        exec.with_tenant_scope(Some("acme"), |tx| {
            Box::pin(async move {
                assert_eq!(tx.bound_tenant(), Some(&TenantId::new("acme")));
                Ok::<_, StorageError>(())
            })
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_failed_work_rolls_back_and_passes_error_through() {
        #[derive(Debug, PartialEq)]
        enum AppError {
            Storage(String),
            Boom(u32),
        }

        impl From<StorageError> for AppError {
            fn from(err: StorageError) -> Self {
                AppError::Storage(err.to_string())
            }
        }

        let provider = RecordingProvider::new();
        let exec = executor(&provider);

        let err = exec
            .with_tenant_scope(Some("acme"), |tx| {
                Box::pin(async move {
                    tx.insert("row-x").await?;
                    Err::<(), _>(AppError::Boom(7))
                })
            })
            .await
            .unwrap_err();

        assert_eq!(err, AppError::Boom(7));
        assert_eq!(provider.events().last(), Some(&Event::Rollback));
        assert!(provider.committed_rows("acme").is_empty());

        let visible = exec
            .with_tenant_scope(Some("acme"), |tx| Box::pin(async move { tx.select().await }))
            .await
            .unwrap();
        assert!(visible.is_empty());
    }

    #[tokio::test]
    async fn test_missing_tenant_never_invokes_work() {
        let provider = RecordingProvider::new();
        let exec = executor(&provider);
        let calls = Arc::new(AtomicUsize::new(0));

        for explicit in [None, Some(""), Some("   ")] {
            let counter = calls.clone();
            let err = exec
                .with_tenant_scope(explicit, move |_tx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Box::pin(async move { Ok::<_, StorageError>(()) })
                })
                .await
                .unwrap_err();
            assert!(err.is_missing_tenant());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(provider.events().is_empty());
    }

    #[tokio::test]
    async fn test_ambient_tenant_is_used_when_not_explicit() {
        let provider = RecordingProvider::new();
        let exec = executor(&provider);

        let ctx = TenantContext::new(TenantId::new("ambient"));
        let tenant = TenantScope::run(ctx, async {
            exec.with_tenant_scope(None, |tx| {
                Box::pin(async move { Ok::<_, StorageError>(tx.tenant_id().clone()) })
            })
            .await
        })
        .await
        .unwrap();

        assert_eq!(tenant.as_str(), "ambient");
    }

    #[tokio::test]
    async fn test_explicit_tenant_overrides_ambient() {
        let provider = RecordingProvider::new();
        let exec = executor(&provider);

        let ctx = TenantContext::new(TenantId::new("ambient"));
        let tenant = TenantScope::run(ctx, async {
            exec.with_tenant_scope(Some(" explicit "), |tx| {
                Box::pin(async move { Ok::<_, StorageError>(tx.tenant_id().clone()) })
            })
            .await
        })
        .await
        .unwrap();

        assert_eq!(tenant.as_str(), "explicit");
    }

    #[tokio::test]
    async fn test_blank_ambient_tenant_is_invalid_argument() {
        let provider = RecordingProvider::new();
        let exec = executor(&provider);

        let ctx = TenantContext::new(TenantId::new("  "));
        let err = TenantScope::run(ctx, async {
            exec.with_tenant_scope(None, |_tx| Box::pin(async move { Ok::<_, StorageError>(()) }))
                .await
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            StorageError::Tenant(TenantError::InvalidArgument { .. })
        ));
        assert_eq!(provider.events(), vec![Event::Begin, Event::Rollback]);
    }

    #[tokio::test]
    async fn test_binding_failure_rolls_back_without_work() {
        let provider = RecordingProvider::new().failing_configure();
        let exec = executor(&provider);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let err = exec
            .with_tenant_scope(Some("acme"), move |_tx| {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move { Ok::<_, StorageError>(()) })
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::Tenant(TenantError::BindingFailed { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.events(), vec![Event::Begin, Event::Rollback]);
    }

    #[tokio::test]
    async fn test_begin_failure_is_reported() {
        let provider = RecordingProvider::new().failing_begin();
        let exec = executor(&provider);

        let err = exec
            .with_tenant_scope(Some("acme"), |_tx| Box::pin(async move { Ok::<_, StorageError>(()) }))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Backend(_)));
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported() {
        let provider = RecordingProvider::new().failing_commit();
        let exec = executor(&provider);

        let err = exec
            .with_tenant_scope(Some("acme"), |tx| {
                Box::pin(async move {
                    tx.insert("row-1").await?;
                    Ok::<_, StorageError>(())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Transaction(_)));
        assert!(provider.committed_rows("acme").is_empty());
    }

    #[tokio::test]
    async fn test_quote_tenant_keeps_statement_shape() {
        let provider = RecordingProvider::new();
        let exec = executor(&provider);

        exec.with_tenant_scope(Some("o'brien-tenant"), |tx| {
            Box::pin(async move { tx.insert("row").await })
        })
        .await
        .unwrap();

        assert_eq!(provider.events()[1], configure("o'brien-tenant"));
        assert_eq!(provider.committed_rows("o'brien-tenant"), vec!["row".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_scopes_are_isolated() {
        let provider = RecordingProvider::new();
        let exec = Arc::new(executor(&provider));

        let mut handles = Vec::new();
        for i in 0..16 {
            let exec = exec.clone();
            handles.push(tokio::spawn(async move {
                let tenant = if i % 2 == 0 { "tenant-a" } else { "tenant-b" };
                let row = format!("{tenant}-{i}");
                exec.with_tenant_scope(Some(tenant), move |tx| {
                    Box::pin(async move {
                        tx.insert(&row).await?;
                        let seen = tx.select().await?;
                        assert!(seen.iter().all(|r| r.starts_with(tenant)));
                        Ok::<_, StorageError>(())
                    })
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(provider.committed_rows("tenant-a").len(), 8);
        assert_eq!(provider.committed_rows("tenant-b").len(), 8);
    }

    #[tokio::test]
    async fn test_domain_error_conversion() {
        let provider = RecordingProvider::new();
        let exec = executor(&provider);

        let err = exec
            .with_tenant_scope(Some("acme"), |_tx: &mut BoundTransaction<RecordingTransaction>| {
                Box::pin(async move {
                    Err::<(), StorageError>(
                        ResourceError::NotFound {
                            resource_type: "service".to_string(),
                            id: "x".to_string(),
                        }
                        .into(),
                    )
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Resource(ResourceError::NotFound { .. })));
    }
}
