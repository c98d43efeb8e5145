//! Tenant context extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use ledgerdesk_persistence::tenant::{TenantContext, TenantScope};

use crate::error::RestError;
use crate::tenant::{ResolvedTenant, TenantSource};

/// Axum extractor for the ambient tenant context.
///
/// Reads the scope established by
/// [`tenant_scope_middleware`](crate::middleware::tenant_scope_middleware)
/// and rejects with 401 when the request runs unscoped.
///
/// # Example
///
/// ```rust,ignore
/// use ledgerdesk_rest::extractors::CurrentTenant;
///
/// async fn handler(tenant: CurrentTenant) {
///     println!("Tenant ID: {}", tenant.tenant_id());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentTenant {
    context: TenantContext,
    source: Option<TenantSource>,
}

impl CurrentTenant {
    /// Returns a reference to the tenant context.
    pub fn context(&self) -> &TenantContext {
        &self.context
    }

    /// Returns the tenant ID as a string.
    pub fn tenant_id(&self) -> &str {
        self.context.tenant_id().as_str()
    }

    /// Returns where the tenant was taken from, when known.
    pub fn source(&self) -> Option<TenantSource> {
        self.source
    }

    /// Consumes the extractor and returns the tenant context.
    pub fn into_context(self) -> TenantContext {
        self.context
    }
}

impl std::fmt::Display for CurrentTenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tenant_id())
    }
}

impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = TenantScope::current().ok_or_else(|| RestError::Unauthorized {
            message: "no tenant: send an X-Tenant-ID header".to_string(),
        })?;
        let source = parts.extensions.get::<ResolvedTenant>().map(|r| r.source);

        Ok(Self { context, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use ledgerdesk_persistence::TenantId;

    fn parts() -> Parts {
        Request::builder().uri("/").body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_rejects_without_scope() {
        let mut parts = parts();
        let err = CurrentTenant::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, RestError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_reads_ambient_scope() {
        let mut parts = parts();
        let ctx = TenantContext::new(TenantId::new("acme"));

        let tenant = TenantScope::run(ctx, CurrentTenant::from_request_parts(&mut parts, &()))
            .await
            .unwrap();
        assert_eq!(tenant.tenant_id(), "acme");
        assert_eq!(tenant.to_string(), "acme");
        assert!(tenant.source().is_none());
    }
}
