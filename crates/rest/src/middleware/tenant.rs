//! Tenant scope middleware.
//!
//! Resolves the request's tenant and runs the rest of the request inside
//! [`TenantScope::run`], so handlers and everything they await see it
//! through [`TenantScope::current`].

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ledgerdesk_persistence::tenant::{TenantContext, TenantScope};
use tracing::{Instrument, debug, info_span, warn};

use crate::error::RestError;
use crate::state::AppState;
use crate::tenant::{ResolvedTenant, TenantValidator};

/// Header naming the tenant.
pub static X_TENANT_ID: HeaderName = HeaderName::from_static("x-tenant-id");

/// Optional human-readable tenant slug.
pub static X_TENANT_SLUG: HeaderName = HeaderName::from_static("x-tenant-slug");

/// Optional caller-supplied request id; one is generated when absent.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Optional id of the acting user.
pub static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Builds the tenant context for a resolved request.
pub fn create_tenant_context(resolved: &ResolvedTenant, headers: &HeaderMap) -> TenantContext {
    let request_id = header_str(headers, &X_REQUEST_ID)
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut ctx = TenantContext::new(resolved.tenant_id.clone()).with_request_id(request_id);
    if let Some(slug) = header_str(headers, &X_TENANT_SLUG) {
        ctx = ctx.with_tenant_slug(slug);
    }
    if let Some(user) = header_str(headers, &X_USER_ID) {
        ctx = ctx.with_user_id(user);
    }
    ctx
}

/// Middleware that establishes the ambient tenant scope for a request.
///
/// Requests that name no tenant, with no default configured, continue
/// unscoped; routes that need a tenant reject them. A malformed tenant, or
/// disagreeing sources in strict mode, end the request with 400.
///
/// Install with `axum::middleware::from_fn_with_state`.
pub async fn tenant_scope_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let tenancy = &state.config().tenancy;

    let resolved = match state.resolver().resolve(&parts, tenancy) {
        Ok(resolved) => resolved,
        Err(err) => {
            warn!(path = %parts.uri.path(), error = %err, "rejected tenant");
            return err.into_response();
        }
    };

    let Some(resolved) = resolved else {
        debug!(path = %parts.uri.path(), "no tenant for request");
        return next.run(Request::from_parts(parts, body)).await;
    };

    if tenancy.strict {
        if let Err(mismatch) = TenantValidator::validate_consistency(&resolved) {
            warn!(path = %parts.uri.path(), error = %mismatch, "tenant sources disagree");
            return RestError::from(mismatch).into_response();
        }
    }

    let ctx = create_tenant_context(&resolved, &parts.headers);
    let span = info_span!(
        "tenant_scope",
        tenant = %resolved.tenant_id,
        source = %resolved.source,
        request_id = ctx.request_id().unwrap_or_default(),
    );

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(resolved);

    TenantScope::run(ctx, next.run(request)).instrument(span).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::TenantSource;
    use axum::http::HeaderValue;
    use ledgerdesk_persistence::TenantId;

    fn resolved(tenant: &str) -> ResolvedTenant {
        ResolvedTenant {
            tenant_id: TenantId::new(tenant),
            source: TenantSource::Header,
            all_sources: vec![(TenantSource::Header, TenantId::new(tenant))],
        }
    }

    #[test]
    fn test_context_from_optional_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(&X_TENANT_SLUG, HeaderValue::from_static("acme-co"));
        headers.insert(&X_USER_ID, HeaderValue::from_static("user-7"));
        headers.insert(&X_REQUEST_ID, HeaderValue::from_static("req-1"));

        let ctx = create_tenant_context(&resolved("acme"), &headers);
        assert_eq!(ctx.tenant_id().as_str(), "acme");
        assert_eq!(ctx.tenant_slug(), Some("acme-co"));
        assert_eq!(ctx.user_id(), Some("user-7"));
        assert_eq!(ctx.request_id(), Some("req-1"));
    }

    #[test]
    fn test_context_generates_request_id() {
        let ctx = create_tenant_context(&resolved("acme"), &HeaderMap::new());
        assert!(ctx.tenant_slug().is_none());
        assert!(ctx.user_id().is_none());
        let id = ctx.request_id().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }
}
