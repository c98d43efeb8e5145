//! Current tenant endpoint.

use axum::Json;
use tracing::debug;

use crate::extractors::CurrentTenant;

/// Returns the tenant context the request runs under.
///
/// # HTTP Request
///
/// `GET /api/tenant`
///
/// # Response
///
/// - `200 OK` - `{"tenant_id", "source", "context"}`
/// - `401 Unauthorized` - The request named no tenant
pub async fn current_tenant_handler(tenant: CurrentTenant) -> Json<serde_json::Value> {
    debug!(tenant = %tenant, "Processing current tenant request");

    Json(serde_json::json!({
        "tenant_id": tenant.tenant_id(),
        "source": tenant.source(),
        "context": tenant.context(),
    }))
}
