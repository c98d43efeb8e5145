//! Organization settings handlers.

use axum::{Json, extract::State};
use ledgerdesk_persistence::catalog::{self, OrganizationSettings, OrganizationUpdate};
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::extractors::CurrentTenant;
use crate::state::AppState;

/// Returns the tenant's organization settings.
///
/// # HTTP Request
///
/// `GET /api/organization`
///
/// # Response
///
/// - `200 OK` - The settings row
/// - `404 Not Found` - The tenant has not been seeded
pub async fn get_organization_handler(
    State(state): State<AppState>,
    tenant: CurrentTenant,
) -> RestResult<Json<OrganizationSettings>> {
    debug!(tenant = %tenant, "Processing get organization request");

    let settings = state
        .executor()
        .with_tenant_scope(None, |tx| {
            Box::pin(async move {
                catalog::get_organization_settings(tx)
                    .await
                    .map_err(RestError::from)
            })
        })
        .await?;

    settings.map(Json).ok_or_else(|| RestError::NotFound {
        resource_type: "organization_settings".to_string(),
        id: tenant.tenant_id().to_string(),
    })
}

/// Applies a partial update to the tenant's organization settings.
///
/// # HTTP Request
///
/// `PATCH /api/organization` with any of `display_name`,
/// `default_currency`, `timezone`
pub async fn update_organization_handler(
    State(state): State<AppState>,
    Json(update): Json<OrganizationUpdate>,
) -> RestResult<Json<OrganizationSettings>> {
    debug!("Processing update organization request");

    let settings = state
        .executor()
        .with_tenant_scope(None, move |tx| {
            Box::pin(async move {
                catalog::update_organization_settings(tx, &update)
                    .await
                    .map_err(RestError::from)
            })
        })
        .await?;

    Ok(Json(settings))
}
