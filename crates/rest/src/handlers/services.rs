//! Service catalog handlers.
//!
//! Every handler runs its queries through the tenant-scoped executor with
//! the ambient tenant, so the rows it sees are those the RLS policy admits.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use ledgerdesk_persistence::catalog::{self, NewService, Service};
use serde::Deserialize;
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::state::AppState;

/// Query parameters for listing services.
#[derive(Debug, Default, Deserialize)]
pub struct ListServicesParams {
    /// Include deactivated services.
    #[serde(default)]
    pub include_inactive: bool,
}

/// Body for toggling a service.
#[derive(Debug, Deserialize)]
pub struct ServiceStatusUpdate {
    /// Whether the service can be booked.
    pub active: bool,
}

/// Lists the tenant's services.
///
/// # HTTP Request
///
/// `GET /api/services[?include_inactive=true]`
pub async fn list_services_handler(
    State(state): State<AppState>,
    Query(params): Query<ListServicesParams>,
) -> RestResult<Json<Vec<Service>>> {
    debug!(include_inactive = params.include_inactive, "Processing list services request");

    let services = state
        .executor()
        .with_tenant_scope(None, move |tx| {
            Box::pin(async move {
                catalog::list_services(tx, params.include_inactive)
                    .await
                    .map_err(RestError::from)
            })
        })
        .await?;

    Ok(Json(services))
}

/// Returns one service by slug.
///
/// # HTTP Request
///
/// `GET /api/services/{slug}`
///
/// # Response
///
/// - `200 OK` - The service
/// - `404 Not Found` - No service with this slug for the tenant
pub async fn get_service_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> RestResult<Json<Service>> {
    debug!(slug = %slug, "Processing get service request");

    let key = slug.clone();
    let found = state
        .executor()
        .with_tenant_scope(None, move |tx| {
            Box::pin(async move {
                catalog::find_service(tx, key.as_str())
                    .await
                    .map_err(RestError::from)
            })
        })
        .await?;

    found.map(Json).ok_or_else(|| RestError::NotFound {
        resource_type: "service".to_string(),
        id: slug,
    })
}

/// Creates a service for the tenant.
///
/// # HTTP Request
///
/// `POST /api/services`
///
/// # Response
///
/// - `201 Created` - The stored service, with a `Location` header
/// - `400 Bad Request` - Invalid slug, name, price or currency
/// - `409 Conflict` - The tenant already has a service with this slug
///
/// # Example
///
/// ```http
/// POST /api/services HTTP/1.1
/// X-Tenant-ID: acme
/// Content-Type: application/json
///
/// {"slug": "tune-up", "name": "Tune up", "price_cents": 4500}
/// ```
pub async fn create_service_handler(
    State(state): State<AppState>,
    Json(new): Json<NewService>,
) -> RestResult<Response> {
    debug!(slug = %new.slug, "Processing create service request");

    let service = state
        .executor()
        .with_tenant_scope(None, move |tx| {
            Box::pin(async move {
                catalog::create_service(tx, &new)
                    .await
                    .map_err(RestError::from)
            })
        })
        .await?;

    let location = format!("/api/services/{}", service.slug);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(service),
    )
        .into_response())
}

/// Activates or deactivates a service.
///
/// # HTTP Request
///
/// `PATCH /api/services/{slug}` with `{"active": false}`
pub async fn update_service_status_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(update): Json<ServiceStatusUpdate>,
) -> RestResult<Json<Service>> {
    debug!(slug = %slug, active = update.active, "Processing service status request");

    let service = state
        .executor()
        .with_tenant_scope(None, move |tx| {
            Box::pin(async move {
                catalog::set_service_active(tx, slug.as_str(), update.active)
                    .await
                    .map_err(RestError::from)
            })
        })
        .await?;

    Ok(Json(service))
}
