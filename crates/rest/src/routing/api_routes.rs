//! API route configuration.

use axum::{Router, middleware, routing::get};

use crate::handlers;
use crate::middleware::tenant_scope_middleware;
use crate::state::AppState;

/// Creates all API routes.
///
/// # Routes
///
/// ## Unscoped
/// - `GET /health` - Database health check
/// - `GET /_liveness` - Liveness probe
///
/// ## Tenant-scoped
/// - `GET /api/tenant` - The current tenant context
/// - `GET /api/services` - List services
/// - `POST /api/services` - Create a service
/// - `GET /api/services/{slug}` - Read a service
/// - `PATCH /api/services/{slug}` - Activate or deactivate a service
/// - `GET /api/organization` - Organization settings
/// - `PATCH /api/organization` - Update organization settings
///
/// Every route runs behind [`tenant_scope_middleware`]; the probes simply
/// never ask for the tenant.
pub fn create_routes(state: AppState) -> Router {
    let api = Router::new()
        .route("/tenant", get(handlers::current_tenant_handler))
        .route(
            "/services",
            get(handlers::list_services_handler).post(handlers::create_service_handler),
        )
        .route(
            "/services/{slug}",
            get(handlers::get_service_handler).patch(handlers::update_service_status_handler),
        )
        .route(
            "/organization",
            get(handlers::get_organization_handler).patch(handlers::update_organization_handler),
        );

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/_liveness", get(handlers::liveness_handler))
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_scope_middleware,
        ))
        .with_state(state)
}
