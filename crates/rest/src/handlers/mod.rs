//! HTTP request handlers.
//!
//! - [`health`] - Health and liveness probes
//! - [`tenant`] - The tenant the request runs under
//! - [`services`] - The tenant's service catalog
//! - [`organization`] - The tenant's organization settings

pub mod health;
pub mod organization;
pub mod services;
pub mod tenant;

pub use health::{health_handler, liveness_handler};
pub use organization::{get_organization_handler, update_organization_handler};
pub use services::{
    create_service_handler, get_service_handler, list_services_handler,
    update_service_status_handler,
};
pub use tenant::current_tenant_handler;
