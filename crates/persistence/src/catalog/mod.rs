//! Tenant-owned catalog data.
//!
//! Every function here takes a [`BoundTransaction`](crate::rls::BoundTransaction)
//! and therefore only runs inside
//! [`TenantScopedExecutor::with_tenant_scope`](crate::rls::TenantScopedExecutor::with_tenant_scope).
//! None of the queries filter by tenant themselves; the `tenant_isolation`
//! policy does that, and new rows take their tenant from the session setting.

mod organization;
mod services;

use crate::backends::postgres::PostgresTransaction;
use crate::rls::BoundTransaction;

pub use organization::{
    OrganizationSettings, OrganizationUpdate, ensure_organization_settings,
    get_organization_settings, update_organization_settings,
};
pub use services::{
    NewService, Service, create_service, find_service, list_services, set_service_active,
};

/// Transaction type accepted by the catalog functions.
pub type CatalogTx = BoundTransaction<PostgresTransaction>;

pub(crate) fn validate_currency(field: &str, currency: &str) -> Result<(), crate::error::ValidationError> {
    if currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(crate::error::ValidationError::InvalidField {
            field: field.to_string(),
            message: format!("'{currency}' is not a three-letter ISO 4217 code"),
        })
    }
}
