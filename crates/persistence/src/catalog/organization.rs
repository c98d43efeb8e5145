//! Per-tenant organization settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use crate::error::{ResourceError, StorageError, StorageResult, ValidationError};
use crate::tenant::TenantId;

use super::{CatalogTx, validate_currency};

const SETTINGS_COLUMNS: &str = "display_name, default_currency, timezone, created_at, updated_at";

/// Settings row for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSettings {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Name shown to customers.
    pub display_name: String,
    /// Currency used for new services.
    pub default_currency: String,
    /// IANA time zone name.
    pub timezone: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl OrganizationSettings {
    fn from_row(tenant_id: &TenantId, row: &Row) -> Self {
        Self {
            tenant_id: tenant_id.clone(),
            display_name: row.get("display_name"),
            default_currency: row.get("default_currency"),
            timezone: row.get("timezone"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Partial update for [`update_organization_settings`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationUpdate {
    /// New display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// New default currency.
    #[serde(default)]
    pub default_currency: Option<String>,
    /// New time zone.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl OrganizationUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.display_name
            && name.trim().is_empty()
        {
            return Err(ValidationError::InvalidField {
                field: "display_name".to_string(),
                message: "must not be blank".to_string(),
            });
        }
        if let Some(currency) = &self.default_currency {
            validate_currency("default_currency", currency)?;
        }
        Ok(())
    }
}

/// Returns the bound tenant's settings, if the row exists.
pub async fn get_organization_settings(
    tx: &mut CatalogTx,
) -> StorageResult<Option<OrganizationSettings>> {
    let sql = format!("SELECT {SETTINGS_COLUMNS} FROM organization_settings LIMIT 1");
    let row = tx.query_opt(sql.as_str(), &[]).await?;
    Ok(row
        .as_ref()
        .map(|r| OrganizationSettings::from_row(tx.tenant_id(), r)))
}

/// Creates the settings row if missing and returns it.
pub async fn ensure_organization_settings(
    tx: &mut CatalogTx,
    display_name: &str,
) -> StorageResult<OrganizationSettings> {
    if display_name.trim().is_empty() {
        return Err(ValidationError::MissingRequiredField {
            field: "display_name".to_string(),
        }
        .into());
    }

    tx.execute(
        "INSERT INTO organization_settings (display_name) VALUES ($1) ON CONFLICT DO NOTHING",
        &[&display_name],
    )
    .await?;

    get_organization_settings(tx).await?.ok_or_else(|| not_found(tx))
}

/// Applies a partial update to the bound tenant's settings.
pub async fn update_organization_settings(
    tx: &mut CatalogTx,
    update: &OrganizationUpdate,
) -> StorageResult<OrganizationSettings> {
    update.validate()?;

    let sql = format!(
        "UPDATE organization_settings SET
            display_name = COALESCE($1, display_name),
            default_currency = COALESCE($2, default_currency),
            timezone = COALESCE($3, timezone),
            updated_at = now()
         RETURNING {SETTINGS_COLUMNS}"
    );
    let row = tx
        .query_opt(
            sql.as_str(),
            &[&update.display_name, &update.default_currency, &update.timezone],
        )
        .await?;

    row.as_ref()
        .map(|r| OrganizationSettings::from_row(tx.tenant_id(), r))
        .ok_or_else(|| not_found(tx))
}

fn not_found(tx: &CatalogTx) -> StorageError {
    StorageError::Resource(ResourceError::NotFound {
        resource_type: "organization_settings".to_string(),
        id: tx.tenant_id().to_string(),
    })
}
