//! Bookable services offered by a tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::{ResourceError, StorageError, StorageResult, ValidationError};

use super::{CatalogTx, validate_currency};

const SERVICE_COLUMNS: &str =
    "id, slug, name, description, price_cents, currency, active, created_at";

/// A service as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Primary key.
    pub id: Uuid,
    /// URL-safe key, unique per tenant.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Optional long description.
    pub description: Option<String>,
    /// Price in minor currency units.
    pub price_cents: i64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Inactive services are hidden from listings by default.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Service {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            slug: row.get("slug"),
            name: row.get("name"),
            description: row.get("description"),
            price_cents: row.get("price_cents"),
            currency: row.get("currency"),
            active: row.get("active"),
            created_at: row.get("created_at"),
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Input for [`create_service`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    /// URL-safe key.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Optional long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Price in minor currency units.
    pub price_cents: i64,
    /// ISO 4217 currency code, `USD` when omitted.
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl NewService {
    /// Creates a USD service with no description.
    pub fn new(slug: impl Into<String>, name: impl Into<String>, price_cents: i64) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            description: None,
            price_cents,
            currency: default_currency(),
        }
    }

    /// Checks the fields before anything is sent to the database.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.slug.is_empty() {
            return Err(ValidationError::MissingRequiredField {
                field: "slug".to_string(),
            });
        }
        if !self
            .slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(ValidationError::InvalidField {
                field: "slug".to_string(),
                message: "only lowercase letters, digits and '-' are allowed".to_string(),
            });
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingRequiredField {
                field: "name".to_string(),
            });
        }
        if self.price_cents < 0 {
            return Err(ValidationError::InvalidField {
                field: "price_cents".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        validate_currency("currency", &self.currency)
    }
}

/// Lists the tenant's services ordered by name.
pub async fn list_services(tx: &mut CatalogTx, include_inactive: bool) -> StorageResult<Vec<Service>> {
    let sql = format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE active OR $1 ORDER BY name, slug"
    );
    let rows = tx.query(sql.as_str(), &[&include_inactive]).await?;
    Ok(rows.iter().map(Service::from_row).collect())
}

/// Finds a service by slug.
pub async fn find_service(tx: &mut CatalogTx, slug: &str) -> StorageResult<Option<Service>> {
    let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE slug = $1");
    let row = tx.query_opt(sql.as_str(), &[&slug]).await?;
    Ok(row.as_ref().map(Service::from_row))
}

/// Creates a service for the bound tenant.
///
/// # Errors
///
/// * `ValidationError` - the input is invalid; nothing is sent
/// * `ResourceError::AlreadyExists` - the tenant already has a service with this slug
pub async fn create_service(tx: &mut CatalogTx, new: &NewService) -> StorageResult<Service> {
    new.validate()?;

    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO services (id, slug, name, description, price_cents, currency)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {SERVICE_COLUMNS}"
    );
    let row = tx
        .query_one(
            sql.as_str(),
            &[
                &id,
                &new.slug,
                &new.name,
                &new.description,
                &new.price_cents,
                &new.currency,
            ],
        )
        .await
        .map_err(|e| match e {
            StorageError::Resource(ResourceError::AlreadyExists { .. }) => {
                StorageError::Resource(ResourceError::AlreadyExists {
                    resource_type: "service".to_string(),
                    id: new.slug.clone(),
                })
            }
            other => other,
        })?;

    tracing::debug!(tenant = %tx.tenant_id(), slug = %new.slug, "created service");
    Ok(Service::from_row(&row))
}

/// Activates or deactivates a service.
pub async fn set_service_active(tx: &mut CatalogTx, slug: &str, active: bool) -> StorageResult<Service> {
    let sql = format!("UPDATE services SET active = $2 WHERE slug = $1 RETURNING {SERVICE_COLUMNS}");
    let row = tx.query_opt(sql.as_str(), &[&slug, &active]).await?;
    row.as_ref()
        .map(Service::from_row)
        .ok_or_else(|| {
            StorageError::Resource(ResourceError::NotFound {
                resource_type: "service".to_string(),
                id: slug.to_string(),
            })
        })
}
