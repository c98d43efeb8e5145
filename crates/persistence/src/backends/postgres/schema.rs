//! PostgreSQL schema definitions and migrations.

use crate::error::{BackendError, StorageError, StorageResult};
use crate::rls::{RlsConfig, RlsPolicyBuilder, RolloutPhase};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Tables that carry a tenant column and an isolation policy.
pub const TENANT_TABLES: &[&str] = &["organization_settings", "services"];

/// Initialize the database schema.
pub async fn initialize_schema(
    client: &deadpool_postgres::Client,
    rls: &RlsConfig,
) -> StorageResult<()> {
    rls.validate()?;
    let current_version = get_schema_version(client).await?;

    if current_version == 0 {
        create_schema_v1(client, rls).await?;
        set_schema_version(client, 1).await?;
        migrate_schema(client, 1, rls).await?;
    } else if current_version < SCHEMA_VERSION {
        migrate_schema(client, current_version, rls).await?;
    }

    Ok(())
}

/// Get the current schema version.
pub async fn get_schema_version(client: &deadpool_postgres::Client) -> StorageResult<i32> {
    client
        .execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            )",
            &[],
        )
        .await
        .map_err(|e| pg_error(format!("Failed to create schema_version table: {}", e)))?;

    let row = client
        .query_opt("SELECT version FROM schema_version LIMIT 1", &[])
        .await
        .map_err(|e| pg_error(format!("Failed to query schema version: {}", e)))?;

    Ok(row.map(|r| r.get::<_, i32>(0)).unwrap_or(0))
}

async fn set_schema_version(client: &deadpool_postgres::Client, version: i32) -> StorageResult<()> {
    client
        .execute("DELETE FROM schema_version", &[])
        .await
        .map_err(|e| pg_error(format!("Failed to clear schema_version: {}", e)))?;

    client
        .execute(
            "INSERT INTO schema_version (version) VALUES ($1)",
            &[&version],
        )
        .await
        .map_err(|e| pg_error(format!("Failed to set schema_version: {}", e)))?;

    Ok(())
}

/// Create the initial schema (version 1).
async fn create_schema_v1(client: &deadpool_postgres::Client, rls: &RlsConfig) -> StorageResult<()> {
    // The tenant column defaults to the bound tenant so inserts need not repeat it.
    let tenant_default = format!("current_setting('{}', true)", rls.setting_name);
    let col = &rls.tenant_column;

    let organization_settings = format!(
        "CREATE TABLE IF NOT EXISTS organization_settings (
            {col} TEXT PRIMARY KEY DEFAULT {tenant_default},
            display_name TEXT NOT NULL,
            default_currency TEXT NOT NULL DEFAULT 'USD',
            timezone TEXT NOT NULL DEFAULT 'UTC',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"
    );
    client
        .execute(organization_settings.as_str(), &[])
        .await
        .map_err(|e| pg_error(format!("Failed to create organization_settings table: {}", e)))?;

    // The services tenant column is nullable so rows imported before tenancy can be audited.
    let services = format!(
        "CREATE TABLE IF NOT EXISTS services (
            id UUID PRIMARY KEY,
            {col} TEXT DEFAULT {tenant_default},
            slug TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            price_cents BIGINT NOT NULL,
            currency TEXT NOT NULL DEFAULT 'USD',
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            CONSTRAINT services_tenant_slug_key UNIQUE ({col}, slug)
        )"
    );
    client
        .execute(services.as_str(), &[])
        .await
        .map_err(|e| pg_error(format!("Failed to create services table: {}", e)))?;

    let index = format!("CREATE INDEX IF NOT EXISTS idx_services_tenant ON services ({col})");
    client
        .execute(index.as_str(), &[])
        .await
        .map_err(|e| pg_error(format!("Failed to create services tenant index: {}", e)))?;

    Ok(())
}

/// Migrate schema from one version to the next.
async fn migrate_schema(
    client: &deadpool_postgres::Client,
    from_version: i32,
    rls: &RlsConfig,
) -> StorageResult<()> {
    let mut version = from_version;

    while version < SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(client, rls).await?,
            _ => {}
        }
        version += 1;
        set_schema_version(client, version).await?;
    }

    Ok(())
}

/// v1 -> v2: install the permissive prepare-phase policies.
async fn migrate_v1_to_v2(client: &deadpool_postgres::Client, rls: &RlsConfig) -> StorageResult<()> {
    let phase = RolloutPhase::Prepare.config();

    for table in TENANT_TABLES {
        let policy = RlsPolicyBuilder::new(*table)
            .tenant_column(rls.tenant_column.clone())
            .setting_name(rls.setting_name.clone())
            .allow_null_tenant(phase.allow_null_tenant)
            .force(phase.force_rls)
            .build()
            .map_err(StorageError::from)?;

        for statement in policy.statements() {
            client.execute(statement.as_str(), &[]).await.map_err(|e| {
                pg_error(format!("Failed to install policy on {}: {}", table, e))
            })?;
        }
    }

    tracing::info!(tables = TENANT_TABLES.len(), "installed prepare-phase RLS policies");
    Ok(())
}

fn pg_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::MigrationError { message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_tables_are_valid_policy_targets() {
        let rls = RlsConfig::default();
        for table in TENANT_TABLES {
            let policy = RlsPolicyBuilder::new(*table)
                .tenant_column(rls.tenant_column.clone())
                .setting_name(rls.setting_name.clone())
                .build()
                .unwrap();
            assert_eq!(policy.table(), *table);
        }
    }

    #[test]
    fn test_pg_error_is_migration_error() {
        let err = pg_error("boom".to_string());
        assert!(matches!(
            err,
            StorageError::Backend(BackendError::MigrationError { .. })
        ));
    }
}
