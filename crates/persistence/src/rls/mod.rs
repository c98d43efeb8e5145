//! PostgreSQL row-level security for tenant-scoped data access.
//!
//! Every tenant-owned table carries a tenant column and a `tenant_isolation`
//! policy that compares it against a transaction-local session setting.
//! This module provides the pieces that keep that setting correct:
//!
//! - [`RlsBinder`] - Applies the tenant setting to one transaction with a
//!   single parameterized statement
//! - [`TenantScopedExecutor`] - Opens a transaction, binds the tenant, runs
//!   caller work and commits or rolls back
//! - [`BoundTransaction`] - The handle caller work receives; it can only be
//!   obtained from the executor
//! - [`RlsPolicyBuilder`] - DDL for enabling RLS on a table
//! - [`RlsRollout`] - Phased rollout of the policies to an existing database
//!
//! # Example
//!
//! ```no_run
//! use ledgerdesk_persistence::backends::postgres::{PostgresBackend, PostgresConfig};
//! use ledgerdesk_persistence::error::StorageError;
//! use ledgerdesk_persistence::rls::{RlsConfig, TenantScopedExecutor};
//!
//! # async fn example() -> Result<(), StorageError> {
//! let backend = PostgresBackend::new(PostgresConfig::default()).await?;
//! let executor = TenantScopedExecutor::new(backend, &RlsConfig::default())?;
//!
//! let count: i64 = executor
//!     .with_tenant_scope(Some("acme"), |tx| {
//!         Box::pin(async move {
//!             let row = tx.query_one("SELECT count(*) FROM services", &[]).await?;
//!             Ok::<_, StorageError>(row.get(0))
//!         })
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Caller Obligation
//!
//! The isolation guarantee holds only for statements issued through the
//! [`BoundTransaction`] handed to the work closure. A statement sent on any
//! other connection, such as a second pool checkout inside the closure,
//! runs without a tenant and sees either nothing or, for a role that
//! bypasses RLS, everything.

mod binder;
mod executor;
mod policy;
mod rollout;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use binder::{RlsBinder, SET_TENANT_SQL};
pub use executor::{BoundTransaction, ScopedFuture, TenantScopedExecutor};
pub use policy::{quote_ident, RlsPolicy, RlsPolicyBuilder, TENANT_ISOLATION_POLICY};
pub use rollout::{
    NullTenantAudit, PhaseConfig, PhaseOutcome, RlsRollout, RolloutOptions, RolloutPhase,
    RolloutReport, TableAudit, TenantTable,
};

/// Default name of the session setting read by the RLS policies.
pub const DEFAULT_TENANT_SETTING: &str = "app.current_tenant";

/// Configuration for row-level security.
///
/// # Example
///
/// ```
/// use ledgerdesk_persistence::rls::RlsConfig;
///
/// let config = RlsConfig {
///     setting_name: "app.org_id".to_string(),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RlsConfig {
    /// Session setting the policies compare the tenant column against.
    #[serde(default = "default_setting_name")]
    pub setting_name: String,

    /// Name of the tenant column in tenant-scoped tables.
    #[serde(default = "default_tenant_column")]
    pub tenant_column: String,

    /// Scopes running longer than this are logged as warnings.
    #[serde(default = "default_slow_scope_ms")]
    pub slow_scope_ms: u64,
}

fn default_setting_name() -> String {
    DEFAULT_TENANT_SETTING.to_string()
}

fn default_tenant_column() -> String {
    "tenant_id".to_string()
}

fn default_slow_scope_ms() -> u64 {
    100
}

impl Default for RlsConfig {
    fn default() -> Self {
        Self {
            setting_name: default_setting_name(),
            tenant_column: default_tenant_column(),
            slow_scope_ms: default_slow_scope_ms(),
        }
    }
}

impl RlsConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session setting name.
    pub fn with_setting_name(mut self, name: impl Into<String>) -> Self {
        self.setting_name = name.into();
        self
    }

    /// Sets the slow scope threshold.
    pub fn with_slow_scope_threshold(mut self, threshold: Duration) -> Self {
        self.slow_scope_ms = threshold.as_millis() as u64;
        self
    }

    /// Returns the slow scope threshold.
    pub fn slow_scope_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_scope_ms)
    }

    /// Validates the configuration.
    ///
    /// Custom PostgreSQL settings must be two-part names (`prefix.name`).
    /// The setting also ends up inside policy DDL, so only plain identifier
    /// characters are accepted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_setting_name(&self.setting_name)?;
        policy::validate_identifier(&self.tenant_column)?;
        Ok(())
    }
}

static SETTING_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*\.[A-Za-z_][A-Za-z0-9_]*$")
        .expect("setting name pattern is valid")
});

pub(crate) fn validate_setting_name(name: &str) -> Result<(), ValidationError> {
    if SETTING_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidField {
            field: "setting_name".to_string(),
            message: format!("'{name}' is not a two-part setting name such as app.current_tenant"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rls_config_default() {
        let config = RlsConfig::default();
        assert_eq!(config.setting_name, "app.current_tenant");
        assert_eq!(config.tenant_column, "tenant_id");
        assert_eq!(config.slow_scope_threshold(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rls_config_deserialize_defaults() {
        let config: RlsConfig = serde_json::from_str(r#"{"slow_scope_ms": 5}"#).unwrap();
        assert_eq!(config.setting_name, DEFAULT_TENANT_SETTING);
        assert_eq!(config.slow_scope_ms, 5);
    }

    #[test]
    fn test_setting_name_validation() {
        assert!(validate_setting_name("app.current_tenant").is_ok());
        assert!(validate_setting_name("current_tenant").is_err());
        assert!(validate_setting_name("app.tenant'; --").is_err());
        assert!(validate_setting_name("a.b.c").is_err());
    }

    #[test]
    fn test_tenant_column_validation() {
        let config = RlsConfig {
            tenant_column: "tenant id".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
