//! RLS session binder.

use tracing::debug;

use crate::core::{ScopedTransaction, SqlParam, ensure_rebind_allowed};
use crate::error::{TenantError, ValidationError};
use crate::tenant::TenantId;

use super::{DEFAULT_TENANT_SETTING, validate_setting_name};

/// The only statement used to bind a tenant.
///
/// Both the setting name and the tenant id are bound parameters. The third
/// argument makes the value local to the current transaction, so it is
/// discarded on commit or rollback and never reaches the next user of the
/// pooled connection.
pub const SET_TENANT_SQL: &str = "SELECT set_config($1, $2, true)";

/// Binds a tenant to a transaction's session.
///
/// ```
/// use ledgerdesk_persistence::rls::RlsBinder;
///
/// let binder = RlsBinder::default();
/// assert_eq!(binder.setting_name(), "app.current_tenant");
/// ```
#[derive(Debug, Clone)]
pub struct RlsBinder {
    setting_name: String,
}

impl RlsBinder {
    /// Creates a binder for the given session setting.
    pub fn new(setting_name: impl Into<String>) -> Result<Self, ValidationError> {
        let setting_name = setting_name.into();
        validate_setting_name(&setting_name)?;
        Ok(Self { setting_name })
    }

    /// Returns the session setting this binder writes.
    pub fn setting_name(&self) -> &str {
        &self.setting_name
    }

    /// Sets the tenant for the remainder of `tx`.
    ///
    /// Issues exactly one statement, [`SET_TENANT_SQL`], with the trimmed
    /// tenant id. A transaction is bound once: binding it again to the same
    /// tenant sends nothing, binding it to another tenant is refused.
    ///
    /// # Errors
    ///
    /// * `TenantError::InvalidArgument` - `tenant_id` is empty or whitespace,
    ///   or `tx` is already bound to a different tenant; nothing is sent to
    ///   the database
    /// * `TenantError::BindingFailed` - the database rejected the statement
    pub async fn bind<T>(&self, tx: &mut T, tenant_id: &str) -> Result<TenantId, TenantError>
    where
        T: ScopedTransaction,
    {
        let tenant_id = tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(TenantError::InvalidArgument {
                message: "cannot bind an empty tenant id".to_string(),
            });
        }

        let tenant = TenantId::new(tenant_id);
        if let Some(bound) = tx.bound_tenant() {
            ensure_rebind_allowed(Some(bound), &tenant)?;
            return Ok(tenant);
        }

        let setting: &str = &self.setting_name;
        let params: [SqlParam<'_>; 2] = [&setting, &tenant_id];

        tx.configure_session(SET_TENANT_SQL, &params)
            .await
            .map_err(|e| TenantError::BindingFailed {
                tenant_id: tenant.clone(),
                message: e.to_string(),
            })?;

        tx.mark_bound(tenant.clone())?;
        debug!(tenant = %tenant, setting = %self.setting_name, "bound tenant to transaction");

        Ok(tenant)
    }
}

impl Default for RlsBinder {
    fn default() -> Self {
        Self {
            setting_name: DEFAULT_TENANT_SETTING.to_string(),
        }
    }
}
