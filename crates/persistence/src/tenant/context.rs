//! Tenant context for a unit of work.
//!
//! This module defines [`TenantContext`], the value carried through the
//! ambient tenant scope for the duration of a request or job.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::id::TenantId;
use crate::error::{TenantError, ValidationError};

/// The tenant context associated with one unit of work.
///
/// A context always carries a tenant id. Everything else is optional
/// metadata gathered by whoever opened the scope (an HTTP request, a CLI
/// invocation, a background job) and is used for auditing and logging.
///
/// ```
/// use ledgerdesk_persistence::tenant::{TenantContext, TenantId};
///
/// let ctx = TenantContext::new(TenantId::new("acme"))
///     .with_request_id("req-1")
///     .with_user_id("user-7");
///
/// assert_eq!(ctx.tenant_id().as_str(), "acme");
/// assert_eq!(ctx.request_id(), Some("req-1"));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct TenantContext {
    tenant_id: TenantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_role: Option<String>,
    is_super_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    started_at: DateTime<Utc>,
}

impl TenantContext {
    /// Creates a new context for the given tenant, stamped with the current time.
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            tenant_slug: None,
            user_id: None,
            role: None,
            tenant_role: None,
            is_super_admin: false,
            request_id: None,
            started_at: Utc::now(),
        }
    }

    /// Sets the human readable tenant slug.
    pub fn with_tenant_slug(mut self, slug: impl Into<String>) -> Self {
        self.tenant_slug = Some(slug.into());
        self
    }

    /// Sets the user ID for auditing.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the global role of the user.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Sets the role the user holds inside this tenant.
    pub fn with_tenant_role(mut self, role: impl Into<String>) -> Self {
        self.tenant_role = Some(role.into());
        self
    }

    /// Marks the context as belonging to a super administrator.
    pub fn with_super_admin(mut self, is_super_admin: bool) -> Self {
        self.is_super_admin = is_super_admin;
        self
    }

    /// Sets the request ID for tracing.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Returns the tenant ID.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the tenant slug, if set.
    pub fn tenant_slug(&self) -> Option<&str> {
        self.tenant_slug.as_deref()
    }

    /// Returns the user ID, if set.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the global role, if set.
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Returns the tenant role, if set.
    pub fn tenant_role(&self) -> Option<&str> {
        self.tenant_role.as_deref()
    }

    /// Returns `true` for super administrator contexts.
    pub fn is_super_admin(&self) -> bool {
        self.is_super_admin
    }

    /// Returns the request ID, if set.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Returns when the context was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Checks if this context can access rows belonging to the given tenant.
    ///
    /// Access is allowed if:
    /// 1. The row tenant matches this context's tenant
    /// 2. The context belongs to a super administrator
    ///
    /// ```
    /// use ledgerdesk_persistence::tenant::{TenantContext, TenantId};
    ///
    /// let ctx = TenantContext::new(TenantId::new("a"));
    /// assert!(ctx.check_access(&TenantId::new("a")).is_ok());
    /// assert!(ctx.check_access(&TenantId::new("b")).is_err());
    /// ```
    pub fn check_access(&self, resource_tenant: &TenantId) -> Result<(), TenantError> {
        if &self.tenant_id == resource_tenant || self.is_super_admin {
            return Ok(());
        }

        Err(TenantError::AccessDenied {
            tenant_id: self.tenant_id.clone(),
            resource_tenant: resource_tenant.clone(),
        })
    }
}

/// Builder for creating tenant contexts from external input
/// (e.g., HTTP headers, CLI arguments).
#[derive(Debug, Default)]
pub struct TenantContextBuilder {
    tenant_id: Option<TenantId>,
    tenant_slug: Option<String>,
    user_id: Option<String>,
    role: Option<String>,
    tenant_role: Option<String>,
    is_super_admin: bool,
    request_id: Option<String>,
}

impl TenantContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tenant ID.
    pub fn tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Sets the tenant ID from a string.
    pub fn tenant_id_str(mut self, tenant_id: &str) -> Self {
        self.tenant_id = Some(TenantId::new(tenant_id));
        self
    }

    /// Sets the tenant slug.
    pub fn tenant_slug(mut self, slug: impl Into<String>) -> Self {
        self.tenant_slug = Some(slug.into());
        self
    }

    /// Sets the user ID.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the global role.
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Sets the tenant role.
    pub fn tenant_role(mut self, role: impl Into<String>) -> Self {
        self.tenant_role = Some(role.into());
        self
    }

    /// Sets the super administrator flag.
    pub fn super_admin(mut self, is_super_admin: bool) -> Self {
        self.is_super_admin = is_super_admin;
        self
    }

    /// Sets the request ID.
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Builds the tenant context, returning an error if the tenant is missing or blank.
    pub fn build(self) -> Result<TenantContext, ValidationError> {
        let tenant_id = self
            .tenant_id
            .filter(|id| !id.is_blank())
            .ok_or_else(|| ValidationError::MissingRequiredField {
                field: "tenant_id".to_string(),
            })?;

        let mut ctx = TenantContext::new(tenant_id).with_super_admin(self.is_super_admin);
        ctx.tenant_slug = self.tenant_slug;
        ctx.user_id = self.user_id;
        ctx.role = self.role;
        ctx.tenant_role = self.tenant_role;
        ctx.request_id = self.request_id;

        Ok(ctx)
    }
}
