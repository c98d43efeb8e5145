//! Tenant identifier type.
//!
//! This module defines the [`TenantId`] type, an opaque identifier for tenants.

use std::fmt;
use std::str::FromStr;

use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};

use crate::error::TenantError;

/// An opaque tenant identifier.
///
/// The value is compared byte-for-byte against the `tenant_id` column by the
/// row-level security policies, so no normalization happens beyond the
/// trimming done by [`TenantId::parse`]. Any character is allowed,
/// including quotes and semicolons; the id only ever reaches the database as
/// a bound parameter.
///
/// # Examples
///
/// ```
/// use ledgerdesk_persistence::tenant::TenantId;
///
/// let tenant = TenantId::new("acme-salon");
/// assert_eq!(tenant.as_str(), "acme-salon");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSql, FromSql)]
#[serde(transparent)]
#[postgres(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a new tenant ID from the given string, as is.
    ///
    /// # Examples
    ///
    /// ```
    /// use ledgerdesk_persistence::tenant::TenantId;
    ///
    /// let tenant = TenantId::new("my-tenant");
    /// let odd = TenantId::new("o'brien; DROP TABLE services");
    /// assert_eq!(odd.as_str(), "o'brien; DROP TABLE services");
    /// ```
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parses user supplied input into a tenant ID.
    ///
    /// Surrounding whitespace is trimmed. Empty or whitespace-only input is
    /// rejected with [`TenantError::InvalidArgument`].
    ///
    /// # Examples
    ///
    /// ```
    /// use ledgerdesk_persistence::tenant::TenantId;
    ///
    /// assert_eq!(TenantId::parse("  acme ").unwrap().as_str(), "acme");
    /// assert!(TenantId::parse("   ").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, TenantError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TenantError::InvalidArgument {
                message: "tenant id must not be empty".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the ID is empty or contains only whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Consumes the ID and returns the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl FromStr for TenantId {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TenantId::parse(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        TenantId::new(s)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        TenantId::new(s)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
