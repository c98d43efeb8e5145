//! Tenant source identification.

use std::fmt;

use serde::Serialize;

/// Source from which a request's tenant was taken.
///
/// Sources are listed in priority order (highest to lowest):
/// 1. `X-Tenant-ID` header
/// 2. Subdomain of the `Host` header under the configured base domain
/// 3. Default tenant from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantSource {
    /// Tenant taken from the `X-Tenant-ID` header (highest priority).
    Header,
    /// Tenant taken from the request host, e.g. `acme.ledgerdesk.app`.
    Subdomain,
    /// Default tenant from configuration (lowest priority).
    Default,
}

impl TenantSource {
    /// Returns the priority of this source (higher = more authoritative).
    pub fn priority(&self) -> u8 {
        match self {
            TenantSource::Header => 3,
            TenantSource::Subdomain => 2,
            TenantSource::Default => 1,
        }
    }

    /// Returns true if this source is the default fallback.
    pub fn is_default(&self) -> bool {
        matches!(self, TenantSource::Default)
    }
}

impl fmt::Display for TenantSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantSource::Header => write!(f, "header"),
            TenantSource::Subdomain => write!(f, "subdomain"),
            TenantSource::Default => write!(f, "default"),
        }
    }
}

impl Ord for TenantSource {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl PartialOrd for TenantSource {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_priority() {
        assert!(TenantSource::Header > TenantSource::Subdomain);
        assert!(TenantSource::Subdomain > TenantSource::Default);
    }

    #[test]
    fn test_source_display() {
        assert_eq!(TenantSource::Header.to_string(), "header");
        assert_eq!(TenantSource::Subdomain.to_string(), "subdomain");
        assert_eq!(TenantSource::Default.to_string(), "default");
    }

    #[test]
    fn test_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(TenantSource::Subdomain).unwrap(),
            serde_json::json!("subdomain")
        );
    }
}
