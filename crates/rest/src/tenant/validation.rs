//! Tenant validation for strict mode.

use ledgerdesk_persistence::tenant::TenantId;

use super::resolver::ResolvedTenant;
use super::source::TenantSource;

/// Error when tenant sources disagree in strict validation mode.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "Tenant mismatch: {} from {primary_source} conflicts with {} from {conflicting_source}",
    primary_tenant.as_str(),
    conflicting_tenant.as_str()
)]
pub struct TenantMismatchError {
    /// The tenant ID from the primary source.
    pub primary_tenant: TenantId,
    /// The primary source.
    pub primary_source: TenantSource,
    /// Conflicting tenant ID.
    pub conflicting_tenant: TenantId,
    /// Source of the conflicting tenant.
    pub conflicting_source: TenantSource,
}

/// Validates tenant consistency across sources.
pub struct TenantValidator;

impl TenantValidator {
    /// Validates that all request sources agree on the tenant ID.
    ///
    /// The configured default never conflicts; it is only used when no
    /// request source named a tenant.
    pub fn validate_consistency(resolved: &ResolvedTenant) -> Result<(), TenantMismatchError> {
        let Some((primary_source, primary_tenant)) = resolved.all_sources.first() else {
            return Ok(());
        };

        for (source, tenant_id) in resolved.all_sources.iter().skip(1) {
            if tenant_id != primary_tenant {
                return Err(TenantMismatchError {
                    primary_tenant: primary_tenant.clone(),
                    primary_source: *primary_source,
                    conflicting_tenant: tenant_id.clone(),
                    conflicting_source: *source,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(sources: Vec<(TenantSource, &str)>) -> ResolvedTenant {
        let all_sources: Vec<_> = sources
            .into_iter()
            .map(|(s, t)| (s, TenantId::new(t)))
            .collect();
        let (source, tenant_id) = all_sources
            .first()
            .cloned()
            .unwrap_or((TenantSource::Default, TenantId::new("default")));
        ResolvedTenant {
            tenant_id,
            source,
            all_sources,
        }
    }

    #[test]
    fn test_validate_single_source() {
        let r = resolved(vec![(TenantSource::Header, "acme")]);
        assert!(TenantValidator::validate_consistency(&r).is_ok());
    }

    #[test]
    fn test_validate_consistent_sources() {
        let r = resolved(vec![
            (TenantSource::Header, "acme"),
            (TenantSource::Subdomain, "acme"),
        ]);
        assert!(TenantValidator::validate_consistency(&r).is_ok());
    }

    #[test]
    fn test_validate_conflicting_sources() {
        let r = resolved(vec![
            (TenantSource::Header, "acme"),
            (TenantSource::Subdomain, "globex"),
        ]);

        let err = TenantValidator::validate_consistency(&r).unwrap_err();
        assert_eq!(err.primary_tenant.as_str(), "acme");
        assert_eq!(err.primary_source, TenantSource::Header);
        assert_eq!(err.conflicting_tenant.as_str(), "globex");
        assert_eq!(err.conflicting_source, TenantSource::Subdomain);
    }

    #[test]
    fn test_validate_default_source_only() {
        let r = resolved(vec![]);
        assert!(TenantValidator::validate_consistency(&r).is_ok());
    }

    #[test]
    fn test_error_display() {
        let err = TenantMismatchError {
            primary_tenant: TenantId::new("acme"),
            primary_source: TenantSource::Header,
            conflicting_tenant: TenantId::new("globex"),
            conflicting_source: TenantSource::Subdomain,
        };

        let msg = err.to_string();
        assert!(msg.contains("acme"));
        assert!(msg.contains("globex"));
        assert!(msg.contains("header"));
        assert!(msg.contains("subdomain"));
    }
}
