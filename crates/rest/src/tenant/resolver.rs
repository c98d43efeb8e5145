//! Tenant resolution from multiple sources.
//!
//! Provides the [`TenantResolver`] which extracts tenant information from
//! requests using the sources enabled by [`TenancyConfig`].

use axum::http::header::HOST;
use axum::http::request::Parts;
use ledgerdesk_persistence::tenant::TenantId;

use crate::config::TenancyConfig;
use crate::error::RestError;
use crate::middleware::tenant::X_TENANT_ID;

use super::source::TenantSource;

/// Subdomains that never name a tenant.
const RESERVED_SUBDOMAINS: &[&str] = &["www", "api", "app", "admin"];

/// Result of resolving a tenant from a request.
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    /// The resolved tenant ID.
    pub tenant_id: TenantId,
    /// The source from which the tenant was resolved.
    pub source: TenantSource,
    /// All request sources that named a tenant (for validation).
    pub all_sources: Vec<(TenantSource, TenantId)>,
}

impl ResolvedTenant {
    /// Returns true if the tenant was the default fallback.
    pub fn is_default(&self) -> bool {
        self.source.is_default()
    }

    /// Returns the tenant ID as a string reference.
    pub fn tenant_id_str(&self) -> &str {
        self.tenant_id.as_str()
    }
}

/// Extracts a tenant candidate from one part of the request.
pub trait TenantSourceExtractor: Send + Sync {
    /// Returns the raw candidate, if this source names a tenant at all.
    fn extract(&self, parts: &Parts, config: &TenancyConfig) -> Option<String>;

    /// Returns the source type this extractor handles.
    fn source_type(&self) -> TenantSource;
}

/// Extracts the tenant from the `X-Tenant-ID` header.
#[derive(Debug, Default)]
pub struct HeaderTenantExtractor;

impl TenantSourceExtractor for HeaderTenantExtractor {
    fn extract(&self, parts: &Parts, _config: &TenancyConfig) -> Option<String> {
        let value = parts.headers.get(&X_TENANT_ID)?;
        // Non-UTF-8 values are kept so they fail validation instead of
        // silently falling through to a lower-priority source.
        let value = String::from_utf8_lossy(value.as_bytes());
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn source_type(&self) -> TenantSource {
        TenantSource::Header
    }
}

/// Extracts the tenant from the first label of the `Host` header.
///
/// With base domain `ledgerdesk.app`, `acme.ledgerdesk.app:8080` resolves to
/// `acme`. The bare base domain and nested subdomains resolve to nothing.
#[derive(Debug, Default)]
pub struct SubdomainTenantExtractor;

impl TenantSourceExtractor for SubdomainTenantExtractor {
    fn extract(&self, parts: &Parts, config: &TenancyConfig) -> Option<String> {
        let base = config.base_domain.as_deref()?.trim().to_ascii_lowercase();

        let host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| parts.uri.host())?;
        let host = host.split(':').next()?.to_ascii_lowercase();

        let label = host.strip_suffix(base.as_str())?.strip_suffix('.')?;
        if label.is_empty() || label.contains('.') || RESERVED_SUBDOMAINS.contains(&label) {
            return None;
        }
        Some(label.to_string())
    }

    fn source_type(&self) -> TenantSource {
        TenantSource::Subdomain
    }
}

/// Resolves tenant information from multiple sources.
pub struct TenantResolver {
    extractors: Vec<Box<dyn TenantSourceExtractor>>,
}

impl TenantResolver {
    /// Creates a resolver for the sources the configuration enables.
    pub fn new(config: &TenancyConfig) -> Self {
        let mut extractors: Vec<Box<dyn TenantSourceExtractor>> =
            vec![Box::new(HeaderTenantExtractor)];

        if config.base_domain.is_some() {
            extractors.push(Box::new(SubdomainTenantExtractor));
        }

        Self { extractors }
    }

    /// Resolves the tenant from the request.
    ///
    /// Returns `Ok(None)` when no source names a tenant and no default is
    /// configured. A source that names a malformed tenant is a bad request
    /// rather than a reason to fall back to a lower-priority source.
    pub fn resolve(
        &self,
        parts: &Parts,
        config: &TenancyConfig,
    ) -> Result<Option<ResolvedTenant>, RestError> {
        let mut all_sources = Vec::new();

        for extractor in &self.extractors {
            let Some(candidate) = extractor.extract(parts, config) else {
                continue;
            };
            if !is_valid_tenant_id(&candidate) {
                return Err(RestError::BadRequest {
                    message: format!(
                        "invalid tenant id from {}: tenant ids are 1-64 letters, digits, '-' or '_'",
                        extractor.source_type()
                    ),
                });
            }
            all_sources.push((extractor.source_type(), TenantId::new(candidate)));
        }

        if let Some((source, tenant_id)) = all_sources.first().cloned() {
            return Ok(Some(ResolvedTenant {
                tenant_id,
                source,
                all_sources,
            }));
        }

        let default = config
            .default_tenant
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        Ok(default.map(|tenant| ResolvedTenant {
            tenant_id: TenantId::new(tenant),
            source: TenantSource::Default,
            all_sources,
        }))
    }
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self::new(&TenancyConfig::default())
    }
}

impl std::fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<_> = self.extractors.iter().map(|e| e.source_type()).collect();
        f.debug_struct("TenantResolver")
            .field("sources", &sources)
            .finish()
    }
}

/// Validates that a string is a usable tenant ID.
fn is_valid_tenant_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn make_parts(host: Option<&str>, tenant_header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/services");

        if let Some(host) = host {
            builder = builder.header(HOST, HeaderValue::from_str(host).unwrap());
        }
        if let Some(tenant) = tenant_header {
            builder = builder.header(&X_TENANT_ID, HeaderValue::from_str(tenant).unwrap());
        }

        builder.body(()).unwrap().into_parts().0
    }

    fn with_base_domain() -> TenancyConfig {
        TenancyConfig {
            base_domain: Some("ledgerdesk.test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_header_extractor() {
        let config = TenancyConfig::default();
        let extractor = HeaderTenantExtractor;

        let parts = make_parts(None, Some(" acme "));
        assert_eq!(extractor.extract(&parts, &config).as_deref(), Some("acme"));

        let parts = make_parts(None, Some(""));
        assert_eq!(extractor.extract(&parts, &config), None);

        let parts = make_parts(None, None);
        assert_eq!(extractor.extract(&parts, &config), None);
    }

    #[test]
    fn test_subdomain_extractor() {
        let config = with_base_domain();
        let extractor = SubdomainTenantExtractor;

        let parts = make_parts(Some("acme.ledgerdesk.test:8080"), None);
        assert_eq!(extractor.extract(&parts, &config).as_deref(), Some("acme"));

        let parts = make_parts(Some("ACME.Ledgerdesk.Test"), None);
        assert_eq!(extractor.extract(&parts, &config).as_deref(), Some("acme"));

        // Bare domain, nested labels, reserved names and foreign hosts
        for host in [
            "ledgerdesk.test",
            "a.b.ledgerdesk.test",
            "www.ledgerdesk.test",
            "acme.example.com",
            "evilledgerdesk.test",
        ] {
            let parts = make_parts(Some(host), None);
            assert_eq!(extractor.extract(&parts, &config), None, "host {host}");
        }
    }

    #[test]
    fn test_subdomain_requires_base_domain() {
        let parts = make_parts(Some("acme.ledgerdesk.test"), None);
        assert_eq!(
            SubdomainTenantExtractor.extract(&parts, &TenancyConfig::default()),
            None
        );
    }

    #[test]
    fn test_resolver_header_wins() {
        let config = with_base_domain();
        let resolver = TenantResolver::new(&config);

        let parts = make_parts(Some("globex.ledgerdesk.test"), Some("acme"));
        let resolved = resolver.resolve(&parts, &config).unwrap().unwrap();
        assert_eq!(resolved.tenant_id_str(), "acme");
        assert_eq!(resolved.source, TenantSource::Header);
        assert_eq!(resolved.all_sources.len(), 2);
    }

    #[test]
    fn test_resolver_subdomain_only() {
        let config = with_base_domain();
        let resolver = TenantResolver::new(&config);

        let parts = make_parts(Some("globex.ledgerdesk.test"), None);
        let resolved = resolver.resolve(&parts, &config).unwrap().unwrap();
        assert_eq!(resolved.tenant_id_str(), "globex");
        assert_eq!(resolved.source, TenantSource::Subdomain);
    }

    #[test]
    fn test_resolver_default_fallback() {
        let config = TenancyConfig {
            default_tenant: Some("demo".to_string()),
            ..Default::default()
        };
        let resolver = TenantResolver::new(&config);

        let resolved = resolver
            .resolve(&make_parts(None, None), &config)
            .unwrap()
            .unwrap();
        assert_eq!(resolved.tenant_id_str(), "demo");
        assert!(resolved.is_default());
        assert!(resolved.all_sources.is_empty());
    }

    #[test]
    fn test_resolver_nothing_configured() {
        let config = TenancyConfig::default();
        let resolver = TenantResolver::new(&config);
        assert!(resolver.resolve(&make_parts(None, None), &config).unwrap().is_none());
    }

    #[test]
    fn test_resolver_rejects_malformed_header() {
        let config = TenancyConfig {
            default_tenant: Some("demo".to_string()),
            ..Default::default()
        };
        let resolver = TenantResolver::new(&config);

        let parts = make_parts(None, Some("acme'; DROP TABLE services; --"));
        let err = resolver.resolve(&parts, &config).unwrap_err();
        assert!(matches!(err, RestError::BadRequest { .. }));
    }

    #[test]
    fn test_is_valid_tenant_id() {
        assert!(is_valid_tenant_id("acme"));
        assert!(is_valid_tenant_id("tenant-123"));
        assert!(is_valid_tenant_id("my_tenant"));
        assert!(!is_valid_tenant_id(""));
        assert!(!is_valid_tenant_id("tenant.com"));
        assert!(!is_valid_tenant_id("o'brien"));
        assert!(!is_valid_tenant_id(&"a".repeat(65)));
    }
}
