//! Multi-source tenant resolution for HTTP requests.
//!
//! A request names its tenant through one of these sources, highest
//! priority first:
//!
//! - **X-Tenant-ID header**
//! - **Subdomain**: `acme.<base domain>` when a base domain is configured
//! - **Default tenant**: fallback from configuration, if any
//!
//! # Strict Validation
//!
//! When [`TenancyConfig::strict`](crate::config::TenancyConfig::strict) is
//! enabled, a request whose header and subdomain name different tenants is
//! rejected with 400 instead of silently using the header.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerdesk_rest::tenant::TenantResolver;
//! use ledgerdesk_rest::config::TenancyConfig;
//!
//! let config = TenancyConfig::default();
//! let resolver = TenantResolver::new(&config);
//!
//! if let Some(resolved) = resolver.resolve(&parts, &config)? {
//!     println!("Tenant: {} (from {})", resolved.tenant_id_str(), resolved.source);
//! }
//! ```

mod resolver;
mod source;
mod validation;

pub use resolver::{
    HeaderTenantExtractor, ResolvedTenant, SubdomainTenantExtractor, TenantResolver,
    TenantSourceExtractor,
};
pub use source::TenantSource;
pub use validation::{TenantMismatchError, TenantValidator};
