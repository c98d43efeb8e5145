//! Server configuration for the Ledgerdesk HTTP API.
//!
//! Configuration comes from command line arguments, environment variables
//! or code, in that order of precedence.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LEDGERDESK_PORT` | 8080 | Server port |
//! | `LEDGERDESK_HOST` | 127.0.0.1 | Host to bind |
//! | `LEDGERDESK_LOG_LEVEL` | info | Log level |
//! | `LEDGERDESK_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `LEDGERDESK_ENABLE_CORS` | true | Enable CORS |
//! | `LEDGERDESK_CORS_ORIGINS` | * | Allowed origins |
//! | `LEDGERDESK_CORS_METHODS` | GET,POST,PATCH,OPTIONS | Allowed methods |
//! | `LEDGERDESK_CORS_HEADERS` | Content-Type,Authorization,Accept,X-Tenant-ID,... | Allowed headers |
//! | `DATABASE_URL` | - | PostgreSQL connection string |
//! | `LEDGERDESK_TENANT_SETTING` | app.current_tenant | Session setting read by the RLS policies |
//! | `LEDGERDESK_TENANT_COLUMN` | tenant_id | Tenant column of tenant-scoped tables |
//! | `LEDGERDESK_BASE_DOMAIN` | - | Domain whose subdomains name tenants |
//! | `LEDGERDESK_STRICT_TENANT` | false | Reject requests whose tenant sources disagree |
//! | `LEDGERDESK_DEFAULT_TENANT` | - | Tenant for requests that name none |
//!
//! # Example
//!
//! ```rust
//! use ledgerdesk_rest::ServerConfig;
//!
//! let config = ServerConfig {
//!     port: 3000,
//!     host: "0.0.0.0".to_string(),
//!     ..Default::default()
//! };
//! assert_eq!(config.socket_addr(), "0.0.0.0:3000");
//! ```

use clap::{Args, Parser};
use ledgerdesk_persistence::rls::{DEFAULT_TENANT_SETTING, RlsConfig};

/// Server configuration for the HTTP API.
#[derive(Debug, Clone, Parser)]
#[command(name = "ledgerdesk")]
#[command(about = "Ledgerdesk tenant-scoped API server")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "LEDGERDESK_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "LEDGERDESK_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "LEDGERDESK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout in seconds.
    #[arg(long, env = "LEDGERDESK_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "LEDGERDESK_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "LEDGERDESK_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(long, env = "LEDGERDESK_CORS_METHODS", default_value = DEFAULT_CORS_METHODS)]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(long, env = "LEDGERDESK_CORS_HEADERS", default_value = DEFAULT_CORS_HEADERS)]
    pub cors_headers: String,

    /// PostgreSQL connection string. Falls back to `LEDGERDESK_PG_*` when unset.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Create missing tables and prepare-phase policies at startup.
    #[arg(long, env = "LEDGERDESK_INIT_SCHEMA", default_value = "false")]
    pub init_schema: bool,

    /// Tenant resolution and binding.
    #[command(flatten)]
    pub tenancy: TenancyConfig,
}

const DEFAULT_CORS_METHODS: &str = "GET,POST,PATCH,OPTIONS";
const DEFAULT_CORS_HEADERS: &str =
    "Content-Type,Authorization,Accept,X-Tenant-ID,X-Tenant-Slug,X-Request-ID,X-User-ID";

/// How requests are mapped to tenants.
#[derive(Debug, Clone, Args)]
pub struct TenancyConfig {
    /// Session setting the RLS policies read the tenant from.
    #[arg(long = "tenant-setting", env = "LEDGERDESK_TENANT_SETTING", default_value = DEFAULT_TENANT_SETTING)]
    pub setting_name: String,

    /// Tenant column of tenant-scoped tables.
    #[arg(long, env = "LEDGERDESK_TENANT_COLUMN", default_value = "tenant_id")]
    pub tenant_column: String,

    /// Base domain; `acme.<base>` resolves to tenant `acme`.
    #[arg(long, env = "LEDGERDESK_BASE_DOMAIN")]
    pub base_domain: Option<String>,

    /// Reject requests whose tenant sources name different tenants.
    #[arg(long = "strict-tenant", env = "LEDGERDESK_STRICT_TENANT", default_value = "false")]
    pub strict: bool,

    /// Tenant used when a request names none.
    #[arg(long, env = "LEDGERDESK_DEFAULT_TENANT")]
    pub default_tenant: Option<String>,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            setting_name: DEFAULT_TENANT_SETTING.to_string(),
            tenant_column: "tenant_id".to_string(),
            base_domain: None,
            strict: false,
            default_tenant: None,
        }
    }
}

impl TenancyConfig {
    /// The RLS configuration this tenancy setup binds with.
    pub fn rls_config(&self) -> RlsConfig {
        RlsConfig {
            setting_name: self.setting_name.clone(),
            tenant_column: self.tenant_column.clone(),
            ..RlsConfig::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: DEFAULT_CORS_METHODS.to_string(),
            cors_headers: DEFAULT_CORS_HEADERS.to_string(),
            database_url: None,
            init_schema: false,
            tenancy: TenancyConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a ServerConfig from environment variables, ignoring the
    /// process arguments.
    pub fn from_env() -> Self {
        Self::try_parse_from(["ledgerdesk"]).unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if let Err(e) = self.tenancy.rls_config().validate() {
            errors.push(format!("Invalid tenancy configuration: {}", e));
        }

        if let Some(domain) = &self.tenancy.base_domain {
            if domain.trim().is_empty() || domain.starts_with('.') {
                errors.push(format!("Invalid base domain: '{}'", domain));
            }
        }

        if let Some(tenant) = &self.tenancy.default_tenant {
            if tenant.trim().is_empty() {
                errors.push("Default tenant cannot be blank".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            log_level: "debug".to_string(),
            request_timeout: 5,
            enable_cors: false,
            cors_origins: "*".to_string(),
            cors_methods: "*".to_string(),
            cors_headers: "*".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.enable_cors);
        assert_eq!(config.tenancy.setting_name, "app.current_tenant");
        assert!(config.tenancy.default_tenant.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            port: 3000,
            host: "0.0.0.0".to_string(),
            ..Default::default()
        };
        assert_eq!(config.socket_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_validate_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("Port")));
    }

    #[test]
    fn test_validate_rejects_bad_setting_name() {
        let mut config = ServerConfig::default();
        config.tenancy.setting_name = "app.tenant; drop".to_string();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("tenancy")));
    }

    #[test]
    fn test_validate_rejects_blank_default_tenant() {
        let mut config = ServerConfig::default();
        config.tenancy.default_tenant = Some("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_tenancy_flags() {
        let config = ServerConfig::try_parse_from([
            "ledgerdesk",
            "--base-domain",
            "ledgerdesk.test",
            "--strict-tenant",
            "--default-tenant",
            "demo",
        ])
        .unwrap();
        assert_eq!(config.tenancy.base_domain.as_deref(), Some("ledgerdesk.test"));
        assert!(config.tenancy.strict);
        assert_eq!(config.tenancy.default_tenant.as_deref(), Some("demo"));
    }

    #[test]
    fn test_rls_config_follows_tenancy() {
        let mut tenancy = TenancyConfig::default();
        tenancy.setting_name = "app.org".to_string();
        tenancy.tenant_column = "org_id".to_string();
        let rls = tenancy.rls_config();
        assert_eq!(rls.setting_name, "app.org");
        assert_eq!(rls.tenant_column, "org_id");
    }

    #[test]
    fn test_for_testing() {
        let config = ServerConfig::for_testing();
        assert_eq!(config.port, 0);
        assert!(!config.enable_cors);
    }
}
