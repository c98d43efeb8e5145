//! Tenant resolution for command line entry points.
//!
//! Administrative tools have no inbound request to take a tenant from, so
//! the tenant comes from a flag, an environment variable or a default, in
//! that order.
//!
//! ```
//! use ledgerdesk_persistence::tenant::{resolve_tenant_id_from, TenantResolveOptions};
//!
//! let options = TenantResolveOptions::new("TENANT_ID", "tenant");
//! let args = ["seed", "--tenant=acme"];
//!
//! let tenant = resolve_tenant_id_from(args, |_| None, &options).unwrap();
//! assert_eq!(tenant.unwrap().as_str(), "acme");
//! ```

use super::id::TenantId;
use crate::error::TenantError;

/// Where and how to look for a tenant id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantResolveOptions {
    /// Environment variable consulted after the flag.
    pub env_var: String,
    /// Flag name without the leading `--`.
    pub flag: String,
    /// Fallback used when neither flag nor environment variable is set.
    pub default_value: Option<String>,
    /// Whether an unresolved tenant is an error.
    pub required: bool,
}

impl TenantResolveOptions {
    /// Creates required options for the given environment variable and flag.
    pub fn new(env_var: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            flag: flag.into().trim_start_matches('-').to_string(),
            default_value: None,
            required: true,
        }
    }

    /// Sets the default tenant.
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// Sets whether resolution must produce a tenant.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

impl Default for TenantResolveOptions {
    fn default() -> Self {
        Self::new("TENANT_ID", "tenant")
    }
}

/// Resolves the tenant from the process arguments and environment.
///
/// See [`resolve_tenant_id_from`] for the precedence rules.
pub fn resolve_tenant_id(options: &TenantResolveOptions) -> Result<Option<TenantId>, TenantError> {
    resolve_tenant_id_from(std::env::args().skip(1), |name| std::env::var(name).ok(), options)
}

/// Resolves the tenant from explicit arguments and an environment lookup.
///
/// Precedence is flag, then environment variable, then default. Values are
/// trimmed and blank values count as absent. When nothing resolves, the
/// result is [`TenantError::MissingTenant`] if the options are required and
/// `Ok(None)` otherwise.
pub fn resolve_tenant_id_from<I, S, E>(
    args: I,
    env: E,
    options: &TenantResolveOptions,
) -> Result<Option<TenantId>, TenantError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    E: Fn(&str) -> Option<String>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();

    let candidates = [
        read_flag_value(&args, &options.flag),
        env(&options.env_var),
        options.default_value.clone(),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(tenant) = TenantId::parse(&candidate) {
            return Ok(Some(tenant));
        }
    }

    if options.required {
        return Err(TenantError::MissingTenant {
            hint: format!(
                "set the {} environment variable or pass --{} <tenant>",
                options.env_var, options.flag
            ),
        });
    }

    Ok(None)
}

/// Reads `--flag value` or `--flag=value` from `args`.
///
/// The separated form only consumes the next argument when it is not itself
/// a flag. Occurrences without a usable value are skipped, so a later one
/// can still supply it.
fn read_flag_value(args: &[String], flag: &str) -> Option<String> {
    let long = format!("--{flag}");
    let inline = format!("--{flag}=");

    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        let value = if let Some(value) = arg.strip_prefix(&inline) {
            value
        } else if *arg == long {
            match iter.peek() {
                Some(next) if !next.starts_with("--") => next.as_str(),
                _ => continue,
            }
        } else {
            continue;
        };

        let value = value.trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn options() -> TenantResolveOptions {
        TenantResolveOptions::new("TENANT_ID", "tenant").with_default("Z")
    }

    #[test]
    fn test_precedence_flag_env_default() {
        let env = env_of(&[("TENANT_ID", "Y")]);

        let tenant = resolve_tenant_id_from(["--tenant=X"], &env, &options()).unwrap();
        assert_eq!(tenant, Some(TenantId::new("X")));

        let tenant = resolve_tenant_id_from(Vec::<String>::new(), &env, &options()).unwrap();
        assert_eq!(tenant, Some(TenantId::new("Y")));

        let tenant = resolve_tenant_id_from(Vec::<String>::new(), |_| None, &options()).unwrap();
        assert_eq!(tenant, Some(TenantId::new("Z")));

        let required = TenantResolveOptions::new("TENANT_ID", "tenant");
        let err = resolve_tenant_id_from(Vec::<String>::new(), |_| None, &required).unwrap_err();
        assert!(matches!(err, TenantError::MissingTenant { .. }));

        let optional = required.required(false);
        let tenant = resolve_tenant_id_from(Vec::<String>::new(), |_| None, &optional).unwrap();
        assert_eq!(tenant, None);
    }

    #[test]
    fn test_missing_tenant_names_env_and_flag() {
        let options = TenantResolveOptions::new("SEED_TENANT", "org");
        let err = resolve_tenant_id_from(["run"], |_| None, &options).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("SEED_TENANT"));
        assert!(message.contains("--org"));
    }

    #[test]
    fn test_separated_flag_form() {
        let tenant =
            resolve_tenant_id_from(["seed", "--tenant", "acme", "--dry-run"], |_| None, &options())
                .unwrap();
        assert_eq!(tenant, Some(TenantId::new("acme")));
    }

    #[test]
    fn test_separated_flag_does_not_consume_next_flag() {
        let env = env_of(&[("TENANT_ID", "Y")]);
        let tenant = resolve_tenant_id_from(["--tenant", "--force"], &env, &options()).unwrap();
        assert_eq!(tenant, Some(TenantId::new("Y")));
    }

    #[test]
    fn test_later_inline_flag_is_used_after_bare_flag() {
        let env = env_of(&[("TENANT_ID", "Y")]);
        let tenant =
            resolve_tenant_id_from(["--tenant", "--force", "--tenant=acme"], &env, &options())
                .unwrap();
        assert_eq!(tenant, Some(TenantId::new("acme")));

        let tenant = resolve_tenant_id_from(["--tenant=", "--tenant", "beta"], &env, &options())
            .unwrap();
        assert_eq!(tenant, Some(TenantId::new("beta")));
    }

    #[test]
    fn test_values_are_trimmed() {
        let tenant = resolve_tenant_id_from(["--tenant=  acme  "], |_| None, &options()).unwrap();
        assert_eq!(tenant, Some(TenantId::new("acme")));

        let env = env_of(&[("TENANT_ID", " beta\n")]);
        let tenant = resolve_tenant_id_from(Vec::<String>::new(), &env, &options()).unwrap();
        assert_eq!(tenant, Some(TenantId::new("beta")));
    }

    #[test]
    fn test_blank_values_fall_through() {
        let env = env_of(&[("TENANT_ID", "   ")]);
        let tenant = resolve_tenant_id_from(["--tenant="], &env, &options()).unwrap();
        assert_eq!(tenant, Some(TenantId::new("Z")));
    }

    #[test]
    fn test_other_flags_with_shared_prefix_are_ignored() {
        let tenant =
            resolve_tenant_id_from(["--tenant-slug=acme"], |_| None, &options()).unwrap();
        assert_eq!(tenant, Some(TenantId::new("Z")));
    }

    #[test]
    fn test_process_resolution_uses_default() {
        let options = TenantResolveOptions::new("LEDGERDESK_UNSET_TENANT_VAR", "ledgerdesk-unset-flag")
            .with_default("fallback");
        let tenant = resolve_tenant_id(&options).unwrap();
        assert_eq!(tenant, Some(TenantId::new("fallback")));
    }

    #[test]
    fn test_flag_name_may_include_dashes() {
        let opts = TenantResolveOptions::new("TENANT_ID", "--tenant");
        assert_eq!(opts.flag, "tenant");
    }
}
