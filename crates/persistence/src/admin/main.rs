//! Ledgerdesk administration CLI
//!
//! Schema setup, phased RLS rollout, NULL-tenant auditing and tenant seeding.
//!
//! # Usage
//!
//! ```bash
//! # Create the tables with permissive prepare-phase policies
//! ledgerdesk-admin --database-url postgres://owner@db/ledgerdesk init
//!
//! # Report rows that have no tenant yet
//! ledgerdesk-admin audit
//!
//! # Walk through prepare, tighten and enforce, checking the catalog after each
//! ledgerdesk-admin rollout --phase auto --verify
//!
//! # Only tighten, without applying anything
//! ledgerdesk-admin rollout --phase tighten --dry-run
//!
//! # Create a tenant's organization settings row
//! TENANT_ID=acme ledgerdesk-admin seed --name "Acme Repairs"
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - Connection string; `LEDGERDESK_PG_*` is used when unset
//! - `TENANT_ID` - Tenant for `seed` when `--tenant` is not given
//! - `RUST_LOG` - Log filter (default: info,ledgerdesk_persistence=debug)
//!
//! `init`, `audit` and `rollout` must connect as the table owner with
//! `BYPASSRLS`. `seed` should use the application role.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ledgerdesk_persistence::backends::postgres::{PostgresBackend, PostgresConfig};
use ledgerdesk_persistence::catalog;
use ledgerdesk_persistence::rls::{
    RlsConfig, RlsRollout, RolloutOptions, RolloutPhase, TenantScopedExecutor,
};
use ledgerdesk_persistence::tenant::{
    TenantContext, TenantId, TenantResolveOptions, TenantScope, resolve_tenant_id_from,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ledgerdesk-admin", version, about = "Ledgerdesk database administration")]
struct Cli {
    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Session setting read by the tenant isolation policies.
    #[arg(long, default_value = "app.current_tenant", global = true)]
    setting_name: String,

    /// Tenant column name.
    #[arg(long, default_value = "tenant_id", global = true)]
    tenant_column: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or migrate the schema.
    Init,

    /// Report total and NULL tenant rows per tenant table.
    Audit {
        /// Print the audit as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Apply RLS policies phase by phase.
    Rollout {
        /// prepare, tighten, enforce or auto; prepare when omitted.
        #[arg(long)]
        phase: Option<String>,

        /// Continue with the later phases after the named one.
        #[arg(long)]
        sequential: bool,

        /// Audit and plan without applying anything.
        #[arg(long)]
        dry_run: bool,

        /// Continue even when NULL tenant rows remain.
        #[arg(long)]
        force: bool,

        /// Check catalog flags and audit after each phase.
        #[arg(long, alias = "post-check")]
        verify: bool,
    },

    /// Create a tenant's organization settings row if it is missing.
    Seed {
        /// Tenant to seed; falls back to TENANT_ID.
        #[arg(long)]
        tenant: Option<String>,

        /// Organization display name; defaults to the tenant id.
        #[arg(long)]
        name: Option<String>,
    },
}

/// Resolves the `seed` tenant from the parsed `--tenant` value, then `TENANT_ID`.
fn seed_tenant<E>(flag: Option<String>, env: E) -> anyhow::Result<TenantId>
where
    E: Fn(&str) -> Option<String>,
{
    let options = TenantResolveOptions::default();
    let args = flag.map(|t| format!("--{}={t}", options.flag));
    resolve_tenant_id_from(args, env, &options)?.context("no tenant resolved")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ledgerdesk_persistence=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let rls = RlsConfig {
        setting_name: cli.setting_name.clone(),
        tenant_column: cli.tenant_column.clone(),
        ..Default::default()
    };
    rls.validate().context("invalid RLS configuration")?;

    let config = match &cli.database_url {
        Some(url) => PostgresConfig::from_connection_string(url)?,
        None => PostgresConfig::from_env(),
    };
    let backend = PostgresBackend::new(config)
        .await
        .context("failed to connect to PostgreSQL")?;

    match cli.command {
        Command::Init => {
            backend.init_schema(&rls).await?;
            tracing::info!("schema initialized");
        }

        Command::Audit { json } => {
            let audit = RlsRollout::new(&backend, rls)?.audit().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&audit)?);
            } else {
                print!("{}", audit.render());
            }
        }

        Command::Rollout {
            phase,
            sequential,
            dry_run,
            force,
            verify,
        } => {
            let phases = RolloutPhase::selection(phase.as_deref(), sequential)?;
            let options = RolloutOptions::default()
                .dry_run(dry_run)
                .force(force)
                .verify(verify);
            let rollout = RlsRollout::new(&backend, rls)?.with_options(options);

            let report = rollout.run(&phases).await.context("RLS rollout failed")?;
            for outcome in &report.phases {
                println!("=== Phase: {} ===", outcome.phase.as_str().to_uppercase());
                println!("{}", outcome.phase.description());
                if !outcome.applied {
                    println!("[dry-run] would apply:");
                    for statement in &outcome.statements {
                        println!("  {statement};");
                    }
                }
                if let Some(audit) = &outcome.post_audit {
                    print!("{}", audit.render());
                }
            }
        }

        Command::Seed { tenant, name } => {
            let tenant = seed_tenant(tenant, |var| std::env::var(var).ok())?;
            let name = name.unwrap_or_else(|| tenant.to_string());

            let executor = TenantScopedExecutor::new(backend, &rls)?;
            let ctx = TenantContext::new(tenant.clone()).with_role("admin-cli");

            let settings = TenantScope::run(ctx, async {
                executor
                    .with_tenant_scope(None, move |tx| {
                        Box::pin(async move {
                            catalog::ensure_organization_settings(tx, &name).await
                        })
                    })
                    .await
            })
            .await?;

            tracing::info!(
                tenant = %tenant,
                display_name = %settings.display_name,
                "tenant seeded"
            );
        }
    }

    Ok(())
}
