//! Phased rollout of tenant isolation policies.
//!
//! An existing database moves through three phases:
//!
//! | Phase | NULL tenant rows | Applies to table owner |
//! |-------|------------------|------------------------|
//! | `prepare` | visible to every tenant | no |
//! | `tighten` | hidden | no |
//! | `enforce` | hidden | yes (`FORCE ROW LEVEL SECURITY`) |
//!
//! Every phase after `prepare` audits the tenant tables first and refuses
//! to run while rows without a tenant remain, unless forced.
//!
//! The audit and the rollout itself run on unscoped connections. The
//! connecting role should own the tables and bypass RLS; the audit disables
//! `row_security` so that a role subject to the policies fails loudly
//! instead of reporting filtered counts.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, warn};

use crate::backends::postgres::PostgresBackend;
use crate::error::{RolloutError, StorageResult, ValidationError};

use super::policy::{RlsPolicyBuilder, TENANT_ISOLATION_POLICY, quote_ident};
use super::RlsConfig;

/// Policy settings applied by one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseConfig {
    /// Rows with a `NULL` tenant stay visible.
    pub allow_null_tenant: bool,
    /// RLS applies to the table owner too.
    pub force_rls: bool,
}

/// A rollout phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutPhase {
    /// Enable RLS while tolerating rows that have no tenant yet.
    Prepare,
    /// Hide rows without a tenant.
    Tighten,
    /// Apply the policies to the table owner as well.
    Enforce,
}

impl RolloutPhase {
    /// All phases in rollout order.
    pub const SEQUENCE: [RolloutPhase; 3] = [
        RolloutPhase::Prepare,
        RolloutPhase::Tighten,
        RolloutPhase::Enforce,
    ];

    /// Returns the phase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RolloutPhase::Prepare => "prepare",
            RolloutPhase::Tighten => "tighten",
            RolloutPhase::Enforce => "enforce",
        }
    }

    /// Returns the policy settings for this phase.
    pub fn config(&self) -> PhaseConfig {
        match self {
            RolloutPhase::Prepare => PhaseConfig {
                allow_null_tenant: true,
                force_rls: false,
            },
            RolloutPhase::Tighten => PhaseConfig {
                allow_null_tenant: false,
                force_rls: false,
            },
            RolloutPhase::Enforce => PhaseConfig {
                allow_null_tenant: false,
                force_rls: true,
            },
        }
    }

    /// One-line summary printed before the phase runs.
    pub fn description(&self) -> &'static str {
        match self {
            RolloutPhase::Prepare => {
                "Enable RLS with permissive policies that still admit NULL tenant rows."
            }
            RolloutPhase::Tighten => {
                "Disallow NULL tenant rows so every record is assigned before enforcement."
            }
            RolloutPhase::Enforce => "Force RLS so even table owners respect tenant isolation.",
        }
    }

    /// Whether the phase refuses to run while NULL tenant rows remain.
    pub fn requires_clean_audit(&self) -> bool {
        !matches!(self, RolloutPhase::Prepare)
    }

    /// Resolves the phases to run for a `--phase` argument.
    ///
    /// No argument means `prepare`. `auto` runs the whole sequence from
    /// `prepare`. Any other phase runs alone unless `sequential` is set, in
    /// which case every later phase follows it.
    ///
    /// ```
    /// use ledgerdesk_persistence::rls::RolloutPhase;
    ///
    /// let phases = RolloutPhase::selection(Some("tighten"), true).unwrap();
    /// assert_eq!(phases, vec![RolloutPhase::Tighten, RolloutPhase::Enforce]);
    ///
    /// let phases = RolloutPhase::selection(None, false).unwrap();
    /// assert_eq!(phases, vec![RolloutPhase::Prepare]);
    ///
    /// let phases = RolloutPhase::selection(Some("auto"), false).unwrap();
    /// assert_eq!(phases.len(), 3);
    /// ```
    pub fn selection(input: Option<&str>, sequential: bool) -> Result<Vec<Self>, RolloutError> {
        let input = input.map(str::trim).filter(|s| !s.is_empty());
        let (start, sequential) = match input {
            None => (RolloutPhase::Prepare, sequential),
            Some(s) if s.eq_ignore_ascii_case("auto") => (RolloutPhase::Prepare, true),
            Some(s) => (s.parse()?, sequential),
        };

        if !sequential {
            return Ok(vec![start]);
        }
        Ok(Self::SEQUENCE
            .iter()
            .copied()
            .skip_while(|phase| *phase != start)
            .collect())
    }

    /// DDL that moves the given tables into this phase.
    pub fn statements(
        &self,
        rls: &RlsConfig,
        tables: &[TenantTable],
    ) -> Result<Vec<String>, ValidationError> {
        let config = self.config();
        let mut statements = Vec::new();
        for table in tables {
            let policy = RlsPolicyBuilder::new(table.table.clone())
                .schema(table.schema.clone())
                .tenant_column(rls.tenant_column.clone())
                .setting_name(rls.setting_name.clone())
                .allow_null_tenant(config.allow_null_tenant)
                .force(config.force_rls)
                .build()?;
            statements.extend(policy.statements());
        }
        Ok(statements)
    }
}

impl fmt::Display for RolloutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RolloutPhase {
    type Err = RolloutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prepare" => Ok(RolloutPhase::Prepare),
            "tighten" => Ok(RolloutPhase::Tighten),
            "enforce" => Ok(RolloutPhase::Enforce),
            _ => Err(RolloutError::UnknownPhase {
                phase: s.to_string(),
            }),
        }
    }
}

/// A table that carries the tenant column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantTable {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
}

impl TenantTable {
    /// Creates a reference to `schema.table`.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl fmt::Display for TenantTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Row counts for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableAudit {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// All rows in the table.
    pub total_rows: i64,
    /// Rows whose tenant column is `NULL`.
    pub null_rows: i64,
}

impl TableAudit {
    /// Share of rows without a tenant, in percent.
    pub fn null_percentage(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            self.null_rows as f64 * 100.0 / self.total_rows as f64
        }
    }
}

/// Result of auditing all tenant tables for rows without a tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NullTenantAudit {
    /// One entry per audited table.
    pub tables: Vec<TableAudit>,
}

impl NullTenantAudit {
    /// Tables that still contain NULL tenant rows.
    pub fn offenders(&self) -> Vec<&TableAudit> {
        self.tables.iter().filter(|t| t.null_rows > 0).collect()
    }

    /// `true` when no table contains NULL tenant rows.
    pub fn is_clean(&self) -> bool {
        self.tables.iter().all(|t| t.null_rows == 0)
    }

    /// Renders the audit as a plain-text report.
    pub fn render(&self) -> String {
        if self.tables.is_empty() {
            return "No tenant tables detected during audit.\n".to_string();
        }

        let mut out = format!(
            "{:<48} {:>12} {:>12} {:>8}\n",
            "table", "total", "null", "null %"
        );
        for t in &self.tables {
            out.push_str(&format!(
                "{:<48} {:>12} {:>12} {:>7.2}%\n",
                format!("{}.{}", t.schema, t.table),
                t.total_rows,
                t.null_rows,
                t.null_percentage()
            ));
        }
        if self.is_clean() {
            out.push_str("All tenant-scoped tables have the tenant column populated.\n");
        }
        out
    }
}

/// Flags controlling a rollout run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RolloutOptions {
    /// Audit and plan, but apply nothing.
    pub dry_run: bool,
    /// Continue even when NULL tenant rows remain.
    pub force: bool,
    /// Check the catalog after applying each phase.
    pub verify: bool,
}

impl RolloutOptions {
    /// Sets dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets force mode.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Enables post-apply verification.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

/// What happened in one phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseOutcome {
    /// The phase.
    pub phase: RolloutPhase,
    /// Statements planned for the phase.
    pub statements: Vec<String>,
    /// Whether the statements were applied.
    pub applied: bool,
    /// Audit taken before applying, for phases that require one.
    pub pre_audit: Option<NullTenantAudit>,
    /// Audit taken after applying.
    pub post_audit: Option<NullTenantAudit>,
}

/// Outcome of a rollout run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RolloutReport {
    /// Phases in the order they ran.
    pub phases: Vec<PhaseOutcome>,
}

/// Applies the tenant isolation policies to a live database.
#[derive(Debug)]
pub struct RlsRollout<'a> {
    backend: &'a PostgresBackend,
    config: RlsConfig,
    options: RolloutOptions,
}

impl<'a> RlsRollout<'a> {
    /// Creates a rollout over `backend`.
    pub fn new(backend: &'a PostgresBackend, config: RlsConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            backend,
            config,
            options: RolloutOptions::default(),
        })
    }

    /// Sets the run options.
    pub fn with_options(mut self, options: RolloutOptions) -> Self {
        self.options = options;
        self
    }

    /// Lists base tables outside the system schemas that have the tenant column.
    pub async fn discover_tables(&self) -> StorageResult<Vec<TenantTable>> {
        let client = self.backend.get_client().await?;
        let rows = client
            .query(
                "SELECT c.table_schema::text, c.table_name::text
                 FROM information_schema.columns c
                 JOIN information_schema.tables t
                   ON t.table_schema = c.table_schema AND t.table_name = c.table_name
                 WHERE c.column_name = $1
                   AND t.table_type = 'BASE TABLE'
                   AND c.table_schema NOT IN ('pg_catalog', 'information_schema')
                 ORDER BY c.table_schema, c.table_name",
                &[&self.config.tenant_column],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| TenantTable::new(row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect())
    }

    /// Counts total and NULL tenant rows in every tenant table.
    pub async fn audit(&self) -> StorageResult<NullTenantAudit> {
        let tables = self.discover_tables().await?;
        self.audit_tables(&tables).await
    }

    async fn audit_tables(&self, tables: &[TenantTable]) -> StorageResult<NullTenantAudit> {
        let mut client = self.backend.get_client().await?;
        let tx = client.transaction().await?;
        tx.batch_execute("SET LOCAL row_security = off").await?;

        let column = quote_ident(&self.config.tenant_column);
        let mut audit = NullTenantAudit::default();
        for table in tables {
            let sql = format!(
                "SELECT count(*), count(*) FILTER (WHERE {column} IS NULL) FROM {}",
                table.qualified()
            );
            let row = tx.query_one(sql.as_str(), &[]).await?;
            audit.tables.push(TableAudit {
                schema: table.schema.clone(),
                table: table.table.clone(),
                total_rows: row.get(0),
                null_rows: row.get(1),
            });
        }
        tx.rollback().await?;

        Ok(audit)
    }

    /// Runs the given phases in order, stopping at the first failure.
    pub async fn run(&self, phases: &[RolloutPhase]) -> StorageResult<RolloutReport> {
        let mut report = RolloutReport::default();
        for phase in phases {
            let outcome = self.run_phase(*phase).await.inspect_err(|e| {
                warn!(phase = %phase, error = %e, "rollout phase failed");
            })?;
            report.phases.push(outcome);
        }
        info!(phases = report.phases.len(), dry_run = self.options.dry_run, "RLS rollout finished");
        Ok(report)
    }

    /// Runs a single phase.
    pub async fn run_phase(&self, phase: RolloutPhase) -> StorageResult<PhaseOutcome> {
        info!(phase = %phase, "{}", phase.description());
        let tables = self.discover_tables().await?;

        let pre_audit = if phase.requires_clean_audit() {
            let audit = self.audit_tables(&tables).await?;
            let offenders = audit.offenders().len();
            if offenders > 0 && !self.options.force {
                warn!(phase = %phase, "\n{}", audit.render());
                return Err(RolloutError::NullTenantRows {
                    phase: phase.to_string(),
                    offending_tables: offenders,
                }
                .into());
            }
            if offenders > 0 {
                warn!(phase = %phase, offenders, "continuing despite NULL tenant rows because force is set");
            }
            Some(audit)
        } else {
            None
        };

        let statements = phase.statements(&self.config, &tables)?;

        if self.options.dry_run {
            info!(phase = %phase, statements = statements.len(), "dry run; nothing applied");
            return Ok(PhaseOutcome {
                phase,
                statements,
                applied: false,
                pre_audit,
                post_audit: None,
            });
        }

        self.apply(&statements).await?;
        info!(phase = %phase, tables = tables.len(), "applied RLS policies");

        if self.options.verify {
            self.verify(phase, &tables).await?;
        }

        let post_audit = if self.options.verify || phase.requires_clean_audit() {
            let audit = self.audit_tables(&tables).await?;
            info!(phase = %phase, "\n{}", audit.render());
            Some(audit)
        } else {
            None
        };

        Ok(PhaseOutcome {
            phase,
            statements,
            applied: true,
            pre_audit,
            post_audit,
        })
    }

    async fn apply(&self, statements: &[String]) -> StorageResult<()> {
        let mut client = self.backend.get_client().await?;
        let tx = client.transaction().await?;
        for statement in statements {
            tx.batch_execute(statement.as_str()).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Checks the catalog flags and policy for every table.
    async fn verify(&self, phase: RolloutPhase, tables: &[TenantTable]) -> StorageResult<()> {
        let expected = phase.config();
        let client = self.backend.get_client().await?;

        for table in tables {
            let row = client
                .query_opt(
                    "SELECT c.relrowsecurity, c.relforcerowsecurity,
                            EXISTS (SELECT 1 FROM pg_policies p
                                    WHERE p.schemaname = n.nspname
                                      AND p.tablename = c.relname
                                      AND p.policyname = $3)
                     FROM pg_class c
                     JOIN pg_namespace n ON n.oid = c.relnamespace
                     WHERE n.nspname = $1 AND c.relname = $2",
                    &[&table.schema, &table.table, &TENANT_ISOLATION_POLICY],
                )
                .await?;

            let Some(row) = row else {
                return Err(RolloutError::VerificationFailed {
                    table: table.to_string(),
                    message: "table not found in pg_class".to_string(),
                }
                .into());
            };

            let (enabled, forced, has_policy): (bool, bool, bool) =
                (row.get(0), row.get(1), row.get(2));
            let problem = if !enabled {
                Some("row level security is not enabled".to_string())
            } else if forced != expected.force_rls {
                Some(format!(
                    "expected force row level security = {}, found {}",
                    expected.force_rls, forced
                ))
            } else if !has_policy {
                Some(format!("policy {} is missing", TENANT_ISOLATION_POLICY))
            } else {
                None
            };

            if let Some(message) = problem {
                return Err(RolloutError::VerificationFailed {
                    table: table.to_string(),
                    message,
                }
                .into());
            }
        }

        info!(phase = %phase, tables = tables.len(), "verified RLS state");
        Ok(())
    }
}
