//! DDL generation for tenant isolation policies.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

use super::{DEFAULT_TENANT_SETTING, validate_setting_name};

/// Name of the policy created on every tenant-scoped table.
pub const TENANT_ISOLATION_POLICY: &str = "tenant_isolation";

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Quotes an SQL identifier, doubling embedded double quotes.
///
/// ```
/// use ledgerdesk_persistence::rls::quote_ident;
///
/// assert_eq!(quote_ident("services"), r#""services""#);
/// assert_eq!(quote_ident(r#"odd"name"#), r#""odd""name""#);
/// ```
pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

pub(crate) fn validate_identifier(identifier: &str) -> Result<(), ValidationError> {
    if IDENTIFIER.is_match(identifier) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// Row-level security definition for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RlsPolicy {
    schema: String,
    table: String,
    tenant_column: String,
    setting_name: String,
    allow_null_tenant: bool,
    force: bool,
}

impl RlsPolicy {
    /// Starts building a policy for `table` in the `public` schema.
    pub fn builder(table: impl Into<String>) -> RlsPolicyBuilder {
        RlsPolicyBuilder::new(table)
    }

    /// Returns the schema-qualified, quoted table name.
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the schema name.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// The boolean expression used for both `USING` and `WITH CHECK`.
    pub fn predicate(&self) -> String {
        let column = quote_ident(&self.tenant_column);
        let matches = format!(
            "{column} = current_setting('{}', true)",
            self.setting_name
        );
        if self.allow_null_tenant {
            format!("({matches} OR {column} IS NULL)")
        } else {
            format!("({matches})")
        }
    }

    /// Statements that install the policy. Safe to run repeatedly.
    pub fn statements(&self) -> Vec<String> {
        let table = self.qualified_table();
        let policy = quote_ident(TENANT_ISOLATION_POLICY);
        let predicate = self.predicate();
        let force = if self.force { "FORCE" } else { "NO FORCE" };

        vec![
            format!("ALTER TABLE {table} ENABLE ROW LEVEL SECURITY"),
            format!("ALTER TABLE {table} {force} ROW LEVEL SECURITY"),
            format!("DROP POLICY IF EXISTS {policy} ON {table}"),
            format!("CREATE POLICY {policy} ON {table} USING {predicate} WITH CHECK {predicate}"),
        ]
    }

    /// Statements that remove the policy and disable RLS on the table.
    pub fn drop_statements(&self) -> Vec<String> {
        let table = self.qualified_table();
        vec![
            format!(
                "DROP POLICY IF EXISTS {} ON {table}",
                quote_ident(TENANT_ISOLATION_POLICY)
            ),
            format!("ALTER TABLE {table} NO FORCE ROW LEVEL SECURITY"),
            format!("ALTER TABLE {table} DISABLE ROW LEVEL SECURITY"),
        ]
    }

    /// All install statements joined into one script.
    pub fn to_sql(&self) -> String {
        let mut sql = self.statements().join(";\n");
        sql.push_str(";\n");
        sql
    }
}

/// Builder for [`RlsPolicy`].
///
/// ```
/// use ledgerdesk_persistence::rls::RlsPolicyBuilder;
///
/// let policy = RlsPolicyBuilder::new("services")
///     .allow_null_tenant(true)
///     .build()
///     .unwrap();
///
/// let sql = policy.to_sql();
/// assert!(sql.contains(r#"ALTER TABLE "public"."services" ENABLE ROW LEVEL SECURITY"#));
/// assert!(sql.contains(r#""tenant_id" IS NULL"#));
/// ```
#[derive(Debug, Clone)]
pub struct RlsPolicyBuilder {
    schema: String,
    table: String,
    tenant_column: String,
    setting_name: String,
    allow_null_tenant: bool,
    force: bool,
}

impl RlsPolicyBuilder {
    /// Creates a builder with the default column and setting.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.into(),
            tenant_column: "tenant_id".to_string(),
            setting_name: DEFAULT_TENANT_SETTING.to_string(),
            allow_null_tenant: false,
            force: false,
        }
    }

    /// Sets the schema.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the tenant column.
    pub fn tenant_column(mut self, column: impl Into<String>) -> Self {
        self.tenant_column = column.into();
        self
    }

    /// Sets the session setting the policy reads.
    pub fn setting_name(mut self, name: impl Into<String>) -> Self {
        self.setting_name = name.into();
        self
    }

    /// Admits rows whose tenant column is `NULL`.
    pub fn allow_null_tenant(mut self, allow: bool) -> Self {
        self.allow_null_tenant = allow;
        self
    }

    /// Applies the policy to the table owner too.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Validates the inputs and builds the policy.
    ///
    /// Schema and table names are quoted in the generated DDL, so any name
    /// is accepted. The tenant column and setting are restricted to plain
    /// identifiers.
    pub fn build(self) -> Result<RlsPolicy, ValidationError> {
        if self.table.is_empty() {
            return Err(ValidationError::MissingRequiredField {
                field: "table".to_string(),
            });
        }
        validate_identifier(&self.tenant_column)?;
        validate_setting_name(&self.setting_name)?;

        Ok(RlsPolicy {
            schema: self.schema,
            table: self.table,
            tenant_column: self.tenant_column,
            setting_name: self.setting_name,
            allow_null_tenant: self.allow_null_tenant,
            force: self.force,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_policy_statements() {
        let policy = RlsPolicyBuilder::new("services").force(true).build().unwrap();
        let statements = policy.statements();

        assert_eq!(statements.len(), 4);
        assert_eq!(
            statements[1],
            r#"ALTER TABLE "public"."services" FORCE ROW LEVEL SECURITY"#
        );
        assert_eq!(
            statements[3],
            r#"CREATE POLICY "tenant_isolation" ON "public"."services" USING ("tenant_id" = current_setting('app.current_tenant', true)) WITH CHECK ("tenant_id" = current_setting('app.current_tenant', true))"#
        );
    }

    #[test]
    fn test_null_tenant_predicate() {
        let policy = RlsPolicyBuilder::new("services")
            .allow_null_tenant(true)
            .build()
            .unwrap();
        assert_eq!(
            policy.predicate(),
            r#"("tenant_id" = current_setting('app.current_tenant', true) OR "tenant_id" IS NULL)"#
        );
        assert!(policy.statements()[1].contains("NO FORCE"));
    }

    #[test]
    fn test_table_names_are_quoted() {
        let policy = RlsPolicyBuilder::new(r#"weird"; DROP TABLE x; --"#)
            .schema("tenant data")
            .build()
            .unwrap();
        assert_eq!(
            policy.qualified_table(),
            r#""tenant data"."weird""; DROP TABLE x; --""#
        );
    }

    #[test]
    fn test_invalid_column_or_setting_rejected() {
        assert!(RlsPolicyBuilder::new("t").tenant_column("a b").build().is_err());
        assert!(RlsPolicyBuilder::new("t").setting_name("x').y").build().is_err());
        assert!(RlsPolicyBuilder::new("").build().is_err());
    }

    #[test]
    fn test_custom_setting_and_column() {
        let policy = RlsPolicyBuilder::new("invoices")
            .tenant_column("org_id")
            .setting_name("app.org")
            .build()
            .unwrap();
        assert!(policy.predicate().contains(r#""org_id" = current_setting('app.org', true)"#));
    }

    #[test]
    fn test_drop_statements() {
        let policy = RlsPolicy::builder("services").build().unwrap();
        let statements = policy.drop_statements();
        assert!(statements[0].starts_with("DROP POLICY IF EXISTS \"tenant_isolation\""));
        assert!(statements[2].ends_with("DISABLE ROW LEVEL SECURITY"));
    }
}
