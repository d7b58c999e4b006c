//! Storage-level tenant isolation.
//!
//! The rule, identical in Postgres and in [`crate::memory`]: with a tenant
//! context bound, a row is visible (and writable) when its tenant is NULL or
//! equals the context; with no context bound, every row is visible.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbErr};
use sea_orm_migration::{MigrationName, MigrationTrait, SchemaManager};
use tenantgate_security::{TenantId, properties};

use crate::error::DbError;
use crate::session::{DEFAULT_TENANT_SETTING, is_identifier, validate_setting_name};

/// In-process form of the isolation rule.
#[must_use]
pub fn row_visible(row_tenant: Option<TenantId>, context: Option<TenantId>) -> bool {
    match (context, row_tenant) {
        (None, _) | (Some(_), None) => true,
        (Some(ctx), Some(row)) => ctx == row,
    }
}

/// Row-level security policy DDL for one tenant-owned table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSecurityPolicy {
    table: String,
    tenant_column: String,
    setting: String,
}

impl RowSecurityPolicy {
    /// Policy on `table.tenant_id` driven by [`DEFAULT_TENANT_SETTING`].
    ///
    /// # Errors
    /// Returns [`DbError::InvalidIdentifier`] for a malformed table name.
    pub fn for_table(table: &str) -> Result<Self, DbError> {
        Self::new(table, properties::TENANT_ID, DEFAULT_TENANT_SETTING)
    }

    /// # Errors
    /// Returns [`DbError::InvalidIdentifier`] when any name is not a plain
    /// lowercase identifier (or dotted setting name).
    pub fn new(table: &str, tenant_column: &str, setting: &str) -> Result<Self, DbError> {
        for ident in [table, tenant_column] {
            if !is_identifier(ident) {
                return Err(DbError::InvalidIdentifier(ident.to_owned()));
            }
        }
        validate_setting_name(setting)?;
        Ok(Self {
            table: table.to_owned(),
            tenant_column: tenant_column.to_owned(),
            setting: setting.to_owned(),
        })
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn isolation_policy(&self) -> String {
        format!("{}_tenant_isolation", self.table)
    }

    #[must_use]
    pub fn unscoped_policy(&self) -> String {
        format!("{}_unscoped_access", self.table)
    }

    fn context_expr(&self) -> String {
        format!("NULLIF(current_setting('{}', true), '')::uuid", self.setting)
    }

    /// Statements enabling isolation. Re-running them is harmless.
    #[must_use]
    pub fn up_statements(&self) -> Vec<String> {
        let table = &self.table;
        let column = &self.tenant_column;
        let ctx = self.context_expr();
        let isolation = self.isolation_policy();
        let unscoped = self.unscoped_policy();
        let visible = format!("\"{column}\" IS NULL OR \"{column}\" = {ctx}");

        vec![
            format!("ALTER TABLE \"{table}\" ENABLE ROW LEVEL SECURITY"),
            format!("ALTER TABLE \"{table}\" FORCE ROW LEVEL SECURITY"),
            format!("DROP POLICY IF EXISTS \"{isolation}\" ON \"{table}\""),
            format!(
                "CREATE POLICY \"{isolation}\" ON \"{table}\" FOR ALL \
                 USING ({visible}) WITH CHECK ({visible})"
            ),
            format!("DROP POLICY IF EXISTS \"{unscoped}\" ON \"{table}\""),
            format!(
                "CREATE POLICY \"{unscoped}\" ON \"{table}\" FOR ALL \
                 USING ({ctx} IS NULL) WITH CHECK ({ctx} IS NULL)"
            ),
        ]
    }

    #[must_use]
    pub fn down_statements(&self) -> Vec<String> {
        let table = &self.table;
        vec![
            format!("DROP POLICY IF EXISTS \"{}\" ON \"{table}\"", self.unscoped_policy()),
            format!("DROP POLICY IF EXISTS \"{}\" ON \"{table}\"", self.isolation_policy()),
            format!("ALTER TABLE \"{table}\" NO FORCE ROW LEVEL SECURITY"),
            format!("ALTER TABLE \"{table}\" DISABLE ROW LEVEL SECURITY"),
        ]
    }
}

/// Migration installing [`RowSecurityPolicy`] on one table.
pub struct RowSecurityMigration {
    name: String,
    policy: RowSecurityPolicy,
}

impl RowSecurityMigration {
    #[must_use]
    pub fn new(name: impl Into<String>, policy: RowSecurityPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RowSecurityPolicy {
        &self.policy
    }
}

impl MigrationName for RowSecurityMigration {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl MigrationTrait for RowSecurityMigration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        for sql in self.policy.up_statements() {
            conn.execute_unprepared(&sql).await?;
        }
        tracing::info!(table = %self.policy.table, "row-level security enabled");
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        for sql in self.policy.down_statements() {
            conn.execute_unprepared(&sql).await?;
        }
        Ok(())
    }
}
