//! Binding the current tenant to a storage session.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseTransaction, Statement};
use tenantgate_security::TenantId;

use crate::error::DbError;

/// Session setting consulted by the row-security policy.
pub const DEFAULT_TENANT_SETTING: &str = "app.current_tenant";

/// A storage session that carries a current-tenant context.
///
/// `None` clears the context. An empty context reads as NULL in storage.
#[async_trait]
pub trait TenantSession: Send {
    /// Set the current tenant for this session.
    ///
    /// # Errors
    /// Returns an error when the backend rejects the binding, including a
    /// switch away from a context the session is already bound to.
    async fn set_tenant(&mut self, tenant: Option<TenantId>) -> Result<(), DbError>;
}

/// Postgres binding via a transaction-local `set_config`.
///
/// The setting reverts when the transaction ends, so a pooled connection
/// never leaks one request's tenant into the next.
pub struct TxTenantSession<'a> {
    txn: &'a DatabaseTransaction,
    setting: &'a str,
}

impl<'a> TxTenantSession<'a> {
    #[must_use]
    pub fn new(txn: &'a DatabaseTransaction, setting: &'a str) -> Self {
        Self { txn, setting }
    }

    /// Read the setting back; `None` when unset or empty.
    ///
    /// # Errors
    /// Returns [`DbError::Sea`] on query failure and
    /// [`DbError::InvalidValue`] when the stored value is not a tenant id.
    pub async fn current_tenant(&self) -> Result<Option<TenantId>, DbError> {
        let stmt = Statement::from_sql_and_values(
            self.txn.get_database_backend(),
            "SELECT NULLIF(current_setting($1, true), '') AS tenant",
            [self.setting.into()],
        );
        let Some(row) = self.txn.query_one(stmt).await? else {
            return Ok(None);
        };
        let raw: Option<String> = row.try_get("", "tenant")?;
        raw.map(|s| {
            s.parse::<TenantId>().map_err(|_| DbError::InvalidValue {
                field: self.setting.to_owned(),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl TenantSession for TxTenantSession<'_> {
    async fn set_tenant(&mut self, tenant: Option<TenantId>) -> Result<(), DbError> {
        let value = tenant.map(|t| t.to_string()).unwrap_or_default();
        let stmt = Statement::from_sql_and_values(
            self.txn.get_database_backend(),
            "SELECT set_config($1, $2, true)",
            [self.setting.into(), value.into()],
        );
        self.txn.execute(stmt).await?;
        Ok(())
    }
}

/// Setting names are interpolated into policy DDL, so they are restricted to
/// `namespace.name` with lowercase identifier characters.
///
/// # Errors
/// Returns [`DbError::InvalidIdentifier`] for anything else.
pub fn validate_setting_name(name: &str) -> Result<(), DbError> {
    let valid = name
        .split_once('.')
        .is_some_and(|(ns, key)| is_identifier(ns) && is_identifier(key));
    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_owned()))
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
