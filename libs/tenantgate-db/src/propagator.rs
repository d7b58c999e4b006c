//! Per-request tenant context propagation.
//!
//! Every data access of a request runs inside one transaction whose session
//! setting carries the principal's tenant. The setting is transaction-local,
//! so it is gone before the connection goes back to the pool, whether the
//! work succeeded, failed or panicked.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tenantgate_security::{Principal, TenantId, display_affinity};
use tracing::{debug, error, instrument, warn};

use crate::config::DbConfig;
use crate::error::DbError;
use crate::session::{DEFAULT_TENANT_SETTING, TenantSession, TxTenantSession};

/// Boxed future returned by the unit of work given to
/// [`TenantContextPropagator::establish`].
pub type ScopedFuture<'c, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>;

/// Binds a tenant context for the duration of a unit of work.
#[derive(Clone)]
pub struct TenantContextPropagator {
    db: Arc<DatabaseConnection>,
    setting: Arc<str>,
}

impl TenantContextPropagator {
    /// Propagator using [`DEFAULT_TENANT_SETTING`].
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::from_shared(Arc::new(db))
    }

    /// Propagator over a pool shared with other components.
    #[must_use]
    pub fn from_shared(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            setting: Arc::from(DEFAULT_TENANT_SETTING),
        }
    }

    /// # Errors
    /// Returns [`DbError::InvalidIdentifier`] when the configured setting
    /// name is malformed.
    pub fn from_config(db: Arc<DatabaseConnection>, cfg: &DbConfig) -> Result<Self, DbError> {
        cfg.validate()?;
        Ok(Self {
            db,
            setting: Arc::from(cfg.tenant_setting.as_str()),
        })
    }

    #[inline]
    #[must_use]
    pub fn setting(&self) -> &str {
        &self.setting
    }

    /// Run `work` with `tenant` bound as the current storage context.
    ///
    /// The transaction commits when `work` returns `Ok` and rolls back
    /// otherwise. A binding failure is reported before `work` runs; no data
    /// access happens without a context.
    ///
    /// # Errors
    /// Returns `E::from(DbError::ContextEstablishment)` when the context
    /// cannot be bound, the error of `work`, or a commit failure.
    #[instrument(skip_all, fields(tenant = %display_affinity(tenant)))]
    pub async fn establish<F, T, E>(&self, tenant: Option<TenantId>, work: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c ScopedContext) -> ScopedFuture<'c, T, E> + Send,
        T: Send,
        E: From<DbError> + Send,
    {
        let ctx = self.bind(tenant).await.map_err(E::from)?;

        match work(&ctx).await {
            Ok(value) => {
                ctx.txn.commit().await.map_err(|e| E::from(DbError::Sea(e)))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rb) = ctx.txn.rollback().await {
                    warn!(error = %rb, "rollback after failed unit of work");
                }
                Err(err)
            }
        }
    }

    async fn bind(&self, tenant: Option<TenantId>) -> Result<ScopedContext, DbError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "cannot open transaction for tenant context");
            DbError::ContextEstablishment {
                reason: e.to_string(),
            }
        })?;

        TxTenantSession::new(&txn, &self.setting)
            .set_tenant(tenant)
            .await
            .map_err(|e| {
                error!(error = %e, "cannot bind tenant context");
                DbError::ContextEstablishment {
                    reason: e.to_string(),
                }
            })?;

        debug!("tenant context bound");
        Ok(ScopedContext { txn, tenant })
    }
}

/// A transaction with a tenant context bound to it.
pub struct ScopedContext {
    txn: DatabaseTransaction,
    tenant: Option<TenantId>,
}

impl ScopedContext {
    /// Connection to run scoped queries on.
    #[inline]
    #[must_use]
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Tenant bound to this context (`None` for global).
    #[inline]
    #[must_use]
    pub fn tenant(&self) -> Option<TenantId> {
        self.tenant
    }

    /// Check that the bound tenant is the principal's tenant.
    ///
    /// # Errors
    /// Returns [`DbError::ContextMismatch`] otherwise.
    pub fn ensure_principal(&self, principal: &Principal) -> Result<(), DbError> {
        if self.tenant == principal.tenant() {
            Ok(())
        } else {
            Err(DbError::ContextMismatch {
                bound: display_affinity(self.tenant),
                expected: display_affinity(principal.tenant()),
            })
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, Statement, Transaction};

    const T1: &str = "11111111-1111-1111-1111-111111111111";

    fn t1() -> TenantId {
        T1.parse().unwrap()
    }

    fn ok_exec() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    fn mock_db() -> Arc<DatabaseConnection> {
        Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([ok_exec()])
                .into_connection(),
        )
    }

    /// Recover the mock once every propagator holding it is gone.
    fn transaction_log(db: Arc<DatabaseConnection>) -> Vec<Transaction> {
        Arc::try_unwrap(db)
            .ok()
            .expect("connection still shared")
            .into_transaction_log()
    }

    fn bound_then(end: &str) -> Vec<Transaction> {
        vec![Transaction::many([
            Statement::from_string(DatabaseBackend::Postgres, "BEGIN"),
            Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "SELECT set_config($1, $2, true)",
                ["app.current_tenant".into(), T1.into()],
            ),
            Statement::from_string(DatabaseBackend::Postgres, end),
        ])]
    }

    #[tokio::test]
    async fn binds_tenant_and_commits() {
        let db = mock_db();
        let propagator = TenantContextPropagator::from_shared(Arc::clone(&db));

        let seen = propagator
            .establish::<_, _, DbError>(Some(t1()), |ctx| Box::pin(async move { Ok(ctx.tenant()) }))
            .await
            .unwrap();
        assert_eq!(seen, Some(t1()));

        drop(propagator);
        assert_eq!(transaction_log(db), bound_then("COMMIT"));
    }

    #[tokio::test]
    async fn global_context_binds_empty_value() {
        let db = mock_db();
        let propagator = TenantContextPropagator::from_shared(Arc::clone(&db));

        propagator
            .establish::<_, _, DbError>(None, |ctx| {
                Box::pin(async move {
                    assert!(ctx.tenant().is_none());
                    Ok(())
                })
            })
            .await
            .unwrap();

        drop(propagator);
        let log = format!("{:?}", transaction_log(db));
        assert!(log.contains("set_config"));
        assert!(log.contains("String(Some(\"\"))"));
    }

    #[tokio::test]
    async fn failed_binding_aborts_before_work() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_errors([DbErr::Custom("permission denied".to_owned())])
            .into_connection();
        let propagator = TenantContextPropagator::new(db);

        let mut ran = false;
        let result = propagator
            .establish::<_, (), DbError>(Some(t1()), |_ctx| {
                ran = true;
                Box::pin(async { Ok(()) })
            })
            .await;

        assert!(!ran);
        let err = result.unwrap_err();
        assert!(matches!(err, DbError::ContextEstablishment { .. }));
        assert_eq!(
            err.as_access_error().as_ref().map(tenantgate_security::AccessError::reason_code),
            Some("forbidden.context_establishment_failed")
        );
    }

    #[tokio::test]
    async fn work_error_rolls_back_and_is_returned_unchanged() {
        let db = mock_db();
        let propagator = TenantContextPropagator::from_shared(Arc::clone(&db));

        let result = propagator
            .establish::<_, (), DbError>(Some(t1()), |_ctx| {
                Box::pin(async { Err(DbError::UnknownProperty("x".to_owned())) })
            })
            .await;
        assert!(matches!(result, Err(DbError::UnknownProperty(_))));

        drop(propagator);
        assert_eq!(transaction_log(db), bound_then("ROLLBACK"));
    }

    #[tokio::test]
    async fn panicking_work_rolls_back_on_drop() {
        let db = mock_db();
        let propagator = TenantContextPropagator::from_shared(Arc::clone(&db));

        let joined = tokio::spawn(async move {
            propagator
                .establish::<_, (), DbError>(Some(t1()), |ctx| {
                    Box::pin(async move {
                        assert!(ctx.tenant().is_none(), "work failed mid-transaction");
                        Ok(())
                    })
                })
                .await
        })
        .await;

        assert!(joined.unwrap_err().is_panic());
        assert_eq!(transaction_log(db), bound_then("ROLLBACK"));
    }

    #[test]
    fn from_config_rejects_bad_setting() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let cfg = DbConfig {
            tenant_setting: "no_dot".to_owned(),
            ..DbConfig::default()
        };
        assert!(TenantContextPropagator::from_config(Arc::new(db), &cfg).is_err());
    }
}
