//! Request orchestration.
//!
//! Fixed per-request order: resolve the principal, establish the tenant
//! context, authorize the operation, scope the query, run the work. The
//! routing layer calling into the gate stays outside this crate.

use std::future::ready;
use std::sync::Arc;

use tenantgate_db::{ScopedContext, ScopedFuture, TenantContextPropagator};
use tenantgate_security::{AccessError, Principal, QuerySpec};
use tracing::instrument;

use crate::domain::{authorize, scope};
use crate::error::GateError;
use crate::operation::{OperationDescriptor, OperationRegistry};

#[derive(Clone)]
pub struct AccessGate {
    registry: Arc<OperationRegistry>,
    propagator: TenantContextPropagator,
}

impl AccessGate {
    #[must_use]
    pub fn new(registry: Arc<OperationRegistry>, propagator: TenantContextPropagator) -> Self {
        Self {
            registry,
            propagator,
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Run `work` for `operation` under the principal's tenant context.
    ///
    /// # Errors
    /// [`GateError::Registry`] for an unregistered operation,
    /// [`GateError::Access`] for a missing principal, a denial or a failed
    /// context, or whatever `work` returns.
    #[instrument(skip_all, fields(operation = operation))]
    pub async fn run<F, T>(
        &self,
        principal: Option<&Principal>,
        operation: &str,
        work: F,
    ) -> Result<T, GateError>
    where
        F: for<'c> FnOnce(&'c ScopedContext) -> ScopedFuture<'c, T, GateError> + Send,
        T: Send + 'static,
    {
        let descriptor = self.registry.get(operation)?;
        let principal = resolve(principal)?;

        self.propagator
            .establish(principal.tenant(), move |ctx| {
                match admit(ctx, principal, descriptor) {
                    Ok(()) => work(ctx),
                    Err(err) => rejected(err),
                }
            })
            .await
    }

    /// [`AccessGate::run`] for list operations: `base` is scoped to what the
    /// principal may read from `resource` before `work` sees it.
    ///
    /// # Errors
    /// As [`AccessGate::run`], plus [`AccessError::NoMatchingPermission`]
    /// when no read token for `resource` is held.
    #[instrument(skip_all, fields(operation = operation, resource = resource))]
    pub async fn run_scoped<F, T>(
        &self,
        principal: Option<&Principal>,
        operation: &str,
        resource: &str,
        base: QuerySpec,
        work: F,
    ) -> Result<T, GateError>
    where
        F: for<'c> FnOnce(&'c ScopedContext, QuerySpec) -> ScopedFuture<'c, T, GateError> + Send,
        T: Send + 'static,
    {
        let descriptor = self.registry.get(operation)?;
        let principal = resolve(principal)?;

        self.propagator
            .establish(principal.tenant(), move |ctx| {
                let scoped = admit(ctx, principal, descriptor)
                    .and_then(|()| scope(principal, base, resource).map_err(GateError::from));
                match scoped {
                    Ok(query) => work(ctx, query),
                    Err(err) => rejected(err),
                }
            })
            .await
    }
}

fn resolve(principal: Option<&Principal>) -> Result<&Principal, GateError> {
    principal.ok_or_else(|| {
        tracing::info!(
            reason_code = AccessError::Unauthenticated.reason_code(),
            "access denied"
        );
        GateError::Access(AccessError::Unauthenticated)
    })
}

fn admit(
    ctx: &ScopedContext,
    principal: &Principal,
    descriptor: &OperationDescriptor,
) -> Result<(), GateError> {
    ctx.ensure_principal(principal)?;
    authorize(Some(principal), descriptor.required()).into_result()?;
    Ok(())
}

fn rejected<'c, T: Send + 'c>(err: GateError) -> ScopedFuture<'c, T, GateError> {
    Box::pin(ready(Err(err)))
}
