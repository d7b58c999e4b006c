//! Application-side data scoping.
//!
//! List queries get a tenant predicate conjoined into their `where` slot;
//! writes with an explicit target tenant are checked before execution. Rows
//! are never inspected here.

use tenantgate_security::{
    AccessError, FieldPredicate, PermissionToken, Principal, QuerySpec, TenantId, TokenScope,
};
use tracing::{debug, info, instrument, warn};

const READ: &str = "read";

/// The `resource:action:all` / `resource:action:own` pair.
///
/// A resource or action that is not a valid token segment cannot be held by
/// anyone, so it is reported as a plain denial.
fn scoped_pair(resource: &str, action: &str) -> Result<[PermissionToken; 2], AccessError> {
    let all = PermissionToken::scoped(resource, action, TokenScope::All);
    let own = PermissionToken::scoped(resource, action, TokenScope::Own);
    match (all, own) {
        (Ok(all), Ok(own)) => Ok([all, own]),
        (Err(err), _) | (_, Err(err)) => {
            warn!(resource, action, error = %err, "malformed resource or action");
            Err(AccessError::NoMatchingPermission {
                required: Vec::new(),
            })
        }
    }
}

/// Restrict `base` to the rows `principal` may read from `resource`.
///
/// - global principal or `resource:read:all`: `base` unchanged
/// - `resource:read:own`: `tenant_id = principal.tenant` is conjoined
/// - neither: [`AccessError::NoMatchingPermission`]
///
/// Caller filters, sort, pagination and includes are preserved. Scoping an
/// already scoped query yields the same query.
///
/// # Errors
/// Returns [`AccessError::NoMatchingPermission`] when no read token for
/// `resource` is held.
#[instrument(level = "debug", skip(principal, base), fields(principal = %principal.id()))]
pub fn scope(
    principal: &Principal,
    mut base: QuerySpec,
    resource: &str,
) -> Result<QuerySpec, AccessError> {
    let Some(tenant) = principal.tenant() else {
        debug!("global principal; query unscoped");
        return Ok(base);
    };

    let [all, own] = scoped_pair(resource, READ)?;
    if principal.holds(&all) {
        debug!("cross-tenant read; query unscoped");
        return Ok(base);
    }
    if principal.holds(&own) {
        base.and_where(FieldPredicate::tenant_eq(tenant));
        debug!(%tenant, "query scoped to tenant");
        return Ok(base);
    }

    let denial = AccessError::NoMatchingPermission {
        required: vec![all, own],
    };
    info!(reason_code = denial.reason_code(), "scoping denied");
    Err(denial)
}

/// Resolve and check the tenant a write targets.
///
/// A missing `explicit` target defaults to the principal's tenant. A target
/// other than the principal's own tenant needs `resource:action:all`; global
/// principals may target any tenant. Returns the resolved target.
///
/// # Errors
/// Returns [`AccessError::CrossTenant`] for an unauthorized foreign target.
#[instrument(level = "debug", skip(principal), fields(principal = %principal.id()))]
pub fn validate_tenant_target(
    principal: &Principal,
    explicit: Option<TenantId>,
    action: &str,
    resource: &str,
) -> Result<Option<TenantId>, AccessError> {
    let own_tenant = principal.tenant();
    let target = explicit.or(own_tenant);

    if own_tenant.is_none() || target == own_tenant {
        return Ok(target);
    }

    let [all, _] = scoped_pair(resource, action)?;
    if principal.holds(&all) {
        debug!(%all, "cross-tenant target admitted");
        return Ok(target);
    }

    let denial = AccessError::CrossTenant {
        resource: resource.to_owned(),
        action: action.to_owned(),
    };
    info!(reason_code = denial.reason_code(), "tenant target denied");
    Err(denial)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use tenantgate_security::properties;

    const T1: &str = "11111111-1111-1111-1111-111111111111";
    const T2: &str = "22222222-2222-2222-2222-222222222222";

    fn tenant(raw: &str) -> TenantId {
        raw.parse().unwrap()
    }

    fn principal(tenant_id: Option<&str>, grants: &[&str]) -> Principal {
        Principal::builder()
            .tenant_affinity(tenant_id.map(tenant))
            .permissions(grants.iter().map(|t| PermissionToken::parse(t).unwrap()))
            .build()
    }

    #[test]
    fn own_scope_conjoins_tenant_predicate() {
        let p = principal(Some(T1), &["users:read:own"]);
        let base = QuerySpec::new().where_eq("status", "active").limit(5);

        let scoped = scope(&p, base, "users").unwrap();
        assert_eq!(
            scoped.predicates(),
            [
                FieldPredicate::equals("status", "active"),
                FieldPredicate::equals(properties::TENANT_ID, json!(T1)),
            ]
        );
        assert_eq!(scoped.limit_value(), Some(5));
    }

    #[test]
    fn scoping_is_idempotent() {
        let p = principal(Some(T1), &["users:read:own"]);
        let once = scope(&p, QuerySpec::new(), "users").unwrap();
        let twice = scope(&p, once.clone(), "users").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn all_scope_and_global_principal_leave_query_untouched() {
        let base = QuerySpec::new().where_eq("status", "active");

        let cross = principal(Some(T1), &["users:read:all"]);
        assert_eq!(scope(&cross, base.clone(), "users").unwrap(), base);

        let global = principal(None, &[]);
        assert_eq!(scope(&global, base.clone(), "users").unwrap(), base);
    }

    #[test]
    fn no_read_token_is_denied() {
        let p = principal(Some(T1), &["users:update:own"]);
        let err = scope(&p, QuerySpec::new(), "users").unwrap_err();
        assert_eq!(err.reason_code(), "forbidden.no_matching_permission");
    }

    #[test]
    fn malformed_resource_is_denied() {
        let p = principal(Some(T1), &["users:read:own"]);
        assert!(scope(&p, QuerySpec::new(), "Users!").is_err());
    }

    #[test]
    fn conflicting_caller_tenant_filter_is_kept() {
        let p = principal(Some(T1), &["users:read:own"]);
        let base = QuerySpec::new().where_eq(properties::TENANT_ID, T2);
        let scoped = scope(&p, base, "users").unwrap();
        assert_eq!(scoped.predicates().len(), 2);
    }

    #[test]
    fn target_defaults_to_own_tenant() {
        let p = principal(Some(T1), &["users:create:own"]);
        assert_eq!(
            validate_tenant_target(&p, None, "create", "users"),
            Ok(Some(tenant(T1)))
        );
        assert_eq!(
            validate_tenant_target(&p, Some(tenant(T1)), "create", "users"),
            Ok(Some(tenant(T1)))
        );
    }

    #[test]
    fn foreign_target_needs_all_token() {
        let own = principal(Some(T1), &["users:create:own"]);
        assert_eq!(
            validate_tenant_target(&own, Some(tenant(T2)), "create", "users"),
            Err(AccessError::CrossTenant {
                resource: "users".to_owned(),
                action: "create".to_owned(),
            })
        );

        let all = principal(Some(T1), &["users:create:all"]);
        assert_eq!(
            validate_tenant_target(&all, Some(tenant(T2)), "create", "users"),
            Ok(Some(tenant(T2)))
        );
    }

    #[test]
    fn global_principal_may_target_any_tenant() {
        let p = principal(None, &[]);
        assert_eq!(
            validate_tenant_target(&p, Some(tenant(T2)), "create", "users"),
            Ok(Some(tenant(T2)))
        );
        assert_eq!(validate_tenant_target(&p, None, "create", "users"), Ok(None));
    }
}
