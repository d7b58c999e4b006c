//! Single-entity checks after fetch-by-key, where query-time scoping no
//! longer applies.

use tenantgate_security::{AccessError, PermissionToken, Principal, TenantOwned, TokenScope};
use tracing::{debug, info};

/// Whether `principal` may act on `entity` with `token`.
///
/// A missing entity is never accessible, so callers can branch uniformly to
/// not-found. Global principals pass for any present entity. Tokens without
/// a scope suffix gate global-only operations and never pass here.
#[must_use]
pub fn can_access<E: TenantOwned>(
    principal: &Principal,
    entity: Option<&E>,
    token: &PermissionToken,
) -> bool {
    let Some(entity) = entity else {
        return false;
    };
    if principal.is_global() {
        return true;
    }
    match token.scope() {
        Some(TokenScope::All) => principal.holds(token),
        Some(TokenScope::Own) => {
            principal.holds(token) && entity.tenant_affinity() == principal.tenant()
        }
        None => false,
    }
}

/// [`can_access`] for a present entity, with the denial reason.
///
/// # Errors
/// Returns [`AccessError::CrossTenant`] when an `:own` token is held but the
/// entity belongs to another tenant, [`AccessError::NoMatchingPermission`]
/// otherwise.
pub fn ensure_access<E: TenantOwned>(
    principal: &Principal,
    entity: &E,
    token: &PermissionToken,
) -> Result<(), AccessError> {
    if can_access(principal, Some(entity), token) {
        debug!(principal = %principal.id(), %token, "entity access admitted");
        return Ok(());
    }

    let denial = if token.scope() == Some(TokenScope::Own) && principal.holds(token) {
        AccessError::CrossTenant {
            resource: token.resource().to_owned(),
            action: token.action().to_owned(),
        }
    } else {
        AccessError::NoMatchingPermission {
            required: vec![token.clone()],
        }
    };
    info!(
        principal = %principal.id(),
        reason_code = denial.reason_code(),
        %token,
        "entity access denied"
    );
    Err(denial)
}
