use uuid::Uuid;

use crate::permission_set::PermissionSet;
use crate::role::Role;
use crate::tenant::{TenantId, display_affinity};
use crate::token::PermissionToken;

/// The authenticated actor of one request.
///
/// Resolved fresh at authentication time for every request and never
/// persisted, so role revocation takes effect on the next request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    id: Uuid,
    tenant: Option<TenantId>,
    permissions: PermissionSet,
}

impl Principal {
    #[must_use]
    pub fn builder() -> PrincipalBuilder {
        PrincipalBuilder::default()
    }

    /// Resolve a principal from the roles assigned to it.
    ///
    /// Global roles (no tenant scope) always apply. A tenant-scoped role
    /// applies only to principals of that tenant; a global principal may hold
    /// any role. Roles that do not apply contribute nothing.
    #[must_use]
    pub fn from_roles(id: Uuid, tenant: Option<TenantId>, roles: &[Role]) -> Self {
        let mut permissions = PermissionSet::new();
        for role in roles {
            let applies = match (role.tenant_scope, tenant) {
                (None, _) | (Some(_), None) => true,
                (Some(scope), Some(own)) => scope == own,
            };
            if !applies {
                tracing::warn!(
                    principal_id = %id,
                    role_id = %role.id,
                    principal_tenant = %display_affinity(tenant),
                    "Skipping role scoped to a different tenant"
                );
                continue;
            }
            permissions.extend(role.permission_tokens.iter().cloned());
        }

        Self {
            id,
            tenant,
            permissions,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Tenant affinity; `None` for a global principal.
    #[inline]
    #[must_use]
    pub fn tenant(&self) -> Option<TenantId> {
        self.tenant
    }

    /// A global principal always passes tenant scoping.
    #[inline]
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.tenant.is_none()
    }

    #[inline]
    #[must_use]
    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    #[inline]
    #[must_use]
    pub fn holds(&self, token: &PermissionToken) -> bool {
        self.permissions.contains(token)
    }
}

#[derive(Debug, Default)]
pub struct PrincipalBuilder {
    id: Option<Uuid>,
    tenant: Option<TenantId>,
    permissions: PermissionSet,
}

impl PrincipalBuilder {
    #[must_use]
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn tenant(mut self, tenant: TenantId) -> Self {
        self.tenant = Some(tenant);
        self
    }

    #[must_use]
    pub fn tenant_affinity(mut self, tenant: Option<TenantId>) -> Self {
        self.tenant = tenant;
        self
    }

    #[must_use]
    pub fn permission(mut self, token: PermissionToken) -> Self {
        self.permissions.insert(token);
        self
    }

    #[must_use]
    pub fn permissions(mut self, tokens: impl IntoIterator<Item = PermissionToken>) -> Self {
        self.permissions.extend(tokens);
        self
    }

    /// Missing id defaults to a random one.
    #[must_use]
    pub fn build(self) -> Principal {
        Principal {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            tenant: self.tenant,
            permissions: self.permissions,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn tok(s: &str) -> PermissionToken {
        PermissionToken::parse(s).unwrap()
    }

    fn tenant(s: &str) -> TenantId {
        s.parse().unwrap()
    }

    const T1: &str = "11111111-1111-1111-1111-111111111111";
    const T2: &str = "22222222-2222-2222-2222-222222222222";

    fn role(tenant_scope: Option<TenantId>, tokens: &[&str]) -> Role {
        Role {
            id: Uuid::new_v4(),
            name: "test".to_owned(),
            tenant_scope,
            permission_tokens: tokens.iter().map(|t| tok(t)).collect(),
            is_system_protected: false,
            is_default: false,
        }
    }

    #[test]
    fn from_roles_unions_applicable_roles() {
        let roles = vec![
            role(None, &["users:read:own"]),
            role(Some(tenant(T1)), &["users:update:own"]),
            role(Some(tenant(T2)), &["users:delete:all"]),
        ];
        let p = Principal::from_roles(Uuid::new_v4(), Some(tenant(T1)), &roles);

        assert!(p.holds(&tok("users:read:own")));
        assert!(p.holds(&tok("users:update:own")));
        assert!(!p.holds(&tok("users:delete:all")));
    }

    #[test]
    fn global_principal_takes_every_role() {
        let roles = vec![
            role(Some(tenant(T1)), &["users:read:all"]),
            role(Some(tenant(T2)), &["users:update:all"]),
        ];
        let p = Principal::from_roles(Uuid::new_v4(), None, &roles);

        assert!(p.is_global());
        assert_eq!(p.permissions().len(), 2);
    }

    #[test]
    fn builder_defaults_to_global_without_permissions() {
        let p = Principal::builder().build();
        assert!(p.is_global());
        assert!(p.permissions().is_empty());
    }
}
