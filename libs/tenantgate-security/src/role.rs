use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AccessError;
use crate::principal::Principal;
use crate::tenant::TenantId;
use crate::token::PermissionToken;

/// A persisted bundle of permission tokens.
///
/// Persistence itself lives outside this crate; tokens are stored as a plain
/// string array and validated on deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    /// Tenant the role belongs to; `None` for a global role.
    #[serde(default)]
    pub tenant_scope: Option<TenantId>,
    #[serde(default)]
    pub permission_tokens: Vec<PermissionToken>,
    /// Built-in role that must not be edited or deleted.
    #[serde(default)]
    pub is_system_protected: bool,
    /// Assigned to newly provisioned principals.
    #[serde(default)]
    pub is_default: bool,
}

impl Role {
    /// Reject modification or deletion of system-protected roles.
    ///
    /// # Errors
    /// Returns [`AccessError::ProtectedRole`] when the role is system-protected.
    pub fn ensure_mutable(&self) -> Result<(), AccessError> {
        if self.is_system_protected {
            return Err(AccessError::ProtectedRole { role: self.id });
        }
        Ok(())
    }

    /// Same visibility rule as the row policy: global roles are visible to
    /// everyone, tenant roles to their tenant, and global principals see all.
    #[must_use]
    pub fn is_visible_to(&self, principal: &Principal) -> bool {
        match (self.tenant_scope, principal.tenant()) {
            (None, _) | (_, None) => true,
            (Some(scope), Some(own)) => scope == own,
        }
    }

    /// Roles flagged for automatic assignment.
    pub fn defaults(roles: &[Self]) -> impl Iterator<Item = &Self> {
        roles.iter().filter(|r| r.is_default)
    }
}
