use uuid::Uuid;

use crate::token::{PermissionToken, join_tokens};

/// Access-control failures.
///
/// Messages list only the public required-token list of an operation, never
/// the grants the denied principal actually holds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// No resolvable principal for the request.
    #[error("unauthenticated")]
    Unauthenticated,

    /// None of the admitting tokens is held.
    #[error("forbidden: requires any of [{}]", join_tokens(.required))]
    NoMatchingPermission { required: Vec<PermissionToken> },

    /// Target or entity tenant differs and no `:all` token is held.
    #[error("forbidden: cross-tenant {action} on {resource}")]
    CrossTenant { resource: String, action: String },

    /// Tenant context could not be bound; the request must abort.
    #[error("forbidden: tenant context could not be established: {reason}")]
    ContextEstablishmentFailed { reason: String },

    /// System-protected roles cannot be changed.
    #[error("forbidden: role {role} is system-protected")]
    ProtectedRole { role: Uuid },
}

impl AccessError {
    /// Stable reason code for logs and audit records.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NoMatchingPermission { .. } => "forbidden.no_matching_permission",
            Self::CrossTenant { .. } => "forbidden.cross_tenant",
            Self::ContextEstablishmentFailed { .. } => "forbidden.context_establishment_failed",
            Self::ProtectedRole { .. } => "forbidden.protected_role",
        }
    }

    /// Everything except [`AccessError::Unauthenticated`] is a `Forbidden`.
    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }

    #[must_use]
    pub fn context_failed(reason: impl Into<String>) -> Self {
        Self::ContextEstablishmentFailed {
            reason: reason.into(),
        }
    }
}
