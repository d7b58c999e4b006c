//! Permission gate.
//!
//! Pure set membership: an operation is admitted when the principal holds any
//! one of its required tokens.

use tenantgate_security::token::join_tokens;
use tenantgate_security::{AccessError, PermissionToken, Principal};
use tracing::{debug, info};

/// Outcome of [`authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admit,
    /// Carries [`AccessError::Unauthenticated`] or
    /// [`AccessError::NoMatchingPermission`].
    Deny(AccessError),
}

impl Decision {
    #[inline]
    #[must_use]
    pub fn is_admit(&self) -> bool {
        matches!(self, Self::Admit)
    }

    /// # Errors
    /// Returns the denial reason for [`Decision::Deny`].
    pub fn into_result(self) -> Result<(), AccessError> {
        match self {
            Self::Admit => Ok(()),
            Self::Deny(err) => Err(err),
        }
    }
}

/// Admit iff `principal` holds at least one of `required`.
///
/// An empty `required` list admits unconditionally, even without a
/// principal. A missing principal is denied as unauthenticated. The denial
/// lists the required tokens only; the principal's grants never appear in the
/// decision or in the logs.
#[must_use]
pub fn authorize(principal: Option<&Principal>, required: &[PermissionToken]) -> Decision {
    if required.is_empty() {
        debug!("no permission required");
        return Decision::Admit;
    }

    let Some(principal) = principal else {
        let denial = AccessError::Unauthenticated;
        info!(
            reason_code = denial.reason_code(),
            required = %join_tokens(required),
            "access denied"
        );
        return Decision::Deny(denial);
    };

    if let Some(token) = principal.permissions().first_held(required) {
        debug!(principal = %principal.id(), %token, "access admitted");
        return Decision::Admit;
    }

    let denial = AccessError::NoMatchingPermission {
        required: required.to_vec(),
    };
    info!(
        principal = %principal.id(),
        reason_code = denial.reason_code(),
        required = %join_tokens(required),
        "access denied"
    );
    Decision::Deny(denial)
}
