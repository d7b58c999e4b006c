use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a tenant.
///
/// A tenant *affinity* is `Option<TenantId>`: `None` marks a global principal
/// or a global/system record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<TenantId> for Uuid {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TenantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Render an affinity for logs: the tenant id or `global`.
#[must_use]
pub fn display_affinity(affinity: Option<TenantId>) -> String {
    affinity.map_or_else(|| "global".to_owned(), |t| t.to_string())
}

/// Something that belongs to a tenant, or to nobody (global/system).
///
/// Implemented by entities that go through post-fetch access checks.
pub trait TenantOwned {
    /// Owning tenant; `None` for global/system records.
    fn tenant_affinity(&self) -> Option<TenantId>;
}

impl<T: TenantOwned + ?Sized> TenantOwned for &T {
    fn tenant_affinity(&self) -> Option<TenantId> {
        (**self).tenant_affinity()
    }
}
