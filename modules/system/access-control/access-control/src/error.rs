use tenantgate_db::DbError;
use tenantgate_security::AccessError;

use crate::operation::RegistryError;

/// Failure of a gated request.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Denied, or the tenant context could not be established.
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Db(DbError),
}

impl GateError {
    /// The access-control failure, if this is one.
    #[must_use]
    pub fn access(&self) -> Option<&AccessError> {
        match self {
            Self::Access(err) => Some(err),
            _ => None,
        }
    }
}

/// Tenant context failures become [`AccessError::ContextEstablishmentFailed`];
/// every other storage error stays a storage error.
impl From<DbError> for GateError {
    fn from(err: DbError) -> Self {
        match err.as_access_error() {
            Some(access) => Self::Access(access),
            None => Self::Db(err),
        }
    }
}
