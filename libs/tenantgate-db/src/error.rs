use sea_orm::DbErr;
use tenantgate_security::AccessError;
use uuid::Uuid;

/// Errors of the database layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sea(#[from] DbErr),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Binding the tenant to the session failed; the request must abort.
    #[error("tenant context could not be established: {reason}")]
    ContextEstablishment { reason: String },

    /// Data access attempted on a session whose tenant was never bound.
    #[error("tenant context was not established for this session")]
    ContextNotEstablished,

    /// The bound tenant differs from the principal's tenant.
    #[error("tenant context {bound} does not match principal tenant {expected}")]
    ContextMismatch { bound: String, expected: String },

    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error("invalid value for property '{field}'")]
    InvalidValue { field: String },

    #[error("invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    /// A write would produce a row the current tenant context may not see.
    #[error("row violates tenant isolation policy on '{table}'")]
    PolicyViolation { table: String },

    #[error("row {id} already exists in '{table}'")]
    Conflict { table: String, id: Uuid },
}

impl DbError {
    /// The access-control view of this error, if it is a tenant context
    /// failure. Every such failure is fatal for the request.
    #[must_use]
    pub fn as_access_error(&self) -> Option<AccessError> {
        match self {
            Self::ContextEstablishment { reason } => Some(AccessError::context_failed(reason.clone())),
            Self::ContextNotEstablished | Self::ContextMismatch { .. } => {
                Some(AccessError::context_failed(self.to_string()))
            }
            _ => None,
        }
    }
}

impl From<figment::Error> for DbError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
