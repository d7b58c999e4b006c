pub mod authorizer;
pub mod entity_access;
pub mod scoping;

pub use authorizer::{Decision, authorize};
pub use entity_access::{can_access, ensure_access};
pub use scoping::{scope, validate_tenant_target};
