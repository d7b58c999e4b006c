#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Tenant Gate access control.
//!
//! Three mechanisms that must agree:
//!
//! - permission gate: [`authorize`] admits an operation when any of its
//!   required tokens is held
//! - data scoping: [`scope`] conjoins a tenant predicate into list queries,
//!   [`validate_tenant_target`] checks explicit write targets, and
//!   [`can_access`] checks entities loaded by key
//! - storage isolation: the tenant context bound by
//!   [`tenantgate_db::TenantContextPropagator`] and enforced by the
//!   row-security policy
//!
//! [`AccessGate`] composes them in request order.

pub mod config;
pub mod domain;
pub mod error;
pub mod gate;
pub mod operation;

pub use config::{AccessControlConfig, ConfigError, OperationConfig};
pub use domain::{
    Decision, authorize, can_access, ensure_access, scope, validate_tenant_target,
};
pub use error::GateError;
pub use gate::AccessGate;
pub use operation::{OperationDescriptor, OperationRegistry, RegistryError};
