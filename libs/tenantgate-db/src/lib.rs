#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Tenant Gate database layer.
//!
//! - [`TenantContextPropagator`] binds the principal's tenant to a
//!   transaction before any data access
//! - [`RowSecurityPolicy`] / [`RowSecurityMigration`] install the storage
//!   isolation policy
//! - [`cond`] compiles a scoped [`tenantgate_security::QuerySpec`] into a
//!   `SeaORM` select
//! - [`memory::MemoryStore`] enforces the same policy in-process

pub mod cond;
pub mod config;
pub mod error;
pub mod memory;
pub mod policy;
pub mod propagator;
pub mod session;

pub use cond::{ScopableEntity, apply_query, build_condition};
pub use config::DbConfig;
pub use error::DbError;
pub use memory::{MemoryRow, MemorySession, MemoryStore};
pub use policy::{RowSecurityMigration, RowSecurityPolicy, row_visible};
pub use propagator::{ScopedContext, ScopedFuture, TenantContextPropagator};
pub use session::{DEFAULT_TENANT_SETTING, TenantSession, TxTenantSession};

// Re-exported so callers build migrations against the same version.
pub use sea_orm;
pub use sea_orm_migration;
