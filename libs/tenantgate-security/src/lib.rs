#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Tenant Gate security model.
//!
//! Shared vocabulary of the access-control stack:
//!
//! - [`PermissionToken`] / [`PermissionSet`] - `resource:action[:scope]` grants
//! - [`Principal`] - the authenticated actor of one request
//! - [`Role`] - persisted bundle of tokens
//! - [`PermissionCatalog`] - startup-validated set of known tokens
//! - [`QuerySpec`] - query specification with a conjunctive `where` slot
//! - [`AccessError`] - denial taxonomy with stable reason codes

pub mod catalog;
pub mod error;
pub mod permission_set;
pub mod principal;
pub mod query;
pub mod role;
pub mod tenant;
pub mod token;

pub use catalog::{CatalogError, PermissionCatalog};
pub use error::AccessError;
pub use permission_set::PermissionSet;
pub use principal::{Principal, PrincipalBuilder};
pub use query::{FieldPredicate, QuerySpec, SortDirection, SortKey, properties};
pub use role::Role;
pub use tenant::{TenantId, TenantOwned, display_affinity};
pub use token::{PermissionToken, TokenParseError, TokenScope};
