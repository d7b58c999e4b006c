//! Typed operation descriptors and the startup registration table.
//!
//! The routing layer looks an operation up by name and hands its required
//! token list to [`crate::authorize`]. Every token is checked against the
//! [`PermissionCatalog`] when the operation is registered.

use std::collections::BTreeMap;

use tenantgate_security::{CatalogError, PermissionCatalog, PermissionToken};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("operation '{0}' declares no required permission")]
    EmptyRequirement(String),

    #[error("operation '{0}' is registered twice")]
    Duplicate(String),

    #[error("operation '{0}' is not registered")]
    UnknownOperation(String),

    #[error("operation '{operation}': {source}")]
    Catalog {
        operation: String,
        #[source]
        source: CatalogError,
    },
}

/// An operation and the ordered tokens that admit it (any one suffices).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    name: String,
    required: Vec<PermissionToken>,
}

impl OperationDescriptor {
    /// # Errors
    /// Returns [`RegistryError::EmptyRequirement`] for an empty token list.
    pub fn new(
        name: impl Into<String>,
        required: Vec<PermissionToken>,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        if required.is_empty() {
            return Err(RegistryError::EmptyRequirement(name));
        }
        Ok(Self { name, required })
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn required(&self) -> &[PermissionToken] {
        &self.required
    }
}

#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    catalog: PermissionCatalog,
    operations: BTreeMap<String, OperationDescriptor>,
}

impl OperationRegistry {
    #[must_use]
    pub fn new(catalog: PermissionCatalog) -> Self {
        Self {
            catalog,
            operations: BTreeMap::new(),
        }
    }

    /// Register `name` guarded by `required` token strings.
    ///
    /// # Errors
    /// Fails on an empty list, a token the catalog does not declare, or a
    /// name that is already registered.
    pub fn register(
        &mut self,
        name: &str,
        required: &[&str],
    ) -> Result<&OperationDescriptor, RegistryError> {
        let tokens = required
            .iter()
            .map(|raw| {
                self.catalog
                    .require(raw)
                    .map_err(|source| RegistryError::Catalog {
                        operation: name.to_owned(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.insert(OperationDescriptor::new(name, tokens)?)
    }

    /// Register a prebuilt descriptor.
    ///
    /// # Errors
    /// Same as [`OperationRegistry::register`].
    pub fn register_descriptor(
        &mut self,
        descriptor: OperationDescriptor,
    ) -> Result<&OperationDescriptor, RegistryError> {
        if let Some(unknown) = descriptor
            .required
            .iter()
            .find(|t| !self.catalog.contains(t))
        {
            return Err(RegistryError::Catalog {
                operation: descriptor.name.clone(),
                source: CatalogError::Unknown(unknown.as_str().to_owned()),
            });
        }
        self.insert(descriptor)
    }

    fn insert(
        &mut self,
        descriptor: OperationDescriptor,
    ) -> Result<&OperationDescriptor, RegistryError> {
        use std::collections::btree_map::Entry;

        match self.operations.entry(descriptor.name.clone()) {
            Entry::Occupied(_) => Err(RegistryError::Duplicate(descriptor.name)),
            Entry::Vacant(slot) => {
                debug!(operation = %descriptor.name, "operation registered");
                Ok(slot.insert(descriptor))
            }
        }
    }

    /// # Errors
    /// Returns [`RegistryError::UnknownOperation`] for an unregistered name.
    pub fn get(&self, name: &str) -> Result<&OperationDescriptor, RegistryError> {
        self.operations
            .get(name)
            .ok_or_else(|| RegistryError::UnknownOperation(name.to_owned()))
    }

    #[must_use]
    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.values()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn registry() -> OperationRegistry {
        let mut catalog = PermissionCatalog::default();
        catalog.crud("users").unwrap();
        catalog.declare("tenants:create").unwrap();
        OperationRegistry::new(catalog)
    }

    #[test]
    fn registers_ordered_requirements() {
        let mut reg = registry();
        let op = reg
            .register("users.list", &["users:read:all", "users:read:own"])
            .unwrap();
        assert_eq!(op.name(), "users.list");
        assert_eq!(op.required()[0].as_str(), "users:read:all");
        assert_eq!(op.required()[1].as_str(), "users:read:own");
        assert_eq!(reg.get("users.list").unwrap().required().len(), 2);
    }

    #[test]
    fn rejects_typos_empty_lists_and_duplicates() {
        let mut reg = registry();
        assert!(matches!(
            reg.register("users.list", &["user:read:own"]),
            Err(RegistryError::Catalog { .. })
        ));
        assert_eq!(
            reg.register("noop", &[]).unwrap_err(),
            RegistryError::EmptyRequirement("noop".to_owned())
        );

        reg.register("tenants.create", &["tenants:create"]).unwrap();
        assert_eq!(
            reg.register("tenants.create", &["tenants:create"]).unwrap_err(),
            RegistryError::Duplicate("tenants.create".to_owned())
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn descriptor_tokens_must_be_declared() {
        let mut reg = registry();
        let desc = OperationDescriptor::new(
            "roles.delete",
            vec![PermissionToken::parse("roles:delete:all").unwrap()],
        )
        .unwrap();
        assert!(reg.register_descriptor(desc).is_err());
        assert!(matches!(
            reg.get("roles.delete"),
            Err(RegistryError::UnknownOperation(_))
        ));
    }
}
