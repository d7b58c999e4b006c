use std::path::Path;

use figment::Figment;
use figment::providers::{Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tenantgate_security::{CatalogError, PermissionCatalog};

use crate::operation::{OperationRegistry, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot load access-control config: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid permission catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("invalid operation table: {0}")]
    Registry(#[from] RegistryError),
}

/// Module configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessControlConfig {
    /// Individually declared permission tokens.
    pub permissions: Vec<String>,

    /// Resources expanded to `resource:{create,read,update,delete}:{all,own}`.
    pub crud_resources: Vec<String>,

    /// Operation registration table.
    pub operations: Vec<OperationConfig>,
}

/// A single guarded operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationConfig {
    pub name: String,

    /// Admitting tokens, any one suffices. Must not be empty.
    pub requires: Vec<String>,
}

impl AccessControlConfig {
    /// Defaults merged with a YAML file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Load`] for unreadable or unknown keys.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// # Errors
    /// Fails on a malformed or duplicated token.
    pub fn build_catalog(&self) -> Result<PermissionCatalog, ConfigError> {
        let mut catalog = PermissionCatalog::new(&self.permissions)?;
        for resource in &self.crud_resources {
            catalog.crud(resource)?;
        }
        Ok(catalog)
    }

    /// Catalog plus every configured operation.
    ///
    /// # Errors
    /// Fails on any catalog error, an operation with no or undeclared
    /// tokens, or a duplicate operation name.
    pub fn build_registry(&self) -> Result<OperationRegistry, ConfigError> {
        let mut registry = OperationRegistry::new(self.build_catalog()?);
        for op in &self.operations {
            let requires: Vec<&str> = op.requires.iter().map(String::as_str).collect();
            registry.register(&op.name, &requires)?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const YAML: &str = r#"
permissions:
  - "tenants:create"
crud_resources:
  - users
  - roles
operations:
  - name: users.list
    requires: ["users:read:all", "users:read:own"]
  - name: tenants.create
    requires: ["tenants:create"]
"#;

    #[test]
    fn builds_registry_from_yaml() {
        let cfg: AccessControlConfig = match serde_saphyr::from_str(YAML) {
            Ok(cfg) => cfg,
            Err(e) => panic!("failed to parse config: {e}"),
        };

        let registry = cfg.build_registry().unwrap();
        assert_eq!(registry.catalog().len(), 17);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("users.list").unwrap().required().len(), 2);
    }

    #[test]
    fn config_rejects_unknown_fields() {
        let parsed: Result<AccessControlConfig, _> = serde_saphyr::from_str("permisions: []\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn empty_config_is_valid() {
        let parsed: Result<AccessControlConfig, _> = serde_saphyr::from_str("{}");
        let cfg = match parsed {
            Ok(cfg) => cfg,
            Err(e) => panic!("failed to parse config: {e}"),
        };
        assert!(cfg.build_registry().unwrap().is_empty());
    }

    #[test]
    fn undeclared_operation_token_fails_startup() {
        let cfg = AccessControlConfig {
            operations: vec![OperationConfig {
                name: "users.list".to_owned(),
                requires: vec!["users:read:own".to_owned()],
            }],
            ..AccessControlConfig::default()
        };
        assert!(matches!(
            cfg.build_registry(),
            Err(ConfigError::Registry(RegistryError::Catalog { .. }))
        ));
    }

    #[test]
    fn figment_layers_yaml_over_defaults() {
        let cfg: AccessControlConfig = Figment::from(Serialized::defaults(AccessControlConfig::default()))
            .merge(Yaml::string("crud_resources: [users]\n"))
            .extract()
            .unwrap();
        assert_eq!(cfg.build_catalog().unwrap().len(), 8);
    }
}
