//! Connection and tenant-context configuration.
//!
//! Layered with figment: built-in defaults, then an optional YAML file, then
//! `TENANTGATE_DB__*` environment variables.

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DbError;
use crate::session::{DEFAULT_TENANT_SETTING, validate_setting_name};

/// Environment prefix for overrides, e.g. `TENANTGATE_DB__MAX_CONNECTIONS=4`.
pub const ENV_PREFIX: &str = "TENANTGATE_DB__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbConfig {
    /// Connection string, e.g. `postgres://app@localhost/app`.
    pub dsn: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
    /// Session setting that carries the current tenant.
    pub tenant_setting: String,
    pub sqlx_logging: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 5,
            tenant_setting: DEFAULT_TENANT_SETTING.to_owned(),
            sqlx_logging: false,
        }
    }
}

impl DbConfig {
    /// Load defaults, then `yaml` (when given), then the environment.
    ///
    /// # Errors
    /// Returns [`DbError::Config`] on unreadable or unknown keys and
    /// [`DbError::InvalidIdentifier`] on a malformed tenant setting name.
    pub fn load(yaml: Option<&Path>) -> Result<Self, DbError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = yaml {
            figment = figment.merge(Yaml::file(path));
        }
        Self::from_figment(&figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Extract and validate from a caller-assembled figment.
    ///
    /// # Errors
    /// Same as [`DbConfig::load`].
    pub fn from_figment(figment: &Figment) -> Result<Self, DbError> {
        let cfg: Self = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns [`DbError::InvalidIdentifier`] when `tenant_setting` is not a
    /// dotted custom setting name.
    pub fn validate(&self) -> Result<(), DbError> {
        validate_setting_name(&self.tenant_setting)
    }

    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        let mut opts = ConnectOptions::new(self.dsn.clone());
        opts.max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .sqlx_logging(self.sqlx_logging);
        opts
    }

    /// Open the connection pool.
    ///
    /// # Errors
    /// Returns [`DbError::Sea`] when the pool cannot be created.
    pub async fn connect(&self) -> Result<DatabaseConnection, DbError> {
        let db = Database::connect(self.connect_options()).await?;
        info!(
            max_connections = self.max_connections,
            tenant_setting = %self.tenant_setting,
            "database pool ready"
        );
        Ok(db)
    }
}
