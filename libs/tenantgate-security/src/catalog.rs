//! Startup-validated set of known permission tokens.
//!
//! Tokens travel as plain strings on the wire and in storage. The catalog is
//! where a typo (`user:read:own` for `users:read:own`) is caught once at
//! startup instead of silently producing an unreachable or overly broad rule.

use std::collections::BTreeSet;

use crate::role::Role;
use crate::token::{PermissionToken, TokenParseError, TokenScope};

/// Actions expanded by [`PermissionCatalog::crud`].
pub const CRUD_ACTIONS: [&str; 4] = ["create", "read", "update", "delete"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Malformed(#[from] TokenParseError),

    #[error("permission token '{0}' is declared twice")]
    Duplicate(String),

    #[error("permission token '{0}' is not declared in the catalog")]
    Unknown(String),
}

/// The closed set of permission tokens a deployment recognizes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionCatalog {
    tokens: BTreeSet<PermissionToken>,
}

impl PermissionCatalog {
    /// Build a catalog from token strings.
    ///
    /// # Errors
    /// Fails on the first malformed or duplicated token.
    pub fn new<I, S>(tokens: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog = Self::default();
        for raw in tokens {
            catalog.declare(raw.as_ref())?;
        }
        Ok(catalog)
    }

    /// Declare one more token.
    ///
    /// # Errors
    /// Fails when the token is malformed or already declared.
    pub fn declare(&mut self, raw: &str) -> Result<PermissionToken, CatalogError> {
        let token = PermissionToken::parse(raw)?;
        if !self.tokens.insert(token.clone()) {
            return Err(CatalogError::Duplicate(raw.to_owned()));
        }
        Ok(token)
    }

    /// Declare `resource:{create,read,update,delete}:{all,own}`.
    ///
    /// # Errors
    /// Fails when `resource` is not a valid token segment or any of the
    /// expanded tokens is already declared.
    pub fn crud(&mut self, resource: &str) -> Result<(), CatalogError> {
        for action in CRUD_ACTIONS {
            for scope in [TokenScope::All, TokenScope::Own] {
                let token = PermissionToken::scoped(resource, action, scope)?;
                if !self.tokens.insert(token.clone()) {
                    return Err(CatalogError::Duplicate(token.into()));
                }
            }
        }
        Ok(())
    }

    /// Resolve a declared token.
    ///
    /// # Errors
    /// Fails when the string is malformed or not declared.
    pub fn require(&self, raw: &str) -> Result<PermissionToken, CatalogError> {
        let token = PermissionToken::parse(raw)?;
        if self.tokens.contains(&token) {
            Ok(token)
        } else {
            Err(CatalogError::Unknown(raw.to_owned()))
        }
    }

    #[must_use]
    pub fn contains(&self, token: &PermissionToken) -> bool {
        self.tokens.contains(token)
    }

    /// Tokens of `role` that the catalog does not know.
    #[must_use]
    pub fn unknown_in_role<'r>(&self, role: &'r Role) -> Vec<&'r PermissionToken> {
        role.permission_tokens
            .iter()
            .filter(|t| !self.tokens.contains(*t))
            .collect()
    }

    /// Check every token of `role` against the catalog.
    ///
    /// # Errors
    /// Returns [`CatalogError::Unknown`] for the first undeclared token.
    pub fn validate_role(&self, role: &Role) -> Result<(), CatalogError> {
        match self.unknown_in_role(role).first() {
            Some(token) => Err(CatalogError::Unknown(token.as_str().to_owned())),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionToken> {
        self.tokens.iter()
    }
}
