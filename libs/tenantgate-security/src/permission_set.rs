use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::token::PermissionToken;

/// The set of permission tokens held by a principal.
///
/// Membership is exact token equality; no token implies another.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    tokens: BTreeSet<PermissionToken>,
}

impl PermissionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: PermissionToken) -> bool {
        self.tokens.insert(token)
    }

    #[must_use]
    pub fn contains(&self, token: &PermissionToken) -> bool {
        self.tokens.contains(token)
    }

    /// First token of `required` (in the caller's order) that this set holds.
    #[must_use]
    pub fn first_held<'a>(&self, required: &'a [PermissionToken]) -> Option<&'a PermissionToken> {
        required.iter().find(|t| self.tokens.contains(*t))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionToken> {
        self.tokens.iter()
    }
}

impl FromIterator<PermissionToken> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionToken>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}

impl Extend<PermissionToken> for PermissionSet {
    fn extend<I: IntoIterator<Item = PermissionToken>>(&mut self, iter: I) {
        self.tokens.extend(iter);
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a PermissionToken;
    type IntoIter = std::collections::btree_set::Iter<'a, PermissionToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}
