//! Permission tokens: `resource:action[:scope]`.
//!
//! Tokens are compared by exact string equality. There is no hierarchy:
//! `users:read:all` does not imply `users:read:own`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Separator between token segments.
pub const SEPARATOR: char = ':';

/// Scope suffix of a permission token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenScope {
    /// Cross-tenant capability.
    All,
    /// Same-tenant-only capability.
    Own,
}

impl TokenScope {
    /// Wire form of the scope suffix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Own => "own",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a well-formed permission token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenParseError {
    #[error("permission token is empty")]
    Empty,

    #[error("permission token '{0}' must have 2 or 3 colon-separated segments")]
    SegmentCount(String),

    #[error("permission token '{token}' has an empty segment")]
    EmptySegment { token: String },

    #[error("permission token '{token}' contains invalid character '{ch}'")]
    InvalidCharacter { token: String, ch: char },

    #[error("permission token '{token}' has unknown scope '{scope}' (expected 'all' or 'own')")]
    UnknownScope { token: String, scope: String },
}

/// An immutable, validated `resource:action[:scope]` permission token.
///
/// The original string is kept as-is so that membership tests are plain
/// string equality and the storage representation stays a string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionToken {
    raw: String,
    resource_end: usize,
    action_end: usize,
    scope: Option<TokenScope>,
}

impl PermissionToken {
    /// Parse and validate a token string.
    ///
    /// # Errors
    /// Returns [`TokenParseError`] when the string is not lowercase
    /// `resource:action[:scope]` with `scope` in `{all, own}`.
    pub fn parse(raw: &str) -> Result<Self, TokenParseError> {
        if raw.is_empty() {
            return Err(TokenParseError::Empty);
        }

        let segments: Vec<&str> = raw.split(SEPARATOR).collect();
        if !(2..=3).contains(&segments.len()) {
            return Err(TokenParseError::SegmentCount(raw.to_owned()));
        }

        for segment in &segments {
            if segment.is_empty() {
                return Err(TokenParseError::EmptySegment {
                    token: raw.to_owned(),
                });
            }
            if let Some(ch) = segment.chars().find(|c| !is_segment_char(*c)) {
                return Err(TokenParseError::InvalidCharacter {
                    token: raw.to_owned(),
                    ch,
                });
            }
        }

        let scope = match segments.get(2) {
            None => None,
            Some(&"all") => Some(TokenScope::All),
            Some(&"own") => Some(TokenScope::Own),
            Some(other) => {
                return Err(TokenParseError::UnknownScope {
                    token: raw.to_owned(),
                    scope: (*other).to_owned(),
                });
            }
        };

        let resource_end = segments[0].len();
        let action_end = resource_end + 1 + segments[1].len();

        Ok(Self {
            raw: raw.to_owned(),
            resource_end,
            action_end,
            scope,
        })
    }

    /// Build `resource:action:scope`.
    ///
    /// # Errors
    /// Returns [`TokenParseError`] if `resource` or `action` are not valid segments.
    pub fn scoped(resource: &str, action: &str, scope: TokenScope) -> Result<Self, TokenParseError> {
        Self::parse(&format!("{resource}{SEPARATOR}{action}{SEPARATOR}{scope}"))
    }

    /// Build an unscoped (global-only) `resource:action` token.
    ///
    /// # Errors
    /// Returns [`TokenParseError`] if `resource` or `action` are not valid segments.
    pub fn global(resource: &str, action: &str) -> Result<Self, TokenParseError> {
        Self::parse(&format!("{resource}{SEPARATOR}{action}"))
    }

    /// The full token string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The resource segment.
    #[inline]
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.raw[..self.resource_end]
    }

    /// The action segment.
    #[inline]
    #[must_use]
    pub fn action(&self) -> &str {
        &self.raw[self.resource_end + 1..self.action_end]
    }

    /// The scope suffix; `None` marks a global-only operation.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> Option<TokenScope> {
        self.scope
    }

    /// The same `resource:action` with a different scope.
    #[must_use]
    pub fn with_scope(&self, scope: TokenScope) -> Self {
        let base = &self.raw[..self.action_end];
        Self {
            raw: format!("{base}{SEPARATOR}{scope}"),
            resource_end: self.resource_end,
            action_end: self.action_end,
            scope: Some(scope),
        }
    }
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

impl fmt::Display for PermissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for PermissionToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PermissionToken {
    type Error = TokenParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for PermissionToken {
    type Error = TokenParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PermissionToken> for String {
    fn from(token: PermissionToken) -> Self {
        token.raw
    }
}

impl AsRef<str> for PermissionToken {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

/// Join tokens for log and error messages: `a:b:all, a:b:own`.
#[must_use]
pub fn join_tokens(tokens: &[PermissionToken]) -> String {
    tokens
        .iter()
        .map(PermissionToken::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
