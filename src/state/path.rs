//! Validated dot-delimited key paths.

use crate::error::{Result, StoreError};
use std::fmt;
use std::str::FromStr;

/// A non-empty, dot-delimited path into the state tree (`"data.ingresos"`).
///
/// Parsing validates once; every other component takes `&StatePath` and can
/// assume the segments are non-empty identifiers.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatePath {
    raw: String,
}

impl StatePath {
    /// Parse and validate a path.
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(StoreError::invalid_path(path, "path is empty"));
        }

        for segment in path.split('.') {
            if segment.is_empty() {
                return Err(StoreError::invalid_path(path, "empty segment"));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(StoreError::invalid_path(
                    path,
                    "segments may only contain ASCII letters, digits, '_' or '-'",
                ));
            }
        }

        Ok(Self {
            raw: path.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.raw.split('.')
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The last segment.
    pub fn leaf(&self) -> &str {
        match self.raw.rfind('.') {
            Some(idx) => &self.raw[idx + 1..],
            None => &self.raw,
        }
    }

    /// The immediate parent, or `None` for a top-level path.
    pub fn parent(&self) -> Option<StatePath> {
        self.raw.rfind('.').map(|idx| StatePath {
            raw: self.raw[..idx].to_string(),
        })
    }

    /// Strict ancestors, immediate parent first. The root is not included.
    pub fn ancestors(&self) -> Vec<StatePath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            current = path.parent();
            out.push(path);
        }
        out
    }

    /// True if `self` equals `prefix` or lies below it.
    pub fn is_under(&self, prefix: &str) -> bool {
        self.raw == prefix
            || (self.raw.len() > prefix.len()
                && self.raw.starts_with(prefix)
                && self.raw.as_bytes()[prefix.len()] == b'.')
    }

    /// Append a segment, validating it.
    pub fn child(&self, segment: &str) -> Result<StatePath> {
        StatePath::parse(&format!("{}.{}", self.raw, segment))
    }
}

impl fmt::Debug for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatePath({})", self.raw)
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for StatePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        StatePath::parse(s)
    }
}

impl TryFrom<&str> for StatePath {
    type Error = StoreError;

    fn try_from(s: &str) -> Result<Self> {
        StatePath::parse(s)
    }
}

impl AsRef<str> for StatePath {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

/// Well-known locations in the state tree.
pub mod paths {
    pub const LOADING: &str = "loading";
    pub const AUTH: &str = "auth";
    pub const AUTH_USER: &str = "auth.user";
    pub const AUTH_USER_ID: &str = "auth.user.id";
    pub const AUTH_PROFILE: &str = "auth.profile";
    pub const UI: &str = "ui";
    pub const UI_NOTIFICATIONS: &str = "ui.notifications";
    /// Mutations under this prefix invalidate identity-keyed cache entries.
    pub const DATA: &str = "data";
    pub const DATA_INCOMES: &str = "data.ingresos";
    pub const DATA_EXPENSES: &str = "data.gastos";
    pub const DATA_SIMULATIONS: &str = "data.simulaciones";
    pub const DATA_SUMMARY: &str = "data.resumen";
}
