//! Root-alias qualified relative paths.
//!
//! A [`PortablePath`] renders as `ALIAS:relative/path`. Directory paths end
//! with `/` and the root of a tree is `ALIAS:`, so the same logical
//! location compares equal on every machine regardless of where the root
//! is mounted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use filehub_core::{AppError, AppResult, ErrorCode};

/// A location expressed relative to a named tree root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortablePath {
    root_alias: String,
    rel_path: String,
}

impl PortablePath {
    /// The root folder of the tree named `root_alias`.
    pub fn root(root_alias: impl Into<String>) -> Self {
        Self {
            root_alias: root_alias.into(),
            rel_path: String::new(),
        }
    }

    /// Build a path from its parts. A leading `/` on `rel_path` is dropped.
    pub fn new(root_alias: impl Into<String>, rel_path: impl Into<String>) -> Self {
        let rel_path = rel_path.into();
        let rel_path = match rel_path.strip_prefix('/') {
            Some(stripped) => stripped.to_string(),
            None => rel_path,
        };
        Self {
            root_alias: root_alias.into(),
            rel_path,
        }
    }

    /// Parse the `ALIAS:relative/path` form.
    pub fn parse(portable: &str) -> AppResult<Self> {
        let Some((alias, rel)) = portable.split_once(':') else {
            return Err(AppError::coded(
                ErrorCode::InvalidPortablePath,
                format!("Missing root alias in '{portable}'"),
            ));
        };
        if alias.is_empty() || alias.contains('/') {
            return Err(AppError::coded(
                ErrorCode::InvalidPortablePath,
                format!("Invalid root alias in '{portable}'"),
            ));
        }
        if rel.starts_with('/') {
            return Err(AppError::coded(
                ErrorCode::InvalidPortablePath,
                format!("Relative part of '{portable}' must not start with '/'"),
            ));
        }
        Ok(Self::new(alias, rel))
    }

    /// The name of the tree root this path is relative to.
    pub fn root_alias(&self) -> &str {
        &self.root_alias
    }

    /// The path below the root, with a trailing `/` for directories.
    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    /// Whether this is the tree root itself.
    pub fn is_root(&self) -> bool {
        self.rel_path.is_empty()
    }

    /// Whether this path names a directory.
    pub fn is_dir(&self) -> bool {
        self.rel_path.is_empty() || self.rel_path.ends_with('/')
    }

    /// The last path component. The root's filename is its alias.
    pub fn filename(&self) -> &str {
        let trimmed = self.rel_path.trim_end_matches('/');
        if trimmed.is_empty() {
            return &self.root_alias;
        }
        match trimmed.rfind('/') {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    }

    /// Number of components, counting the root as one.
    pub fn depth(&self) -> usize {
        let trimmed = self.rel_path.trim_end_matches('/');
        if trimmed.is_empty() {
            1
        } else {
            trimmed.matches('/').count() + 2
        }
    }

    /// The directory containing this path. The root is its own parent.
    pub fn dir(&self) -> Self {
        let trimmed = self.rel_path.trim_end_matches('/');
        let rel_path = match trimmed.rfind('/') {
            Some(idx) => format!("{}/", &trimmed[..idx]),
            None => String::new(),
        };
        Self {
            root_alias: self.root_alias.clone(),
            rel_path,
        }
    }

    /// The path of a child named `name` inside this directory.
    pub fn child(&self, name: &str, is_dir: bool) -> Self {
        let mut rel_path = self.rel_path.clone();
        if !rel_path.is_empty() && !rel_path.ends_with('/') {
            rel_path.push('/');
        }
        rel_path.push_str(name.trim_matches('/'));
        if is_dir {
            rel_path.push('/');
        }
        Self {
            root_alias: self.root_alias.clone(),
            rel_path,
        }
    }

    /// The same relative path under a different root alias.
    pub fn overwrite_root(&self, root_alias: impl Into<String>) -> Self {
        Self {
            root_alias: root_alias.into(),
            rel_path: self.rel_path.clone(),
        }
    }

    /// Whether `self` is `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &PortablePath) -> bool {
        self.root_alias == prefix.root_alias
            && (prefix.is_root() || self.rel_path.starts_with(&prefix.rel_path))
    }

    /// Whether `self` sits directly inside the directory `dir`.
    pub fn is_direct_child_of(&self, dir: &PortablePath) -> bool {
        !self.is_root() && self.dir() == *dir
    }
}

impl fmt::Display for PortablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.root_alias, self.rel_path)
    }
}

impl FromStr for PortablePath {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PortablePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PortablePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
