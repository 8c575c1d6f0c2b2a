//! Scene-graph addressing
//!
//! Nodes are not allocated on their own: a layer stores a flat map from
//! [`NodePath`] to [`NodeSpec`] and resolves children by path prefix.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ModStackError, Result};

/// Absolute, `/`-separated path of a node, e.g. `/RootNode/meshes/mesh_0123456789ABCDEF`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    /// Parse and validate a node path.
    ///
    /// The path must be absolute and must not contain empty segments.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(ModStackError::invalid_input(format!(
                "node path must be absolute: {path:?}"
            )));
        }
        if path.len() > 1 && path[1..].split('/').any(|segment| segment.is_empty()) {
            return Err(ModStackError::invalid_input(format!(
                "node path has an empty segment: {path:?}"
            )));
        }
        Ok(Self(path))
    }

    /// The absolute root path `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the absolute root.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Last segment of the path. Empty for the root.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Parent path, `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Append one segment.
    pub fn child(&self, name: &str) -> Result<NodePath> {
        if name.is_empty() || name.contains('/') {
            return Err(ModStackError::invalid_input(format!(
                "invalid node name: {name:?}"
            )));
        }
        if self.is_root() {
            Ok(Self(format!("/{name}")))
        } else {
            Ok(Self(format!("{}/{name}", self.0)))
        }
    }

    /// Path segments from the root down.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Whether `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &NodePath) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodePath {
    type Err = ModStackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodePath {
    type Error = ModStackError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

/// Authored data for one node in one layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Schema type, e.g. `Mesh` or `Material`. Absent for pure overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, serde_json::Value>,

    /// Named references to other nodes, each with an ordered target list.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub relationships: IndexMap<String, Vec<NodePath>>,
}

impl NodeSpec {
    /// A typed node with no properties.
    pub fn typed(type_name: &str) -> Self {
        Self {
            type_name: Some(type_name.to_string()),
            ..Self::default()
        }
    }

    /// Whether this spec carries at least one property edit.
    pub fn has_edits(&self) -> bool {
        !self.attributes.is_empty() || !self.relationships.is_empty()
    }

    /// Targets of a relationship, empty when not authored.
    pub fn targets(&self, relationship: &str) -> &[NodePath] {
        self.relationships
            .get(relationship)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
