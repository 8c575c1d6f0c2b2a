//! Layer - one unit of override data
//!
//! A layer carries an ordered list of sublayer references (strongest first),
//! a flat metadata map that persists with the layer, lock/mute flags and the
//! node specs it authors.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use uuid::Uuid;

use super::node::{NodePath, NodeSpec};
use super::stack::LayerId;

/// Prefix of identifiers given to in-memory layers.
pub const ANONYMOUS_PREFIX: &str = "anon:";

/// Reference from a parent layer to one of its sublayers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SublayerRef {
    /// The path as authored in the parent, usually relative to it.
    pub asset_path: String,
    layer: Option<LayerId>,
}

impl SublayerRef {
    pub(crate) fn resolved(asset_path: impl Into<String>, layer: LayerId) -> Self {
        Self {
            asset_path: asset_path.into(),
            layer: Some(layer),
        }
    }

    pub fn broken(asset_path: impl Into<String>) -> Self {
        Self {
            asset_path: asset_path.into(),
            layer: None,
        }
    }

    /// The layer the path resolved to. `None` for a broken reference.
    pub fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    pub(crate) fn set_layer(&mut self, layer: Option<LayerId>) {
        self.layer = layer;
    }

    /// File name part of the asset path.
    pub fn file_name(&self) -> &str {
        self.asset_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.asset_path)
    }
}

/// An identifiable, orderable unit of override data.
#[derive(Debug, Clone)]
pub struct Layer {
    identifier: String,
    real_path: Option<PathBuf>,
    metadata: IndexMap<String, String>,
    sublayers: Vec<SublayerRef>,
    nodes: BTreeMap<NodePath, NodeSpec>,
    locked: bool,
    muted: bool,
}

impl Layer {
    /// Create an empty layer with the given identifier and no backing file.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            real_path: None,
            metadata: IndexMap::new(),
            sublayers: Vec::new(),
            nodes: BTreeMap::new(),
            locked: false,
            muted: false,
        }
    }

    /// Create an in-memory layer with a unique `anon:` identifier.
    pub fn anonymous() -> Self {
        Self::new(format!("{}{}", ANONYMOUS_PREFIX, Uuid::new_v4()))
    }

    /// Create an empty layer backed by a file. The path doubles as identifier.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut layer = Self::new(path.display().to_string());
        layer.real_path = Some(path);
        layer
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Resolved location of the backing file, absent for in-memory layers.
    pub fn real_path(&self) -> Option<&Path> {
        self.real_path.as_deref()
    }

    pub fn set_real_path(&mut self, path: Option<PathBuf>) {
        self.real_path = path;
    }

    pub fn is_anonymous(&self) -> bool {
        self.identifier.starts_with(ANONYMOUS_PREFIX)
    }

    /// Directory sublayer references of this layer are relative to.
    pub fn anchor_dir(&self) -> Option<&Path> {
        self.real_path.as_deref().and_then(Path::parent)
    }

    pub fn metadata(&self) -> &IndexMap<String, String> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut IndexMap<String, String> {
        &mut self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Set one metadata entry, keeping the position of an existing key.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn sublayers(&self) -> &[SublayerRef] {
        &self.sublayers
    }

    pub(crate) fn sublayers_mut(&mut self) -> &mut Vec<SublayerRef> {
        &mut self.sublayers
    }

    /// Authored sublayer paths, strongest first.
    pub fn sublayer_paths(&self) -> impl Iterator<Item = &str> {
        self.sublayers.iter().map(|s| s.asset_path.as_str())
    }

    /// Append an unresolved sublayer path. Used while building a layer
    /// before it joins a stack.
    pub fn push_sublayer_path(&mut self, asset_path: impl Into<String>) {
        self.sublayers.push(SublayerRef::broken(asset_path));
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    // === Nodes ===

    pub fn node(&self, path: &NodePath) -> Option<&NodeSpec> {
        self.nodes.get(path)
    }

    pub fn node_mut(&mut self, path: &NodePath) -> Option<&mut NodeSpec> {
        self.nodes.get_mut(path)
    }

    /// All nodes in path order.
    pub fn nodes(&self) -> impl Iterator<Item = (&NodePath, &NodeSpec)> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Author a node spec, replacing any existing one at that path.
    pub fn define_node(&mut self, path: NodePath, spec: NodeSpec) {
        self.nodes.insert(path, spec);
    }

    /// Remove a node spec and everything authored below it.
    pub fn remove_node(&mut self, path: &NodePath) -> usize {
        let before = self.nodes.len();
        self.nodes
            .retain(|candidate, _| candidate != path && !candidate.is_descendant_of(path));
        before - self.nodes.len()
    }

    /// Set an attribute, creating an untyped override spec when needed.
    pub fn set_attribute(&mut self, path: &NodePath, name: &str, value: serde_json::Value) {
        self.nodes
            .entry(path.clone())
            .or_default()
            .attributes
            .insert(name.to_string(), value);
    }

    /// Append a target to a relationship, creating the spec when needed.
    pub fn add_relationship_target(&mut self, path: &NodePath, relationship: &str, target: NodePath) {
        self.nodes
            .entry(path.clone())
            .or_default()
            .relationships
            .entry(relationship.to_string())
            .or_default()
            .push(target);
    }

    /// Immediate children of `parent` authored in this layer, in path order.
    pub fn children(&self, parent: &NodePath) -> Vec<(&NodePath, &NodeSpec)> {
        // Paths sharing the parent's text as a prefix are contiguous in the
        // map; siblings such as `meshes-old` sort among them.
        self.nodes
            .range((Bound::Excluded(parent), Bound::Unbounded))
            .take_while(|(path, _)| path.as_str().starts_with(parent.as_str()))
            .filter(|(path, _)| path.parent().as_ref() == Some(parent))
            .collect()
    }

    /// Whether the layer authors anything at or below `path`.
    pub fn has_node_under(&self, path: &NodePath) -> bool {
        self.nodes
            .keys()
            .any(|candidate| candidate == path || candidate.is_descendant_of(path))
    }
}
