//! Hash index over a capture layer
//!
//! Walks the three namespace roots of a capture (materials, meshes, lights)
//! and records the content hash of every immediate child. Meshes also
//! contribute their material binding, which builds the material -> meshes
//! grouping used by the replacement grouper.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::hash::{AssetKind, ContentHash, HashPattern};
use crate::config::Conventions;
use crate::error::Result;
use crate::layers::{Layer, NodePath, NodeSpec};

/// Result of indexing one capture layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashIndex {
    /// Every hash found under the three roots, with the node carrying it.
    pub hash_to_path: BTreeMap<ContentHash, NodePath>,
    /// Material hash to the hashes of the meshes bound to it.
    pub material_to_meshes: BTreeMap<ContentHash, BTreeSet<ContentHash>>,
    /// Hashes found under the materials root.
    pub materials: BTreeSet<ContentHash>,
}

impl HashIndex {
    /// Hashes that count as standalone assets: meshes and lights. Materials
    /// are only ever represented through the meshes bound to them.
    pub fn all_known(&self) -> BTreeSet<ContentHash> {
        self.hash_to_path
            .keys()
            .filter(|hash| !self.materials.contains(*hash) && !self.material_to_meshes.contains_key(*hash))
            .cloned()
            .collect()
    }

    pub fn path_of(&self, hash: &ContentHash) -> Option<&NodePath> {
        self.hash_to_path.get(hash)
    }

    /// Meshes bound to a material, if any.
    pub fn meshes_for(&self, material: &ContentHash) -> Option<&BTreeSet<ContentHash>> {
        self.material_to_meshes.get(material)
    }

    pub fn is_empty(&self) -> bool {
        self.hash_to_path.is_empty()
    }
}

/// Builds [`HashIndex`]es from capture layers.
#[derive(Debug, Clone)]
pub struct HashIndexer {
    conventions: Conventions,
    pattern: HashPattern,
}

impl HashIndexer {
    pub fn new(conventions: Conventions) -> Result<Self> {
        let pattern = HashPattern::from_conventions(&conventions)?;
        Ok(Self {
            conventions,
            pattern,
        })
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    pub fn pattern(&self) -> &HashPattern {
        &self.pattern
    }

    /// Index a capture layer. Missing roots and malformed names contribute
    /// nothing; this never fails.
    pub fn index(&self, capture: &Layer) -> HashIndex {
        let mut index = HashIndex::default();

        for (root, kind) in [
            (self.conventions.materials_path(), AssetKind::Material),
            (self.conventions.meshes_path(), AssetKind::Mesh),
            (self.conventions.lights_path(), AssetKind::Light),
        ] {
            let Ok(root) = NodePath::new(root) else {
                debug!(kind = ?kind, "namespace root is not a valid node path");
                continue;
            };
            for (path, spec) in capture.children(&root) {
                let hash = match ContentHash::from_node_name(path.name()) {
                    Ok(hash) => hash,
                    Err(err) => {
                        trace!(path = %path, error = %err, "skipping unhashed node");
                        continue;
                    }
                };
                if kind == AssetKind::Material {
                    index.materials.insert(hash.clone());
                }
                if kind == AssetKind::Mesh {
                    if let Some(material) = self.binding_of(capture, path, spec) {
                        index
                            .material_to_meshes
                            .entry(material)
                            .or_default()
                            .insert(hash.clone());
                    }
                }
                if let Some(existing) = index.hash_to_path.get(&hash) {
                    debug!(hash = %hash, kept = %existing, ignored = %path, "duplicate content hash");
                    continue;
                }
                index.hash_to_path.insert(hash, path.clone());
            }
        }

        debug!(
            capture = capture.identifier(),
            hashes = index.hash_to_path.len(),
            groups = index.material_to_meshes.len(),
            "capture indexed"
        );
        index
    }

    /// Material bound to a mesh, read from the mesh node or, failing that,
    /// from its first child carrying a binding. Only the first target counts.
    fn binding_of(&self, capture: &Layer, mesh: &NodePath, spec: &NodeSpec) -> Option<ContentHash> {
        let relationship = self.conventions.material_binding.as_str();
        let target = spec.targets(relationship).first().or_else(|| {
            capture
                .children(mesh)
                .into_iter()
                .find_map(|(_, child)| child.targets(relationship).first())
        })?;
        match self.pattern.find(target) {
            Ok((AssetKind::Material, hash)) => Some(hash),
            Ok((kind, _)) => {
                debug!(mesh = %mesh, target = %target, kind = ?kind, "binding target is not a material");
                None
            }
            Err(err) => {
                debug!(mesh = %mesh, target = %target, error = %err, "unhashed binding target");
                None
            }
        }
    }
}
