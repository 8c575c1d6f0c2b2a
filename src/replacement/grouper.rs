//! Replacement grouping
//!
//! Decides which logical capture assets count as replaced. Meshes and
//! lights are assets in their own right. A material is never one: editing
//! a material replaces every mesh bound to it, and editing a material and
//! one of its meshes still replaces each mesh only once.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::overrides::OverrideSet;
use crate::capture::{ContentHash, HashIndex, HashIndexer, HashPattern};
use crate::config::Conventions;
use crate::error::Result;
use crate::layers::NodePath;

/// Replaced hashes and the universe they are drawn from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub replaced: BTreeSet<ContentHash>,
    pub all_known: BTreeSet<ContentHash>,
}

/// "Replaced N of M" for one capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureProgress {
    pub replaced: usize,
    pub total: usize,
}

impl CaptureProgress {
    /// Fraction replaced, 0.0 for an empty capture.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.replaced as f64 / self.total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.replaced == self.total
    }
}

/// Groups override paths into replaced capture assets.
#[derive(Debug, Clone)]
pub struct ReplacementGrouper {
    pattern: HashPattern,
    roots: Vec<NodePath>,
}

impl ReplacementGrouper {
    pub fn new(conventions: &Conventions) -> Result<Self> {
        Ok(Self {
            pattern: HashPattern::from_conventions(conventions)?,
            roots: namespace_roots(conventions),
        })
    }

    /// A grouper reading hashes the same way as `indexer`.
    pub fn for_indexer(indexer: &HashIndexer) -> Self {
        Self {
            pattern: indexer.pattern().clone(),
            roots: namespace_roots(indexer.conventions()),
        }
    }

    /// Compute the replaced and known asset sets for an override set.
    ///
    /// Paths without a content hash and hashes the capture does not know are
    /// ignored.
    pub fn replaced_and_known(&self, index: &HashIndex, overrides: &OverrideSet) -> Replacement {
        let all_known = index.all_known();
        let mut replaced = BTreeSet::new();

        for hash in self.group_hashes(overrides) {
            if let Some(meshes) = index.meshes_for(&hash) {
                replaced.extend(meshes.iter().cloned());
            } else if all_known.contains(&hash) {
                replaced.insert(hash);
            } else {
                trace!(hash = %hash, "override outside the capture");
            }
        }

        debug!(
            replaced = replaced.len(),
            known = all_known.len(),
            "replacements grouped"
        );
        Replacement {
            replaced,
            all_known,
        }
    }

    /// Content hashes named by the override paths, deduplicated.
    pub fn group_hashes(&self, overrides: &OverrideSet) -> BTreeSet<ContentHash> {
        overrides
            .iter()
            .filter_map(|path| match self.hash_of(path) {
                Ok(hash) => Some(hash),
                Err(err) => {
                    trace!(path = %path, error = %err, "override without a content hash");
                    None
                }
            })
            .collect()
    }

    /// Hash named by one override path. Below a namespace root this is the
    /// suffix of the asset node directly under the root, which is how the
    /// capture index keys it. Elsewhere the prefixed naming decides.
    fn hash_of(&self, path: &NodePath) -> Result<ContentHash> {
        let asset = self.roots.iter().find_map(|root| {
            path.as_str()
                .strip_prefix(root.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .and_then(|rest| rest.split('/').next())
        });
        match asset {
            Some(name) => ContentHash::from_node_name(name),
            None => self.pattern.find(path).map(|(_, hash)| hash),
        }
    }

    pub fn progress(&self, index: &HashIndex, overrides: &OverrideSet) -> CaptureProgress {
        let result = self.replaced_and_known(index, overrides);
        CaptureProgress {
            replaced: result.replaced.len(),
            total: result.all_known.len(),
        }
    }
}

fn namespace_roots(conventions: &Conventions) -> Vec<NodePath> {
    [
        conventions.materials_path(),
        conventions.meshes_path(),
        conventions.lights_path(),
    ]
    .into_iter()
    .filter_map(|root| NodePath::new(root).ok())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(value: &str) -> ContentHash {
        ContentHash::parse(value).unwrap()
    }

    fn path(value: &str) -> NodePath {
        NodePath::new(value).unwrap()
    }

    fn grouper() -> ReplacementGrouper {
        ReplacementGrouper::new(&Conventions::default()).unwrap()
    }

    fn index() -> HashIndex {
        let mut index = HashIndex::default();
        index.hash_to_path.insert(
            hash("1111111111111111"),
            path("/RootNode/meshes/mesh_1111111111111111"),
        );
        index.hash_to_path.insert(
            hash("AAAAAAAAAAAAAAAA"),
            path("/RootNode/Looks/mat_AAAAAAAAAAAAAAAA"),
        );
        index.materials.insert(hash("AAAAAAAAAAAAAAAA"));
        index
            .material_to_meshes
            .entry(hash("AAAAAAAAAAAAAAAA"))
            .or_default()
            .insert(hash("1111111111111111"));
        index
    }

    #[test]
    fn test_unknown_and_malformed_overrides_are_ignored() {
        let overrides = OverrideSet::from([
            path("/RootNode/meshes/mesh_9999999999999999"),
            path("/RootNode/custom/prop"),
        ]);
        let result = grouper().replaced_and_known(&index(), &overrides);
        assert!(result.replaced.is_empty());
        assert_eq!(result.all_known, BTreeSet::from([hash("1111111111111111")]));
    }

    #[test]
    fn test_group_hashes_dedups() {
        let overrides = OverrideSet::from([
            path("/RootNode/Looks/mat_AAAAAAAAAAAAAAAA"),
            path("/RootNode/Looks/mat_AAAAAAAAAAAAAAAA/Shader"),
        ]);
        assert_eq!(grouper().group_hashes(&overrides).len(), 1);
    }

    #[test]
    fn test_unprefixed_asset_under_a_root_counts() {
        let mut index = index();
        index.hash_to_path.insert(
            hash("3000000000000000"),
            path("/RootNode/lights/SphereLight_3000000000000000"),
        );
        let overrides = OverrideSet::from([path("/RootNode/lights/SphereLight_3000000000000000")]);
        let result = grouper().replaced_and_known(&index, &overrides);
        assert_eq!(result.replaced, BTreeSet::from([hash("3000000000000000")]));
    }

    #[test]
    fn test_hash_read_from_node_under_root() {
        let overrides = OverrideSet::from([path(
            "/RootNode/meshes/mesh_1111111111111111/ref_c/mesh_2222222222222222/mesh",
        )]);
        assert_eq!(
            grouper().group_hashes(&overrides),
            BTreeSet::from([hash("1111111111111111")])
        );
    }

    #[test]
    fn test_progress() {
        let overrides = OverrideSet::from([path("/RootNode/Looks/mat_AAAAAAAAAAAAAAAA/Shader")]);
        let progress = grouper().progress(&index(), &overrides);
        assert_eq!(progress, CaptureProgress { replaced: 1, total: 1 });
        assert!(progress.is_complete());
        assert_eq!(CaptureProgress::default().ratio(), 0.0);
    }
}
