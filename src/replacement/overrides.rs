//! Override sets
//!
//! An override set is the set of node paths a non-capture layer edits. Mod
//! layers can nest sublayers of their own, so the whole subtree under every
//! replacement layer is scanned.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use tracing::trace;

use crate::layers::{LayerRole, LayerStack, NodePath, RoleRegistry};

/// Node paths carrying at least one attribute or relationship edit.
pub type OverrideSet = BTreeSet<NodePath>;

/// Overrides authored under every replacement layer, keyed by the
/// identifier of the layer that authors them, strongest layer first.
pub fn collect_overrides(stack: &LayerStack) -> IndexMap<String, OverrideSet> {
    let mut collected = IndexMap::new();
    let mut visited = HashSet::new();

    for replacement in stack.find_all(LayerRole::Replacement) {
        for id in stack.walk_from(replacement) {
            if !visited.insert(id) {
                continue;
            }
            let Some(layer) = stack.layer(id) else {
                continue;
            };
            if RoleRegistry::has_role(layer, LayerRole::Capture) {
                continue;
            }
            let edited: OverrideSet = layer
                .nodes()
                .filter(|(_, spec)| spec.has_edits())
                .map(|(path, _)| path.clone())
                .collect();
            trace!(layer = layer.identifier(), overrides = edited.len(), "overrides collected");
            if !edited.is_empty() {
                collected.insert(layer.identifier().to_string(), edited);
            }
        }
    }
    collected
}

/// Union of every override set in the stack.
pub fn merged_overrides(stack: &LayerStack) -> OverrideSet {
    collect_overrides(stack).into_values().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Layer, NodeSpec};
    use serde_json::json;

    fn tagged(identifier: &str, role: LayerRole) -> Layer {
        let mut layer = Layer::new(identifier);
        RoleRegistry::tag(&mut layer, role);
        layer
    }

    fn path(value: &str) -> NodePath {
        NodePath::new(value).unwrap()
    }

    #[test]
    fn test_collects_nested_mod_layers() {
        let mut stack = LayerStack::new(tagged("project", LayerRole::Workfile));
        let mut mod_layer = tagged("mod", LayerRole::Replacement);
        mod_layer.set_attribute(&path("/RootNode/meshes/mesh_0000000000000001"), "visibility", json!("invisible"));
        mod_layer.define_node(path("/RootNode/meshes/mesh_0000000000000002"), NodeSpec::typed("Mesh"));
        let _ = stack.insert(mod_layer, 0);

        let mod_id = stack.find_role(LayerRole::Replacement).unwrap();
        let mut nested = Layer::new("nested");
        nested.set_attribute(&path("/RootNode/Looks/mat_0000000000000003/Shader"), "diffuse", json!([1, 0, 0]));
        let _ = stack.insert_into(mod_id, nested, 0);

        let mut capture = tagged("capture", LayerRole::Capture);
        capture.set_attribute(&path("/RootNode/meshes/mesh_0000000000000004"), "points", json!([]));
        let _ = stack.insert(capture, 1);

        let overrides = collect_overrides(&stack);
        assert_eq!(overrides.keys().collect::<Vec<_>>(), vec!["mod", "nested"]);
        assert_eq!(overrides["mod"].len(), 1);
        assert_eq!(merged_overrides(&stack).len(), 2);
    }

    #[test]
    fn test_no_replacement_layer() {
        let stack = LayerStack::new(tagged("project", LayerRole::Workfile));
        assert!(collect_overrides(&stack).is_empty());
    }
}
