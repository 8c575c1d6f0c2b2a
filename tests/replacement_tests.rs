//! Replacement Tests
//!
//! Capture indexing and replacement grouping over a small exported capture:
//! three meshes, three materials (one shared by two meshes) and three lights.

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

use modstack::capture::{ContentHash, HashIndex, HashIndexer};
use modstack::layers::{Layer, LayerRole, LayerStack, NodePath, NodeSpec, RoleRegistry};
use modstack::replacement::{merged_overrides, OverrideSet, ReplacementGrouper};
use modstack::Conventions;

const M0: &str = "1000000000000000";
const M1: &str = "1000000000000001";
const M2: &str = "1000000000000002";
const A0: &str = "2000000000000000";
const A1: &str = "2000000000000001";
const A2: &str = "2000000000000002";
const L0: &str = "3000000000000000";
const L1: &str = "3000000000000001";
const L2: &str = "3000000000000002";

fn path(value: &str) -> NodePath {
    NodePath::new(value).unwrap()
}

fn hash(value: &str) -> ContentHash {
    ContentHash::parse(value).unwrap()
}

fn hashes(values: &[&str]) -> BTreeSet<ContentHash> {
    values.iter().map(|value| hash(value)).collect()
}

fn mesh(value: &str) -> NodePath {
    path(&format!("/RootNode/meshes/mesh_{value}"))
}

fn material(value: &str) -> NodePath {
    path(&format!("/RootNode/Looks/mat_{value}"))
}

fn light(value: &str) -> NodePath {
    path(&format!("/RootNode/lights/light_{value}"))
}

/// M0 is bound to A0; M1 and M2 share A1; A2 is unused.
fn capture_layer() -> Layer {
    let mut capture = Layer::new("capture");
    RoleRegistry::tag(&mut capture, LayerRole::Capture);
    for value in [A0, A1, A2] {
        capture.define_node(material(value), NodeSpec::typed("Material"));
    }
    for (mesh_hash, material_hash) in [(M0, A0), (M1, A1), (M2, A1)] {
        capture.define_node(mesh(mesh_hash), NodeSpec::typed("Mesh"));
        capture.add_relationship_target(&mesh(mesh_hash), "material:binding", material(material_hash));
    }
    for value in [L0, L1, L2] {
        capture.define_node(light(value), NodeSpec::typed("SphereLight"));
    }
    capture
}

fn index() -> HashIndex {
    HashIndexer::new(Conventions::default())
        .unwrap()
        .index(&capture_layer())
}

fn grouper() -> ReplacementGrouper {
    ReplacementGrouper::new(&Conventions::default()).unwrap()
}

fn overrides(paths: &[NodePath]) -> OverrideSet {
    paths.iter().cloned().collect()
}

// === Indexing ===

#[test]
fn test_index_groups_shared_material() {
    let index = index();
    assert_eq!(index.hash_to_path.len(), 9);
    assert_eq!(index.meshes_for(&hash(A1)), Some(&hashes(&[M1, M2])));
    assert_eq!(index.meshes_for(&hash(A0)), Some(&hashes(&[M0])));
    assert_eq!(index.meshes_for(&hash(A2)), None);
}

#[test]
fn test_index_missing_roots_is_not_an_error() {
    let mut capture = Layer::new("capture");
    capture.define_node(light(L0), NodeSpec::typed("SphereLight"));
    let index = HashIndexer::new(Conventions::default()).unwrap().index(&capture);
    assert_eq!(index.all_known(), hashes(&[L0]));
    assert!(index.material_to_meshes.is_empty());
}

// === Grouping ===

#[test]
fn test_shared_material_replaces_its_meshes() {
    let result = grouper().replaced_and_known(&index(), &overrides(&[material(A1)]));
    assert_eq!(result.replaced, hashes(&[M1, M2]));
    assert_eq!(result.all_known, hashes(&[M0, M1, M2, L0, L1, L2]));
}

#[test]
fn test_direct_mesh_override() {
    let result = grouper().replaced_and_known(&index(), &overrides(&[mesh(M0)]));
    assert_eq!(result.replaced, hashes(&[M0]));
}

#[test]
fn test_material_and_mesh_count_once() {
    let grouper = grouper();
    let index = index();
    let both = grouper.replaced_and_known(&index, &overrides(&[material(A1), mesh(M1)]));
    let alone = grouper.replaced_and_known(&index, &overrides(&[material(A1)]));
    assert_eq!(both.replaced, alone.replaced);
}

#[test_case(&[material(A0), material(A1), material(A2)] ; "every material")]
#[test_case(&[material(A2)] ; "unbound material")]
#[test_case(&[mesh(M2), light(L1), material(A0)] ; "mixed")]
#[test_case(&[path("/RootNode/Looks/mat_2000000000000001/Shader")] ; "shader under material")]
fn test_materials_never_replaced(paths: &[NodePath]) {
    let index = index();
    let result = grouper().replaced_and_known(&index, &overrides(paths));
    for material_hash in index.material_to_meshes.keys() {
        assert!(!result.replaced.contains(material_hash));
    }
    assert!(result.replaced.is_subset(&result.all_known));
}

#[test]
fn test_unknown_hash_is_ignored() {
    let result = grouper().replaced_and_known(&index(), &overrides(&[mesh("9999999999999999")]));
    assert!(result.replaced.is_empty());
}

#[test]
fn test_unprefixed_capture_light_can_be_replaced() {
    let mut capture = capture_layer();
    let sphere = path(&format!("/RootNode/lights/SphereLight_{}", "3000000000000009"));
    capture.define_node(sphere.clone(), NodeSpec::typed("SphereLight"));
    let index = HashIndexer::new(Conventions::default()).unwrap().index(&capture);

    let result = grouper().replaced_and_known(&index, &overrides(&[sphere]));
    assert!(result.all_known.contains(&hash("3000000000000009")));
    assert_eq!(result.replaced, hashes(&["3000000000000009"]));
}

// === Through a layer stack ===

#[test]
fn test_progress_from_mod_layer_edits() {
    let mut stack = LayerStack::new({
        let mut root = Layer::new("project");
        RoleRegistry::tag(&mut root, LayerRole::Workfile);
        root
    });

    let mut mod_layer = Layer::new("mod");
    RoleRegistry::tag(&mut mod_layer, LayerRole::Replacement);
    mod_layer.set_attribute(
        &path(&format!("/RootNode/Looks/mat_{A1}/Shader")),
        "diffuse_texture",
        json!("textures/brick.dds"),
    );
    mod_layer.set_attribute(&light(L0), "intensity", json!(250.0));
    assert!(stack.insert(mod_layer, 0).is_applied());
    assert!(stack.insert(capture_layer(), 1).is_applied());

    let overrides = merged_overrides(&stack);
    let progress = grouper().progress(&index(), &overrides);
    assert_eq!((progress.replaced, progress.total), (3, 6));
    assert!((progress.ratio() - 0.5).abs() < f64::EPSILON);
}
