//! Validation Tests
//!
//! Correction passes over project stacks, both in memory and on disk.

use std::path::Path;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use modstack::layers::{Layer, LayerId, LayerRole, LayerStack, RoleRegistry};
use modstack::project::open_project;
use modstack::storage::{FsLayerStorage, LayerStorage, MemoryLayerStorage};
use modstack::validation::{AdvisoryKind, ProjectValidator, RecordingSink};
use modstack::Conventions;

fn tagged(path: impl AsRef<Path>, role: LayerRole) -> Layer {
    let mut layer = Layer::with_path(path.as_ref());
    RoleRegistry::tag(&mut layer, role);
    layer
}

fn validator() -> ProjectValidator {
    ProjectValidator::new(Conventions::default())
}

fn position(stack: &LayerStack, id: LayerId) -> usize {
    stack.position_in(stack.root(), id).unwrap()
}

/// Project at `/p` with the capture stored at its canonical location.
fn memory_project(capture_first: bool) -> (LayerStack, MemoryLayerStorage) {
    let storage = MemoryLayerStorage::new();
    let capture = tagged("/p/deps/captures/capture.json", LayerRole::Capture);
    storage.save(&capture).unwrap();

    let mut stack = LayerStack::new(tagged("/p/project.json", LayerRole::Workfile));
    let mod_layer = tagged("/p/mod.json", LayerRole::Replacement);
    if capture_first {
        assert!(stack.insert(capture, 0).is_applied());
        assert!(stack.insert(mod_layer, 1).is_applied());
    } else {
        assert!(stack.insert(mod_layer, 0).is_applied());
        assert!(stack.insert(capture, 1).is_applied());
    }
    (stack, storage)
}

// === Ordering ===

#[test]
fn test_reversed_roles_are_swapped_with_one_advisory() {
    let (mut stack, storage) = memory_project(true);
    let mut sink = RecordingSink::new();

    validator().run(&mut stack, &storage, &mut sink).unwrap();

    let mod_layer = stack.find_role(LayerRole::Replacement).unwrap();
    let capture = stack.find_role(LayerRole::Capture).unwrap();
    assert_eq!(position(&stack, mod_layer), 0);
    assert_eq!(position(&stack, capture), stack.sublayer_refs(stack.root()).len() - 1);
    assert_eq!(sink.count(AdvisoryKind::Reordered), 1);
}

#[test]
fn test_mod_strongest_and_capture_weakest_among_others() {
    let (mut stack, storage) = memory_project(true);
    assert!(stack.insert(Layer::with_path("/p/extra_a.json"), 1).is_applied());
    assert!(stack.insert(Layer::with_path("/p/extra_b.json"), 99).is_applied());

    validator()
        .run(&mut stack, &storage, &mut RecordingSink::new())
        .unwrap();

    let ids = stack.sublayer_ids(stack.root());
    assert_eq!(ids.first(), stack.find_role(LayerRole::Replacement).as_ref());
    assert_eq!(ids.last(), stack.find_role(LayerRole::Capture).as_ref());
    assert_eq!(ids.len(), 4);
}

// === Flags ===

#[test]
fn test_flags_reconciled() {
    let (mut stack, storage) = memory_project(false);
    let mod_layer = stack.find_role(LayerRole::Replacement).unwrap();
    let capture = stack.find_role(LayerRole::Capture).unwrap();
    assert!(stack.set_locked(mod_layer, true).is_applied());
    assert!(stack.set_muted(capture, true).is_applied());
    stack.drain_events();

    let mut sink = RecordingSink::new();
    let report = validator().run(&mut stack, &storage, &mut sink).unwrap();

    assert_eq!(report.corrections, 3);
    assert_eq!(sink.count(AdvisoryKind::FlagsReconciled), 3);
    assert!(!stack.layer(mod_layer).unwrap().is_locked());
    let capture = stack.layer(capture).unwrap();
    assert!(capture.is_locked());
    assert!(!capture.is_muted());
    assert_eq!(stack.drain_events().len(), 3);
}

#[test]
fn test_advisory_precedes_every_correction() {
    let (mut stack, storage) = memory_project(true);
    let mut sink = RecordingSink::new();
    let report = validator().run(&mut stack, &storage, &mut sink).unwrap();
    assert_eq!(report.advisories, sink.advisories);
    assert!(report.advisories.len() >= report.corrections);
}

// === Idempotence ===

#[test]
fn test_second_pass_changes_nothing() {
    let (mut stack, storage) = memory_project(true);
    assert!(stack.insert(Layer::with_path("/p/extra.json"), 0).is_applied());
    let mut validator = validator();

    let first = validator
        .run(&mut stack, &storage, &mut RecordingSink::new())
        .unwrap();
    assert!(first.corrections > 0);
    stack.drain_events();

    let mut sink = RecordingSink::new();
    let second = validator.run(&mut stack, &storage, &mut sink).unwrap();
    assert!(second.is_compliant());
    assert!(sink.advisories.is_empty());
    assert!(!stack.has_pending_events());
}

// === Capture reference on disk ===

fn save_capture(storage: &FsLayerStorage, path: &Path) {
    storage.save(&tagged(path, LayerRole::Capture)).unwrap();
}

fn save_project_referencing(storage: &FsLayerStorage, project: &Path, reference: &str) {
    let mut root = tagged(project, LayerRole::Workfile);
    root.push_sublayer_path(reference);
    storage.save(&root).unwrap();
}

#[test]
fn test_capture_reference_rewritten_to_canonical() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let storage = FsLayerStorage::new();
    let project = dir.path().join("project.json");
    save_capture(&storage, &dir.path().join("wrong/dir/capture.json"));
    save_capture(&storage, &dir.path().join("deps/captures/capture.json"));
    save_project_referencing(&storage, &project, "./wrong/dir/capture.json");

    let mut stack = open_project(&storage, &project.display().to_string())?;
    let capture = stack.find_role(LayerRole::Capture).expect("capture resolved");
    let mut sink = RecordingSink::new();
    validator().run(&mut stack, &storage, &mut sink)?;

    assert_eq!(sink.count(AdvisoryKind::ReferenceRewritten), 1);
    assert_eq!(sink.count(AdvisoryKind::ReferenceDropped), 0);
    assert_eq!(stack.find_role(LayerRole::Capture), Some(capture));
    assert_eq!(
        stack.sublayer_refs(stack.root())[0].asset_path,
        "./deps/captures/capture.json"
    );
    Ok(())
}

#[test]
fn test_unreachable_capture_is_dropped() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let storage = FsLayerStorage::new();
    let project = dir.path().join("project.json");
    save_capture(&storage, &dir.path().join("wrong/dir/capture.json"));
    save_project_referencing(&storage, &project, "./wrong/dir/capture.json");

    let mut stack = open_project(&storage, &project.display().to_string())?;
    let mut sink = RecordingSink::new();
    validator().run(&mut stack, &storage, &mut sink)?;

    assert_eq!(sink.count(AdvisoryKind::ReferenceDropped), 1);
    assert!(sink.advisories[0].message.contains("rtx-remix"));
    assert!(stack.find_role(LayerRole::Capture).is_none());
    assert!(stack.sublayer_refs(stack.root()).is_empty());
    assert_eq!(stack.len(), 1);
    Ok(())
}

#[test]
fn test_canonical_capture_is_left_alone() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let storage = FsLayerStorage::new();
    let project = dir.path().join("project.json");
    save_capture(&storage, &dir.path().join("deps/captures/capture.json"));
    save_project_referencing(&storage, &project, "./deps/captures/capture.json");

    let mut stack = open_project(&storage, &project.display().to_string())?;
    let mut sink = RecordingSink::new();
    let report = validator().run(&mut stack, &storage, &mut sink)?;

    // Only the lock is corrected.
    assert_eq!(report.corrections, 1);
    assert_eq!(sink.count(AdvisoryKind::FlagsReconciled), 1);
    Ok(())
}
