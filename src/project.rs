//! Project files
//!
//! A project is a workfile layer plus every layer reachable through its
//! sublayer references. Opening resolves references with a worklist so a
//! deep or cyclic reference graph never grows the call stack.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{ModStackError, Result};
use crate::layers::{LayerId, LayerRole, LayerStack, RoleRegistry, ANONYMOUS_PREFIX};
use crate::storage::{resolve_asset_path, LayerStorage};

/// Create a new project file tagged as the workfile and return its stack.
///
/// # Errors
/// `LayerAlreadyExists` when a file is already present at `path`.
pub fn create_project<S>(storage: &S, path: &Path) -> Result<LayerStack>
where
    S: LayerStorage + ?Sized,
{
    let mut root = storage.create(path)?;
    RoleRegistry::tag(&mut root, LayerRole::Workfile);
    storage.save(&root)?;
    info!(path = %path.display(), "project created");
    Ok(LayerStack::new(root))
}

/// Open a project and resolve its sublayer references.
///
/// A layer referenced several times is loaded once and shared. References
/// that cannot be found stay in the stack as broken references.
///
/// # Errors
/// Any storage failure other than a missing sublayer.
pub fn open_project<S>(storage: &S, identifier: &str) -> Result<LayerStack>
where
    S: LayerStorage + ?Sized,
{
    let root = storage.open(identifier)?;
    let mut stack = LayerStack::new(root);
    let mut worklist: Vec<LayerId> = vec![stack.root()];
    let mut broken = 0usize;

    while let Some(parent) = worklist.pop() {
        let Some(parent_layer) = stack.layer(parent) else {
            continue;
        };
        let anchor = parent_layer.anchor_dir().map(Path::to_path_buf);
        let asset_paths: Vec<String> = parent_layer.sublayer_paths().map(str::to_string).collect();

        for (index, asset_path) in asset_paths.iter().enumerate() {
            let child_identifier = if asset_path.starts_with(ANONYMOUS_PREFIX) {
                asset_path.clone()
            } else {
                resolve_asset_path(anchor.as_deref(), asset_path)
                    .display()
                    .to_string()
            };

            if let Some(existing) = stack.id_of(&child_identifier) {
                if let Some(diagnostic) = stack.resolve_shared(parent, index, existing).diagnostic() {
                    warn!(reference = %asset_path, %diagnostic, "sublayer reference left unresolved");
                    broken += 1;
                }
                continue;
            }

            match storage.open(&child_identifier) {
                Ok(layer) => {
                    if let Some(id) = stack.resolve_new(parent, index, layer) {
                        worklist.push(id);
                    }
                }
                Err(ModStackError::LayerNotFound { .. }) => {
                    warn!(reference = %asset_path, "sublayer not found, keeping broken reference");
                    broken += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    info!(
        identifier,
        layers = stack.len(),
        broken,
        "project opened"
    );
    Ok(stack)
}

/// Save every reachable named layer. Anonymous layers have nowhere to go
/// and locked layers are read-only, so both are left alone.
///
/// Returns the number of layers written.
pub fn save_project<S>(storage: &S, stack: &LayerStack) -> Result<usize>
where
    S: LayerStorage + ?Sized,
{
    let mut saved = 0;
    for id in stack.walk() {
        let Some(layer) = stack.layer(id) else {
            continue;
        };
        if layer.is_anonymous() || layer.is_locked() {
            debug!(identifier = layer.identifier(), "layer not saved");
            continue;
        }
        storage.save(layer)?;
        saved += 1;
    }
    info!(saved, "project saved");
    Ok(saved)
}
