//! Layer stack
//!
//! Layers live in an arena and are addressed by [`LayerId`]. The root layer
//! (the workfile) owns an ordered list of sublayer references, strongest
//! first, and every sublayer can nest further references. A layer may be
//! referenced from several parents; it stays in the arena as long as one
//! parent still references it.
//!
//! Editing operations never fail hard. A request that cannot be honored
//! returns [`StackEdit::Skipped`] with a [`Diagnostic`] and leaves the stack
//! untouched.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Component;

use tracing::debug;

use super::layer::{Layer, SublayerRef};
use super::role::{LayerRole, RoleRegistry};
use crate::events::LayerEvent;

/// Handle of a layer inside one [`LayerStack`]. The slot of a released
/// layer is handed to the next inserted one, so a handle is only meaningful
/// while its layer stays in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(usize);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a stack edit was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub operation: &'static str,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)
    }
}

/// Outcome of a stack edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum StackEdit {
    /// The stack changed.
    Applied,
    /// The request matched the current state; nothing changed.
    Unchanged,
    /// The request could not be honored; nothing changed.
    Skipped(Diagnostic),
}

impl StackEdit {
    pub fn is_applied(&self) -> bool {
        matches!(self, StackEdit::Applied)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StackEdit::Skipped(_))
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            StackEdit::Skipped(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }
}

/// An ordered stack of override layers composing one document.
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: Vec<Option<Layer>>,
    /// Released slots, reused before the arena grows.
    free: Vec<LayerId>,
    by_identifier: HashMap<String, LayerId>,
    root: LayerId,
    edit_target: LayerId,
    pending: Vec<LayerEvent>,
}

impl LayerStack {
    /// Create a stack rooted at `root`. Sublayer paths already on the root
    /// are kept as unresolved references.
    pub fn new(mut root: Layer) -> Self {
        clear_resolved(&mut root);
        let root_id = LayerId(0);
        let mut by_identifier = HashMap::new();
        by_identifier.insert(root.identifier().to_string(), root_id);
        Self {
            layers: vec![Some(root)],
            free: Vec::new(),
            by_identifier,
            root: root_id,
            edit_target: root_id,
            pending: Vec::new(),
        }
    }

    // === Lookup ===

    pub fn root(&self) -> LayerId {
        self.root
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0).and_then(Option::as_ref)
    }

    /// Mutable access to a layer's content. Flag changes should go through
    /// [`set_locked`](Self::set_locked) and [`set_muted`](Self::set_muted) so
    /// that listeners are notified.
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn id_of(&self, identifier: &str) -> Option<LayerId> {
        self.by_identifier.get(identifier).copied()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.by_identifier.contains_key(identifier)
    }

    /// Number of layers in the arena, root included.
    pub fn len(&self) -> usize {
        self.by_identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identifier.is_empty()
    }

    /// Live layers in allocation order.
    pub fn layers(&self) -> impl Iterator<Item = (LayerId, &Layer)> {
        self.layers
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|layer| (LayerId(idx), layer)))
    }

    /// Sublayer references of `parent`, strongest first.
    pub fn sublayer_refs(&self, parent: LayerId) -> &[SublayerRef] {
        self.layer(parent).map(Layer::sublayers).unwrap_or(&[])
    }

    /// Resolved sublayers of `parent`, strongest first.
    pub fn sublayer_ids(&self, parent: LayerId) -> Vec<LayerId> {
        self.sublayer_refs(parent)
            .iter()
            .filter_map(SublayerRef::layer)
            .collect()
    }

    /// Position of `child` among the references of `parent`.
    pub fn position_in(&self, parent: LayerId, child: LayerId) -> Option<usize> {
        self.sublayer_refs(parent)
            .iter()
            .position(|r| r.layer() == Some(child))
    }

    /// Position of a layer among its parent's references. For a shared
    /// layer the first parent in walk order is used.
    pub fn position_of(&self, identifier: &str) -> Option<usize> {
        let id = self.id_of(identifier)?;
        self.locate(id).map(|(_, position)| position)
    }

    /// First parent (in walk order) referencing `id`, with the position.
    pub fn locate(&self, id: LayerId) -> Option<(LayerId, usize)> {
        self.walk()
            .into_iter()
            .find_map(|parent| self.position_in(parent, id).map(|pos| (parent, pos)))
    }

    /// The first immediate sublayer of the root tagged with `role`.
    pub fn find_role(&self, role: LayerRole) -> Option<LayerId> {
        self.find_role_in(self.root, role)
    }

    /// The first immediate sublayer of `parent` tagged with `role`.
    pub fn find_role_in(&self, parent: LayerId, role: LayerRole) -> Option<LayerId> {
        self.sublayer_ids(parent).into_iter().find(|id| {
            self.layer(*id)
                .map(|layer| RoleRegistry::has_role(layer, role))
                .unwrap_or(false)
        })
    }

    /// Every layer tagged with `role`, strongest first, root included.
    pub fn find_all(&self, role: LayerRole) -> Vec<LayerId> {
        self.walk()
            .into_iter()
            .filter(|id| {
                self.layer(*id)
                    .map(|layer| RoleRegistry::has_role(layer, role))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// The strongest layer anywhere in the stack tagged with `role`.
    pub fn find_role_deep(&self, role: LayerRole) -> Option<LayerId> {
        self.find_all(role).into_iter().next()
    }

    /// All reachable layers, strongest first (pre-order). Each layer appears
    /// once even when shared or caught in a reference cycle.
    pub fn walk(&self) -> Vec<LayerId> {
        self.walk_from(self.root)
    }

    pub fn walk_from(&self, start: LayerId) -> Vec<LayerId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut worklist = vec![start];
        while let Some(id) = worklist.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(layer) = self.layer(id) else {
                continue;
            };
            order.push(id);
            for reference in layer.sublayers().iter().rev() {
                if let Some(child) = reference.layer() {
                    worklist.push(child);
                }
            }
        }
        order
    }

    /// References whose target could not be opened, as `(parent, asset_path)`.
    pub fn broken_references(&self) -> Vec<(LayerId, String)> {
        self.walk()
            .into_iter()
            .flat_map(|parent| {
                self.sublayer_refs(parent)
                    .iter()
                    .filter(|r| r.layer().is_none())
                    .map(move |r| (parent, r.asset_path.clone()))
            })
            .collect()
    }

    pub fn edit_target(&self) -> LayerId {
        self.edit_target
    }

    // === Editing ===

    /// Insert a new layer as a sublayer of the root.
    pub fn insert(&mut self, layer: Layer, position: usize) -> StackEdit {
        self.insert_into(self.root, layer, position)
    }

    /// Insert a new layer under `parent`. The reference path is made relative
    /// to the parent's file when both are file backed.
    pub fn insert_into(&mut self, parent: LayerId, layer: Layer, position: usize) -> StackEdit {
        let asset_path = match self.layer(parent) {
            Some(parent_layer) => reference_path(parent_layer, &layer),
            None => return self.skip("insert", format!("parent {parent} is not in the stack")),
        };
        self.insert_with_path(parent, asset_path, layer, position)
    }

    /// Insert a new layer under `parent` with an explicit reference path.
    /// Positions past the end append.
    pub fn insert_with_path(
        &mut self,
        parent: LayerId,
        asset_path: impl Into<String>,
        mut layer: Layer,
        position: usize,
    ) -> StackEdit {
        if self.layer(parent).is_none() {
            return self.skip("insert", format!("parent {parent} is not in the stack"));
        }
        if self.contains(layer.identifier()) {
            return self.skip(
                "insert",
                format!("layer {} is already in the stack", layer.identifier()),
            );
        }
        clear_resolved(&mut layer);
        let id = self.alloc(layer);
        self.link(parent, SublayerRef::resolved(asset_path, id), position);
        StackEdit::Applied
    }

    /// Remove the reference at `position` of the root.
    pub fn remove(&mut self, position: usize) -> StackEdit {
        self.remove_from(self.root, position)
    }

    /// Remove the reference at `position` of `parent`. The referenced layer
    /// is freed once nothing references it any more.
    pub fn remove_from(&mut self, parent: LayerId, position: usize) -> StackEdit {
        let removed = match self.layer_mut(parent) {
            Some(layer) if position < layer.sublayers().len() => {
                let removed = layer.sublayers_mut().remove(position);
                let identifier = layer.identifier().to_string();
                self.pending.push(LayerEvent::SublayersChanged(identifier));
                removed
            }
            Some(_) => {
                return self.skip(
                    "remove",
                    format!("no sublayer at position {position} of {parent}"),
                )
            }
            None => return self.skip("remove", format!("parent {parent} is not in the stack")),
        };
        if let Some(child) = removed.layer() {
            self.collect_garbage(child);
        }
        StackEdit::Applied
    }

    /// Remove a layer from its parent.
    pub fn remove_layer(&mut self, identifier: &str) -> StackEdit {
        match self.id_of(identifier).and_then(|id| self.locate(id)) {
            Some((parent, position)) => self.remove_from(parent, position),
            None => self.skip("remove", format!("layer {identifier} is not a sublayer")),
        }
    }

    /// Drop an unresolved reference of `parent`.
    pub fn remove_broken_reference(&mut self, parent: LayerId, asset_path: &str) -> StackEdit {
        let position = self
            .sublayer_refs(parent)
            .iter()
            .position(|r| r.layer().is_none() && r.asset_path == asset_path);
        match position {
            Some(position) => self.remove_from(parent, position),
            None => self.skip(
                "remove",
                format!("no broken reference {asset_path} under {parent}"),
            ),
        }
    }

    /// Move a layer to `new_position` among its parent's references.
    /// Positions past the end move it to the weakest slot.
    pub fn reorder(&mut self, identifier: &str, new_position: usize) -> StackEdit {
        let Some(id) = self.id_of(identifier) else {
            return self.skip("reorder", format!("layer {identifier} is not in the stack"));
        };
        let Some((parent, current)) = self.locate(id) else {
            return self.skip("reorder", format!("layer {identifier} is not a sublayer"));
        };
        let Some(parent_layer) = self.layer_mut(parent) else {
            return StackEdit::Unchanged;
        };
        let last = parent_layer.sublayers().len().saturating_sub(1);
        let target = new_position.min(last);
        if target == current {
            return StackEdit::Unchanged;
        }
        let entry = parent_layer.sublayers_mut().remove(current);
        parent_layer.sublayers_mut().insert(target, entry);
        let parent_identifier = parent_layer.identifier().to_string();
        self.pending
            .push(LayerEvent::SublayersChanged(parent_identifier));
        StackEdit::Applied
    }

    /// Rewrite the reference path at `position` of `parent`.
    pub fn set_reference_path(
        &mut self,
        parent: LayerId,
        position: usize,
        asset_path: impl Into<String>,
    ) -> StackEdit {
        let asset_path = asset_path.into();
        let Some(layer) = self.layer_mut(parent) else {
            return self.skip(
                "set_reference_path",
                format!("parent {parent} is not in the stack"),
            );
        };
        let Some(reference) = layer.sublayers_mut().get_mut(position) else {
            return self.skip(
                "set_reference_path",
                format!("no sublayer at position {position} of {parent}"),
            );
        };
        if reference.asset_path == asset_path {
            return StackEdit::Unchanged;
        }
        reference.asset_path = asset_path;
        let identifier = layer.identifier().to_string();
        self.pending.push(LayerEvent::SublayersChanged(identifier));
        StackEdit::Applied
    }

    pub fn set_locked(&mut self, id: LayerId, locked: bool) -> StackEdit {
        let Some(layer) = self.layer_mut(id) else {
            return self.skip("set_locked", format!("layer {id} is not in the stack"));
        };
        if layer.is_locked() == locked {
            return StackEdit::Unchanged;
        }
        layer.set_locked(locked);
        let identifier = layer.identifier().to_string();
        self.pending.push(LayerEvent::LockChanged(identifier));
        StackEdit::Applied
    }

    pub fn set_muted(&mut self, id: LayerId, muted: bool) -> StackEdit {
        let Some(layer) = self.layer_mut(id) else {
            return self.skip("set_muted", format!("layer {id} is not in the stack"));
        };
        if layer.is_muted() == muted {
            return StackEdit::Unchanged;
        }
        layer.set_muted(muted);
        let identifier = layer.identifier().to_string();
        self.pending.push(LayerEvent::MutenessChanged(identifier));
        StackEdit::Applied
    }

    /// Choose the layer new edits are authored into.
    pub fn set_edit_target(&mut self, id: LayerId) -> StackEdit {
        if self.layer(id).is_none() {
            return self.skip("set_edit_target", format!("layer {id} is not in the stack"));
        }
        if self.edit_target == id {
            return StackEdit::Unchanged;
        }
        self.edit_target = id;
        StackEdit::Applied
    }

    /// Take the composition events produced by edits since the last drain.
    pub fn drain_events(&mut self) -> Vec<LayerEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending.is_empty()
    }

    // === Loading ===

    /// Resolve the reference at `index` of `parent` to a freshly opened
    /// layer. Sublayer paths of the new layer stay unresolved.
    pub(crate) fn resolve_new(&mut self, parent: LayerId, index: usize, mut layer: Layer) -> Option<LayerId> {
        if self.contains(layer.identifier()) {
            return None;
        }
        let slot_exists = self
            .layer(parent)
            .map(|p| index < p.sublayers().len())
            .unwrap_or(false);
        if !slot_exists {
            return None;
        }
        clear_resolved(&mut layer);
        let id = self.alloc(layer);
        if let Some(reference) = self
            .layer_mut(parent)
            .and_then(|p| p.sublayers_mut().get_mut(index))
        {
            reference.set_layer(Some(id));
        }
        Some(id)
    }

    /// Resolve the reference at `index` of `parent` to a layer already in the
    /// arena. Refused when it would close a reference cycle.
    pub(crate) fn resolve_shared(&mut self, parent: LayerId, index: usize, existing: LayerId) -> StackEdit {
        if existing == parent || self.walk_from(existing).contains(&parent) {
            return self.skip(
                "resolve",
                format!("reference from {parent} to {existing} would form a cycle"),
            );
        }
        match self
            .layer_mut(parent)
            .and_then(|p| p.sublayers_mut().get_mut(index))
        {
            Some(reference) => {
                reference.set_layer(Some(existing));
                StackEdit::Applied
            }
            None => self.skip("resolve", format!("no sublayer at position {index} of {parent}")),
        }
    }

    // === Internals ===

    fn alloc(&mut self, layer: Layer) -> LayerId {
        let identifier = layer.identifier().to_string();
        let id = match self.free.pop() {
            Some(id) if self.layers.get(id.0).is_some_and(Option::is_none) => {
                self.layers[id.0] = Some(layer);
                id
            }
            _ => {
                self.layers.push(Some(layer));
                LayerId(self.layers.len() - 1)
            }
        };
        self.by_identifier.insert(identifier, id);
        id
    }

    fn link(&mut self, parent: LayerId, reference: SublayerRef, position: usize) {
        if let Some(layer) = self.layer_mut(parent) {
            let position = position.min(layer.sublayers().len());
            layer.sublayers_mut().insert(position, reference);
            let identifier = layer.identifier().to_string();
            self.pending.push(LayerEvent::SublayersChanged(identifier));
        }
    }

    fn is_referenced(&self, id: LayerId) -> bool {
        self.layers
            .iter()
            .flatten()
            .any(|layer| layer.sublayers().iter().any(|r| r.layer() == Some(id)))
    }

    fn collect_garbage(&mut self, start: LayerId) {
        let mut worklist = vec![start];
        while let Some(id) = worklist.pop() {
            if id == self.root || self.is_referenced(id) {
                continue;
            }
            let Some(layer) = self.layers.get_mut(id.0).and_then(Option::take) else {
                continue;
            };
            debug!(identifier = layer.identifier(), "layer released from stack");
            self.by_identifier.remove(layer.identifier());
            self.free.push(id);
            if self.edit_target == id {
                self.edit_target = self.root;
            }
            worklist.extend(layer.sublayers().iter().filter_map(SublayerRef::layer));
        }
    }

    fn skip(&self, operation: &'static str, message: String) -> StackEdit {
        debug!(operation, %message, "stack edit skipped");
        StackEdit::Skipped(Diagnostic { operation, message })
    }
}

fn clear_resolved(layer: &mut Layer) {
    for reference in layer.sublayers_mut() {
        reference.set_layer(None);
    }
}

/// The path a parent should use to reference `child`.
pub(crate) fn reference_path(parent: &Layer, child: &Layer) -> String {
    let (Some(anchor), Some(path)) = (parent.anchor_dir(), child.real_path()) else {
        return child.identifier().to_string();
    };
    match path.strip_prefix(anchor) {
        Ok(relative) => {
            let segments: Vec<String> = relative
                .components()
                .filter_map(|component| match component {
                    Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect();
            format!("./{}", segments.join("/"))
        }
        Err(_) => path.display().to_string(),
    }
}
