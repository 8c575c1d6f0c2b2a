//! Document context
//!
//! Owns everything attached to one open project: the layer stack, its
//! storage, the validator, the advisory sink and the event bus. The host
//! calls [`DocumentContext::pump`] from its loop; notifications queued since
//! the last call are coalesced into at most one correction pass.

use std::path::Path;

use crossbeam_channel::Receiver;
use tracing::{debug, info};

use crate::capture::HashIndexer;
use crate::config::Conventions;
use crate::error::{ModStackError, Result};
use crate::events::{DocumentEvent, EventBus, EventSender, Notification};
use crate::layers::{Layer, LayerId, LayerRole, LayerStack, RoleRegistry, StackEdit};
use crate::project::{open_project, save_project};
use crate::replacement::{merged_overrides, CaptureProgress, Replacement, ReplacementGrouper};
use crate::storage::LayerStorage;
use crate::validation::{self, AdvisorySink, DiscardSink, LayerAction, PassReport, ProjectValidator};

pub struct DocumentContext<S: LayerStorage> {
    storage: S,
    stack: LayerStack,
    validator: ProjectValidator,
    indexer: HashIndexer,
    grouper: ReplacementGrouper,
    sink: Box<dyn AdvisorySink>,
    bus: EventBus,
}

impl<S: LayerStorage> DocumentContext<S> {
    /// Attach a context to an already loaded stack. An `Opened` notification
    /// is queued so the first pump validates the project.
    pub fn new(storage: S, stack: LayerStack, conventions: Conventions) -> Result<Self> {
        let indexer = HashIndexer::new(conventions.clone())?;
        let grouper = ReplacementGrouper::for_indexer(&indexer);
        let bus = EventBus::new();
        bus.publish(DocumentEvent::Opened);
        Ok(Self {
            storage,
            stack,
            validator: ProjectValidator::new(conventions),
            indexer,
            grouper,
            sink: Box::new(DiscardSink),
            bus,
        })
    }

    /// Open a project through `storage`.
    pub fn open(storage: S, identifier: &str, conventions: Conventions) -> Result<Self> {
        let stack = open_project(&storage, identifier)?;
        Self::new(storage, stack, conventions)
    }

    /// Route advisories to `sink` instead of dropping them.
    pub fn with_sink(mut self, sink: impl AdvisorySink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    /// Direct stack access. Edits made here are picked up by the next pump.
    pub fn stack_mut(&mut self) -> &mut LayerStack {
        &mut self.stack
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn conventions(&self) -> &Conventions {
        self.validator.conventions()
    }

    // === Events ===

    /// Handle for external event sources.
    pub fn sender(&self) -> EventSender {
        self.bus.sender()
    }

    /// Register an observer of every notification the context handles.
    pub fn subscribe(&self) -> Receiver<Notification> {
        self.bus.subscribe()
    }

    pub fn notify(&self, notification: impl Into<Notification>) {
        self.bus.publish(notification);
    }

    /// Handle queued notifications and pending stack edits.
    ///
    /// Returns `None` when nothing asked for validation. Changes made by the
    /// pass are forwarded to observers but do not trigger another pass.
    ///
    /// # Errors
    /// Storage failures raised by the correction pass.
    pub fn pump(&mut self) -> Result<Option<PassReport>> {
        let mut notifications = self.bus.drain();
        let local: Vec<Notification> = self
            .stack
            .drain_events()
            .into_iter()
            .map(Notification::from)
            .collect();
        self.bus.broadcast(&local);
        notifications.extend(local);

        let triggers = notifications
            .iter()
            .filter(|notification| notification.triggers_validation())
            .count();
        if triggers == 0 {
            return Ok(None);
        }
        debug!(triggers, "running one correction pass");

        let result = self
            .validator
            .run(&mut self.stack, &self.storage, self.sink.as_mut());
        let own: Vec<Notification> = self
            .stack
            .drain_events()
            .into_iter()
            .map(Notification::from)
            .collect();
        self.bus.broadcast(&own);
        result.map(Some)
    }

    // === Lifecycle ===

    /// Save the project and queue a `Saved` notification.
    pub fn save(&mut self) -> Result<usize> {
        let saved = save_project(&self.storage, &self.stack)?;
        self.bus.publish(DocumentEvent::Saved);
        Ok(saved)
    }

    /// Tell observers the document closed, then disconnect them.
    pub fn close(self) {
        self.bus.publish(DocumentEvent::Closed);
        self.bus.drain();
        self.bus.shutdown();
        info!(identifier = self.root_identifier(), "document closed");
    }

    // === Imports ===

    /// Make the capture layer at `path` the project's capture, replacing the
    /// current one. The capture is appended as the weakest sublayer and
    /// locked.
    pub fn import_capture(&mut self, path: &Path) -> Result<LayerId> {
        let identifier = path.display().to_string();
        let layer = self.storage.open(&identifier)?;
        if !RoleRegistry::has_role(&layer, LayerRole::Capture) {
            return Err(ModStackError::invalid_input(format!(
                "{identifier} is not a capture layer"
            )));
        }

        self.remove_role(LayerRole::Capture);
        let id = self.insert_root(layer, usize::MAX)?;
        applied(self.stack.set_locked(id, true))?;
        info!(identifier = %identifier, "capture imported");
        Ok(id)
    }

    /// Make the layer at `path` the project's mod layer, creating it when no
    /// file exists yet. The mod layer becomes the strongest sublayer and the
    /// edit target.
    pub fn import_replacement(&mut self, path: &Path) -> Result<LayerId> {
        let identifier = path.display().to_string();
        let mut layer = if self.storage.stat(path)?.exists() {
            self.storage.open(&identifier)?
        } else {
            self.storage.create(path)?
        };
        match RoleRegistry::role_of(&layer) {
            None => RoleRegistry::tag(&mut layer, LayerRole::Replacement),
            Some(LayerRole::Replacement) => {}
            Some(role) => {
                return Err(ModStackError::invalid_input(format!(
                    "{identifier} is a {role} layer, not a mod layer"
                )))
            }
        }

        self.remove_role(LayerRole::Replacement);
        let id = self.insert_root(layer, 0)?;
        applied(self.stack.set_edit_target(id))?;
        info!(identifier = %identifier, "mod layer imported");
        Ok(id)
    }

    // === Progress ===

    /// Replaced and known assets of one capture layer in the stack.
    pub fn replacement(&self, capture_identifier: &str) -> Result<Replacement> {
        let capture = self.capture_layer(capture_identifier)?;
        let index = self.indexer.index(capture);
        Ok(self
            .grouper
            .replaced_and_known(&index, &merged_overrides(&self.stack)))
    }

    /// "Replaced N of M" for one capture layer in the stack.
    pub fn capture_progress(&self, capture_identifier: &str) -> Result<CaptureProgress> {
        let capture = self.capture_layer(capture_identifier)?;
        let index = self.indexer.index(capture);
        Ok(self.grouper.progress(&index, &merged_overrides(&self.stack)))
    }

    // === User edits ===

    pub fn insert_layer(&mut self, parent: LayerId, layer: Layer, position: usize) -> Result<StackEdit> {
        validation::check(&self.stack, parent, LayerAction::InsertChild)?;
        Ok(self.stack.insert_into(parent, layer, position))
    }

    pub fn remove_layer(&mut self, identifier: &str) -> Result<StackEdit> {
        let id = self.require(identifier)?;
        validation::check(&self.stack, id, LayerAction::Remove)?;
        Ok(self.stack.remove_layer(identifier))
    }

    pub fn move_layer(&mut self, identifier: &str, position: usize) -> Result<StackEdit> {
        let id = self.require(identifier)?;
        validation::check(&self.stack, id, LayerAction::Move)?;
        Ok(self.stack.reorder(identifier, position))
    }

    pub fn set_layer_locked(&mut self, identifier: &str, locked: bool) -> Result<StackEdit> {
        let id = self.require(identifier)?;
        validation::check(&self.stack, id, LayerAction::Lock)?;
        Ok(self.stack.set_locked(id, locked))
    }

    pub fn set_layer_muted(&mut self, identifier: &str, muted: bool) -> Result<StackEdit> {
        let id = self.require(identifier)?;
        validation::check(&self.stack, id, LayerAction::Mute)?;
        Ok(self.stack.set_muted(id, muted))
    }

    pub fn set_edit_target(&mut self, identifier: &str) -> Result<StackEdit> {
        let id = self.require(identifier)?;
        validation::check(&self.stack, id, LayerAction::SetEditTarget)?;
        Ok(self.stack.set_edit_target(id))
    }

    // === Internals ===

    fn require(&self, identifier: &str) -> Result<LayerId> {
        self.stack.id_of(identifier).ok_or_else(|| ModStackError::LayerNotFound {
            identifier: identifier.to_string(),
        })
    }

    fn capture_layer(&self, identifier: &str) -> Result<&Layer> {
        let layer = self
            .stack
            .id_of(identifier)
            .and_then(|id| self.stack.layer(id))
            .ok_or_else(|| ModStackError::LayerNotFound {
                identifier: identifier.to_string(),
            })?;
        if !RoleRegistry::has_role(layer, LayerRole::Capture) {
            return Err(ModStackError::invalid_input(format!(
                "{identifier} is not a capture layer"
            )));
        }
        Ok(layer)
    }

    fn remove_role(&mut self, role: LayerRole) {
        while let Some(existing) = self.stack.find_role(role) {
            let Some(identifier) = self.stack.layer(existing).map(|l| l.identifier().to_string()) else {
                break;
            };
            if !self.stack.remove_layer(&identifier).is_applied() {
                break;
            }
            debug!(identifier = %identifier, role = %role, "previous layer removed");
        }
    }

    fn insert_root(&mut self, layer: Layer, position: usize) -> Result<LayerId> {
        let identifier = layer.identifier().to_string();
        applied(self.stack.insert(layer, position))?;
        self.require(&identifier)
    }

    fn root_identifier(&self) -> &str {
        self.stack
            .layer(self.stack.root())
            .map(Layer::identifier)
            .unwrap_or_default()
    }
}

/// A skipped edit of the context's own bookkeeping is a structural error.
fn applied(edit: StackEdit) -> Result<()> {
    match edit {
        StackEdit::Skipped(diagnostic) => Err(ModStackError::structural(diagnostic.to_string())),
        StackEdit::Applied | StackEdit::Unchanged => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LayerEvent;
    use crate::layers::Diagnostic;
    use crate::storage::MemoryLayerStorage;

    fn tagged(identifier: &str, role: LayerRole) -> Layer {
        let mut layer = Layer::with_path(identifier);
        RoleRegistry::tag(&mut layer, role);
        layer
    }

    fn context() -> DocumentContext<MemoryLayerStorage> {
        let stack = LayerStack::new(tagged("/p/project.json", LayerRole::Workfile));
        DocumentContext::new(MemoryLayerStorage::new(), stack, Conventions::default()).unwrap()
    }

    #[test]
    fn test_skipped_bookkeeping_edit_is_an_error() {
        let skipped = StackEdit::Skipped(Diagnostic {
            operation: "set_locked",
            message: "layer #7 is not in the stack".to_string(),
        });
        let err = applied(skipped).unwrap_err();
        assert!(matches!(err, ModStackError::StructuralViolation { .. }));
        assert!(err.to_string().contains("set_locked"));
        assert!(applied(StackEdit::Unchanged).is_ok());
    }

    #[test]
    fn test_opened_triggers_first_pass() {
        let mut ctx = context();
        let report = ctx.pump().unwrap().unwrap();
        assert!(report.is_compliant());
        assert!(ctx.pump().unwrap().is_none());
    }

    #[test]
    fn test_closed_alone_does_not_trigger() {
        let mut ctx = context();
        ctx.pump().unwrap();
        ctx.notify(DocumentEvent::Closed);
        assert!(ctx.pump().unwrap().is_none());
    }

    #[test]
    fn test_pass_changes_reach_observers_without_retrigger() {
        let mut ctx = context();
        ctx.pump().unwrap();
        let observer = ctx.subscribe();

        let root = ctx.stack().root();
        assert!(ctx.stack_mut().set_muted(root, true).is_applied());
        let report = ctx.pump().unwrap().unwrap();
        assert_eq!(report.corrections, 1);

        let seen: Vec<Notification> = observer.try_iter().collect();
        let muteness = Notification::from(LayerEvent::MutenessChanged("/p/project.json".to_string()));
        assert_eq!(seen, vec![muteness.clone(), muteness]);
        assert!(ctx.pump().unwrap().is_none());
    }

    #[test]
    fn test_import_replacement_creates_and_targets() {
        let mut ctx = context();
        let id = ctx.import_replacement(Path::new("/p/mod.json")).unwrap();
        assert_eq!(ctx.stack().edit_target(), id);
        assert_eq!(ctx.stack().position_in(ctx.stack().root(), id), Some(0));
        let layer = ctx.stack().layer(id).unwrap();
        assert_eq!(RoleRegistry::role_of(layer), Some(LayerRole::Replacement));
    }

    #[test]
    fn test_import_capture_replaces_previous() {
        let mut ctx = context();
        for name in ["a", "b"] {
            let path = format!("/p/deps/captures/{name}.json");
            ctx.storage().save(&tagged(&path, LayerRole::Capture)).unwrap();
        }
        ctx.import_capture(Path::new("/p/deps/captures/a.json")).unwrap();
        let id = ctx.import_capture(Path::new("/p/deps/captures/b.json")).unwrap();

        assert!(!ctx.stack().contains("/p/deps/captures/a.json"));
        assert_eq!(ctx.stack().sublayer_ids(ctx.stack().root()), vec![id]);
        assert!(ctx.stack().layer(id).unwrap().is_locked());
        assert_eq!(
            ctx.stack().sublayer_refs(ctx.stack().root())[0].asset_path,
            "./deps/captures/b.json"
        );
    }

    #[test]
    fn test_import_capture_rejects_other_roles() {
        let mut ctx = context();
        ctx.storage().save(&Layer::with_path("/p/plain.json")).unwrap();
        let result = ctx.import_capture(Path::new("/p/plain.json"));
        assert!(matches!(result, Err(ModStackError::ValidationInput { .. })));
    }

    #[test]
    fn test_user_edits_are_permission_checked() {
        let mut ctx = context();
        ctx.import_replacement(Path::new("/p/mod.json")).unwrap();
        assert!(matches!(
            ctx.remove_layer("/p/mod.json"),
            Err(ModStackError::ActionNotAllowed { .. })
        ));
        assert!(ctx.set_layer_muted("/p/mod.json", true).unwrap().is_applied());
        assert!(matches!(
            ctx.move_layer("/p/missing.json", 0),
            Err(ModStackError::LayerNotFound { .. })
        ));
        let root = ctx.stack().root();
        assert!(ctx.insert_layer(root, Layer::anonymous(), 0).is_err());
    }
}
