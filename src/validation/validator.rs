//! Project invariant validator
//!
//! One correction pass, in this order:
//! 1. the mod (replacement) layer becomes the strongest root sublayer;
//! 2. the capture layer becomes the weakest root sublayer and is referenced
//!    through `./deps/captures/<file>`, or dropped when that file is missing;
//! 3. project and mod layers are unlocked and unmuted, the capture layer is
//!    locked and unmuted.
//!
//! Every change is announced through the advisory sink before it is made. A
//! pass over a compliant stack changes nothing.

use tracing::{debug, info, warn};

use super::advisory::{Advisory, AdvisoryKind, AdvisorySink};
use crate::config::Conventions;
use crate::error::Result;
use crate::layers::{Diagnostic, LayerId, LayerRole, LayerStack, RoleRegistry, StackEdit};
use crate::storage::{resolve_asset_path, LayerStorage};

/// Outcome of one correction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Number of mutations applied to the stack.
    pub corrections: usize,
    pub advisories: Vec<Advisory>,
    /// Edits the stack refused.
    pub skipped: Vec<Diagnostic>,
    /// The pass was refused because another one was in progress.
    pub reentrant: bool,
}

impl PassReport {
    /// True when the pass found nothing to correct.
    pub fn is_compliant(&self) -> bool {
        self.corrections == 0 && !self.reentrant
    }
}

/// Lock and mute state a role must have.
#[derive(Debug, Clone, Copy)]
struct FlagRule {
    locked: bool,
    muted: bool,
}

/// Re-establishes the structural invariants of a project stack.
#[derive(Debug, Clone)]
pub struct ProjectValidator {
    conventions: Conventions,
    running: bool,
}

impl ProjectValidator {
    pub fn new(conventions: Conventions) -> Self {
        Self {
            conventions,
            running: false,
        }
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run one full correction pass.
    ///
    /// # Errors
    /// Storage failures abort the pass; corrections already applied stay.
    pub fn run<S>(
        &mut self,
        stack: &mut LayerStack,
        storage: &S,
        sink: &mut dyn AdvisorySink,
    ) -> Result<PassReport>
    where
        S: LayerStorage + ?Sized,
    {
        if self.running {
            debug!("correction pass already running, trigger ignored");
            return Ok(PassReport {
                reentrant: true,
                ..PassReport::default()
            });
        }

        self.running = true;
        let mut pass = Pass {
            stack,
            sink,
            report: PassReport::default(),
        };
        let result = pass.run(&self.conventions, storage);
        self.running = false;

        let report = pass.report;
        match result {
            Ok(()) => {
                if report.corrections > 0 {
                    info!(corrections = report.corrections, "project corrected");
                } else {
                    debug!("project compliant");
                }
                Ok(report)
            }
            Err(err) => {
                warn!(error = %err, corrections = report.corrections, "correction pass aborted");
                Err(err)
            }
        }
    }
}

struct Pass<'a, 's> {
    stack: &'a mut LayerStack,
    sink: &'s mut dyn AdvisorySink,
    report: PassReport,
}

impl Pass<'_, '_> {
    fn run<S>(&mut self, conventions: &Conventions, storage: &S) -> Result<()>
    where
        S: LayerStorage + ?Sized,
    {
        let replacement = self.single_role(LayerRole::Replacement);
        if let Some(mod_layer) = replacement {
            self.make_strongest(mod_layer);
        }

        if let Some(capture_layer) = self.single_role(LayerRole::Capture) {
            self.make_weakest(capture_layer);
            self.anchor_capture(capture_layer, conventions, storage)?;
        }

        let root = self.stack.root();
        self.reconcile_flags(root, "project", FlagRule { locked: false, muted: false });
        for mod_layer in self.immediate_with_role(LayerRole::Replacement) {
            self.reconcile_flags(mod_layer, "mod", FlagRule { locked: false, muted: false });
        }
        // A dropped capture is no longer a root sublayer.
        for capture_layer in self.immediate_with_role(LayerRole::Capture) {
            self.reconcile_flags(capture_layer, "capture", FlagRule { locked: true, muted: false });
        }
        Ok(())
    }

    /// The only root sublayer with `role`. A duplicate skips the positional
    /// correction for that role.
    fn single_role(&mut self, role: LayerRole) -> Option<LayerId> {
        let candidates = self.immediate_with_role(role);
        match candidates.as_slice() {
            [] => None,
            [single] => Some(*single),
            [first, ..] => {
                let identifier = self.identifier(*first);
                self.advise(
                    AdvisoryKind::CorrectionSkipped,
                    &identifier,
                    format!(
                        "The project references {} {role} layers; only one is expected. Their position is left unchanged.",
                        candidates.len()
                    ),
                );
                None
            }
        }
    }

    fn immediate_with_role(&self, role: LayerRole) -> Vec<LayerId> {
        let root = self.stack.root();
        self.stack
            .sublayer_ids(root)
            .into_iter()
            .filter(|id| {
                self.stack
                    .layer(*id)
                    .map(|layer| RoleRegistry::has_role(layer, role))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn make_strongest(&mut self, mod_layer: LayerId) {
        let root = self.stack.root();
        if self.stack.position_in(root, mod_layer) == Some(0) {
            return;
        }
        let identifier = self.identifier(mod_layer);
        self.advise(
            AdvisoryKind::Reordered,
            &identifier,
            "Re-arranging sublayers so the mod layer is the most powerful sublayer.".to_string(),
        );
        let edit = self.stack.reorder(&identifier, 0);
        self.record(edit);
    }

    fn make_weakest(&mut self, capture: LayerId) {
        let root = self.stack.root();
        let last = self.stack.sublayer_refs(root).len().saturating_sub(1);
        if self.stack.position_in(root, capture) == Some(last) {
            return;
        }
        let identifier = self.identifier(capture);
        self.advise(
            AdvisoryKind::Reordered,
            &identifier,
            "Re-arranging sublayers so the capture layer is the weakest sublayer.".to_string(),
        );
        let edit = self.stack.reorder(&identifier, last);
        self.record(edit);
    }

    /// Point the capture reference at the canonical location, or drop it
    /// when no file exists there.
    fn anchor_capture<S>(&mut self, capture: LayerId, conventions: &Conventions, storage: &S) -> Result<()>
    where
        S: LayerStorage + ?Sized,
    {
        let root = self.stack.root();
        let Some(position) = self.stack.position_in(root, capture) else {
            return Ok(());
        };
        let Some(reference) = self.stack.sublayer_refs(root).get(position) else {
            return Ok(());
        };
        let current = reference.asset_path.clone();
        let expected = conventions.capture_reference(reference.file_name());
        if current == expected {
            return Ok(());
        }

        let anchor = self.stack.layer(root).and_then(|layer| layer.anchor_dir());
        let expected_file = resolve_asset_path(anchor, &expected);
        let reachable = storage.stat(&expected_file)?.exists();
        let identifier = self.identifier(capture);

        if reachable {
            self.advise(
                AdvisoryKind::ReferenceRewritten,
                &identifier,
                format!("Capture layer reference \"{current}\" rewritten to \"{expected}\"."),
            );
            let edit = self.stack.set_reference_path(root, position, expected);
            self.record(edit);
        } else {
            self.advise(
                AdvisoryKind::ReferenceDropped,
                &identifier,
                format!(
                    "The current capture layer does not exist in: \"{expected}\".\n\n\
                     The captures should be located within the linked \"{}\" directory.\n\n\
                     Removing the capture layer from the project.",
                    conventions.mod_folder
                ),
            );
            let edit = self.stack.remove_from(root, position);
            self.record(edit);
        }
        Ok(())
    }

    fn reconcile_flags(&mut self, id: LayerId, label: &str, rule: FlagRule) {
        let Some(layer) = self.stack.layer(id) else {
            return;
        };
        let (locked, muted) = (layer.is_locked(), layer.is_muted());
        let identifier = layer.identifier().to_string();

        if locked != rule.locked {
            let verb = if rule.locked { "Locking" } else { "Unlocking" };
            self.advise(
                AdvisoryKind::FlagsReconciled,
                &identifier,
                format!("{verb} the {label} layer."),
            );
            let edit = self.stack.set_locked(id, rule.locked);
            self.record(edit);
        }
        if muted != rule.muted {
            let verb = if rule.muted { "Muting" } else { "Unmuting" };
            self.advise(
                AdvisoryKind::FlagsReconciled,
                &identifier,
                format!("{verb} the {label} layer."),
            );
            let edit = self.stack.set_muted(id, rule.muted);
            self.record(edit);
        }
    }

    fn identifier(&self, id: LayerId) -> String {
        self.stack
            .layer(id)
            .map(|layer| layer.identifier().to_string())
            .unwrap_or_default()
    }

    fn advise(&mut self, kind: AdvisoryKind, layer: &str, message: String) {
        warn!(kind = ?kind, layer, "{}", message);
        let advisory = Advisory {
            kind,
            layer: layer.to_string(),
            message,
        };
        self.sink.advise(&advisory);
        self.report.advisories.push(advisory);
    }

    fn record(&mut self, edit: StackEdit) {
        match edit {
            StackEdit::Applied => self.report.corrections += 1,
            StackEdit::Unchanged => {}
            StackEdit::Skipped(diagnostic) => self.report.skipped.push(diagnostic),
        }
    }
}
