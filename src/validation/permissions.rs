//! Which editing actions a layer allows.
//!
//! Project, capture and mod layers are managed by the project itself, so
//! the user may not move, remove or lock them. Any layer can opt out of an
//! action through an exclusion flag in its metadata.

use crate::error::{ModStackError, Result};
use crate::layers::{Exclusion, Layer, LayerId, LayerRole, LayerStack, RoleRegistry};

/// User-initiated editing actions on a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerAction {
    InsertChild,
    Move,
    Remove,
    Mute,
    Lock,
    SetEditTarget,
}

impl LayerAction {
    fn exclusion(self) -> Exclusion {
        match self {
            LayerAction::InsertChild => Exclusion::AddChild,
            LayerAction::Move => Exclusion::Move,
            LayerAction::Remove => Exclusion::Remove,
            LayerAction::Mute => Exclusion::Mute,
            LayerAction::Lock => Exclusion::Lock,
            LayerAction::SetEditTarget => Exclusion::EditTarget,
        }
    }

    fn denied_roles(self) -> &'static [LayerRole] {
        match self {
            LayerAction::InsertChild | LayerAction::Mute | LayerAction::SetEditTarget => {
                &[LayerRole::Workfile, LayerRole::Capture]
            }
            LayerAction::Move | LayerAction::Remove | LayerAction::Lock => {
                &[LayerRole::Workfile, LayerRole::Capture, LayerRole::Replacement]
            }
        }
    }

    fn denied_when_locked(self) -> bool {
        matches!(self, LayerAction::InsertChild | LayerAction::Move)
    }
}

/// Check an action against a layer in a stack.
pub fn check(stack: &LayerStack, layer: LayerId, action: LayerAction) -> Result<()> {
    let layer = stack
        .layer(layer)
        .ok_or_else(|| ModStackError::invalid_input(format!("layer {layer} is not in the stack")))?;
    check_layer(layer, action)
}

/// Check an action against a single layer.
pub fn check_layer(layer: &Layer, action: LayerAction) -> Result<()> {
    let deny = |reason: String| {
        Err(ModStackError::ActionNotAllowed {
            identifier: layer.identifier().to_string(),
            reason,
        })
    };

    if let Some(role) = RoleRegistry::role_of(layer) {
        if action.denied_roles().contains(&role) {
            return deny(format!("{action:?} is not allowed on the {role} layer"));
        }
    }
    if action.exclusion().is_set(layer) {
        return deny(format!("{action:?} is excluded by {}", action.exclusion().key()));
    }
    if action.denied_when_locked() && layer.is_locked() {
        return deny(format!("{action:?} is not allowed on a locked layer"));
    }
    Ok(())
}

pub fn is_allowed(layer: &Layer, action: LayerAction) -> bool {
    check_layer(layer, action).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn tagged(role: LayerRole) -> Layer {
        let mut layer = Layer::new(role.encode());
        RoleRegistry::tag(&mut layer, role);
        layer
    }

    #[test_case(LayerRole::Workfile, LayerAction::InsertChild, false)]
    #[test_case(LayerRole::Capture, LayerAction::Mute, false)]
    #[test_case(LayerRole::Replacement, LayerAction::InsertChild, true)]
    #[test_case(LayerRole::Replacement, LayerAction::Mute, true)]
    #[test_case(LayerRole::Replacement, LayerAction::SetEditTarget, true)]
    #[test_case(LayerRole::Replacement, LayerAction::Move, false)]
    #[test_case(LayerRole::Replacement, LayerAction::Remove, false)]
    #[test_case(LayerRole::Replacement, LayerAction::Lock, false)]
    #[test_case(LayerRole::AutoUpscale, LayerAction::Remove, true)]
    #[test_case(LayerRole::CaptureBaker, LayerAction::Remove, false ; "baker excluded by default")]
    fn test_role_permissions(role: LayerRole, action: LayerAction, allowed: bool) {
        assert_eq!(is_allowed(&tagged(role), action), allowed);
    }

    #[test]
    fn test_locked_layer_denies_insert_and_move() {
        let mut layer = Layer::new("sublayer");
        layer.set_locked(true);
        assert!(!is_allowed(&layer, LayerAction::InsertChild));
        assert!(!is_allowed(&layer, LayerAction::Move));
        assert!(is_allowed(&layer, LayerAction::Remove));
        assert!(is_allowed(&layer, LayerAction::Lock));
    }

    #[test]
    fn test_exclusion_flag() {
        let mut layer = Layer::new("sublayer");
        layer.set_metadata(Exclusion::Mute.key(), "true");
        match check_layer(&layer, LayerAction::Mute) {
            Err(ModStackError::ActionNotAllowed { identifier, .. }) => {
                assert_eq!(identifier, "sublayer")
            }
            other => panic!("expected ActionNotAllowed, got {other:?}"),
        }
    }

    #[test]
    fn test_check_in_stack() {
        let stack = LayerStack::new(tagged(LayerRole::Workfile));
        assert!(check(&stack, stack.root(), LayerAction::Remove).is_err());
    }
}
