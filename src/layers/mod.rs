//! Layer Model Module
//!
//! Layers, their roles and the stack composing them into one document:
//! - `node`: scene-graph addressing inside a layer
//! - `layer`: one unit of override data
//! - `role`: the closed set of layer roles and their metadata encoding
//! - `stack`: the ordered, arena-backed layer stack

mod layer;
mod node;
mod role;
mod stack;

pub use layer::{Layer, SublayerRef, ANONYMOUS_PREFIX};
pub use node::{NodePath, NodeSpec};
pub use role::{
    CaptureInfo, Exclusion, LayerRole, ReplacementInfo, RoleRegistry, EXE_NAME_KEY,
    GAME_ICON_KEY, GAME_NAME_KEY, NOTES_KEY, ROLE_KEY, UNKNOWN_GAME,
};
pub use stack::{Diagnostic, LayerId, LayerStack, StackEdit};
