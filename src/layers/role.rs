//! Layer roles
//!
//! The role of a layer lives in its metadata map under [`ROLE_KEY`]. The
//! encoding table below is the only place that knows the on-disk strings;
//! everything else in the crate works with [`LayerRole`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::layer::Layer;

/// Metadata key holding the role tag.
pub const ROLE_KEY: &str = "layer_type";

/// Metadata key for free-form notes on replacement layers.
pub const NOTES_KEY: &str = "notes";

pub const GAME_NAME_KEY: &str = "game_name";
pub const EXE_NAME_KEY: &str = "exe_name";
pub const GAME_ICON_KEY: &str = "game_icon";

/// Game name reported for captures that carry none.
pub const UNKNOWN_GAME: &str = "Unknown game";

/// Semantic role of a layer within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerRole {
    /// The project file itself, always the stack root
    Workfile,
    /// Immutable base layer exported from the game
    Capture,
    /// The mod layer holding local overrides
    Replacement,
    /// Generated upscaled textures
    AutoUpscale,
    /// Baked capture data; hidden from editing actions
    CaptureBaker,
}

const ROLE_ENCODING: [(LayerRole, &str); 5] = [
    (LayerRole::Workfile, "workfile"),
    (LayerRole::Capture, "capture"),
    (LayerRole::Replacement, "replacement"),
    (LayerRole::AutoUpscale, "autoupscale"),
    (LayerRole::CaptureBaker, "capture_baker"),
];

impl LayerRole {
    pub const ALL: [LayerRole; 5] = [
        LayerRole::Workfile,
        LayerRole::Capture,
        LayerRole::Replacement,
        LayerRole::AutoUpscale,
        LayerRole::CaptureBaker,
    ];

    /// The string stored in layer metadata.
    pub fn encode(self) -> &'static str {
        ROLE_ENCODING
            .iter()
            .find(|(role, _)| *role == self)
            .map(|(_, encoded)| *encoded)
            .unwrap_or_default()
    }

    /// Decode a metadata string. Unknown strings have no role.
    pub fn decode(encoded: &str) -> Option<LayerRole> {
        ROLE_ENCODING
            .iter()
            .find(|(_, candidate)| *candidate == encoded)
            .map(|(role, _)| *role)
    }

    /// Exclusions written by default when a layer is tagged with this role.
    pub fn default_exclusions(self) -> &'static [Exclusion] {
        match self {
            LayerRole::CaptureBaker => &Exclusion::ALL,
            _ => &[],
        }
    }
}

impl fmt::Display for LayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}

/// A per-layer flag that hides an editing action from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exclusion {
    AddChild,
    EditTarget,
    Lock,
    Move,
    Mute,
    Remove,
}

impl Exclusion {
    pub const ALL: [Exclusion; 6] = [
        Exclusion::AddChild,
        Exclusion::EditTarget,
        Exclusion::Lock,
        Exclusion::Move,
        Exclusion::Mute,
        Exclusion::Remove,
    ];

    /// Metadata key of the flag.
    pub fn key(self) -> &'static str {
        match self {
            Exclusion::AddChild => "exclude_add_child",
            Exclusion::EditTarget => "exclude_edit_target",
            Exclusion::Lock => "exclude_lock",
            Exclusion::Move => "exclude_move",
            Exclusion::Mute => "exclude_mute",
            Exclusion::Remove => "exclude_remove",
        }
    }

    /// Whether the flag is set on the layer.
    pub fn is_set(self, layer: &Layer) -> bool {
        layer
            .metadata_value(self.key())
            .map(|value| value.eq_ignore_ascii_case("true") || value == "1")
            .unwrap_or(false)
    }
}

/// Game information stored on capture layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureInfo {
    pub game_name: String,
    pub exe_name: Option<String>,
    pub game_icon: Option<String>,
}

impl CaptureInfo {
    pub fn read(layer: &Layer) -> Self {
        Self {
            game_name: layer
                .metadata_value(GAME_NAME_KEY)
                .filter(|name| !name.is_empty())
                .unwrap_or(UNKNOWN_GAME)
                .to_string(),
            exe_name: layer.metadata_value(EXE_NAME_KEY).map(str::to_string),
            game_icon: layer.metadata_value(GAME_ICON_KEY).map(str::to_string),
        }
    }

    pub fn write(&self, layer: &mut Layer) {
        layer.set_metadata(GAME_NAME_KEY, self.game_name.as_str());
        if let Some(exe_name) = &self.exe_name {
            layer.set_metadata(EXE_NAME_KEY, exe_name.as_str());
        }
        if let Some(game_icon) = &self.game_icon {
            layer.set_metadata(GAME_ICON_KEY, game_icon.as_str());
        }
    }
}

/// Notes stored on replacement layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementInfo {
    pub notes: Option<String>,
}

impl ReplacementInfo {
    pub fn read(layer: &Layer) -> Self {
        Self {
            notes: layer.metadata_value(NOTES_KEY).map(str::to_string),
        }
    }

    pub fn write(&self, layer: &mut Layer) {
        match &self.notes {
            Some(notes) => layer.set_metadata(NOTES_KEY, notes.as_str()),
            None => {
                layer.metadata_mut().shift_remove(NOTES_KEY);
            }
        }
    }
}

/// Reads and writes role tags.
pub struct RoleRegistry;

impl RoleRegistry {
    /// Write the role tag without disturbing other keys. Role defaults are
    /// added only when the layer does not carry them yet.
    pub fn tag(layer: &mut Layer, role: LayerRole) {
        layer.set_metadata(ROLE_KEY, role.encode());
        for exclusion in role.default_exclusions() {
            if layer.metadata_value(exclusion.key()).is_none() {
                layer.set_metadata(exclusion.key(), "true");
            }
        }
    }

    /// Read the role tag back.
    pub fn role_of(layer: &Layer) -> Option<LayerRole> {
        layer.metadata_value(ROLE_KEY).and_then(LayerRole::decode)
    }

    /// Drop the role tag. Other keys are kept in place.
    pub fn untag(layer: &mut Layer) -> Option<LayerRole> {
        let previous = Self::role_of(layer);
        layer.metadata_mut().shift_remove(ROLE_KEY);
        previous
    }

    pub fn has_role(layer: &Layer, role: LayerRole) -> bool {
        Self::role_of(layer) == Some(role)
    }
}
