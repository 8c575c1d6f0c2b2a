//! On-disk layer document
//!
//! ```json
//! {
//!   "schema_version": "1.0.0",
//!   "saved_at": "2026-01-01T00:00:00Z",
//!   "metadata": { "layer_type": "capture", "game_name": "Portal" },
//!   "sublayers": ["./deps/captures/capture.json"],
//!   "locked": true,
//!   "muted": false,
//!   "nodes": { "/RootNode/meshes/mesh_0123456789ABCDEF": { "type_name": "Mesh" } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::migration::{migrate_document, CURRENT_SCHEMA_VERSION};
use crate::error::Result;
use crate::layers::{Layer, NodePath, NodeSpec};

/// Serialized form of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDocument {
    pub schema_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,

    /// Flat string map, written back in the order it was read.
    #[serde(default)]
    pub metadata: IndexMap<String, String>,

    /// Sublayer asset paths, strongest first.
    #[serde(default)]
    pub sublayers: Vec<String>,

    #[serde(default)]
    pub locked: bool,

    #[serde(default)]
    pub muted: bool,

    #[serde(default)]
    pub nodes: BTreeMap<NodePath, NodeSpec>,
}

impl LayerDocument {
    /// Snapshot a layer. Sublayers are recorded by their authored paths.
    pub fn from_layer(layer: &Layer) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            saved_at: None,
            metadata: layer.metadata().clone(),
            sublayers: layer.sublayer_paths().map(str::to_string).collect(),
            locked: layer.is_locked(),
            muted: layer.is_muted(),
            nodes: layer
                .nodes()
                .map(|(path, spec)| (path.clone(), spec.clone()))
                .collect(),
        }
    }

    /// Rebuild a layer. Sublayer paths come back unresolved.
    pub fn into_layer(self, identifier: &str, real_path: Option<PathBuf>) -> Layer {
        let mut layer = Layer::new(identifier);
        layer.set_real_path(real_path);
        *layer.metadata_mut() = self.metadata;
        for asset_path in self.sublayers {
            layer.push_sublayer_path(asset_path);
        }
        layer.set_locked(self.locked);
        layer.set_muted(self.muted);
        for (path, spec) in self.nodes {
            layer.define_node(path, spec);
        }
        layer
    }

    /// Parse a document, migrating older schema versions first.
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(content)?;
        let migrated = migrate_document(raw)?;
        Ok(serde_json::from_value(migrated)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn stamped(mut self) -> Self {
        self.saved_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LayerRole, RoleRegistry};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_layer_round_trip() {
        let mut layer = Layer::new("capture");
        layer.set_metadata("zeta", "1");
        RoleRegistry::tag(&mut layer, LayerRole::Capture);
        layer.set_metadata("alpha", "2");
        layer.push_sublayer_path("./baker.json");
        layer.set_locked(true);
        let mesh = NodePath::new("/RootNode/meshes/mesh_0123456789ABCDEF").unwrap();
        layer.define_node(mesh.clone(), NodeSpec::typed("Mesh"));

        let json = LayerDocument::from_layer(&layer).stamped().to_json().unwrap();
        let restored = LayerDocument::from_json(&json)
            .unwrap()
            .into_layer("capture", None);

        assert_eq!(restored.metadata(), layer.metadata());
        assert_eq!(
            restored.sublayer_paths().collect::<Vec<_>>(),
            vec!["./baker.json"]
        );
        assert!(restored.is_locked());
        assert_eq!(restored.node(&mesh), Some(&NodeSpec::typed("Mesh")));
    }

    #[test]
    fn test_metadata_bytes_survive() {
        let content = r#"{
  "schema_version": "1.0.0",
  "metadata": {
    "notes": "line\nbreak \"quoted\" ünïcode",
    "layer_type": "replacement",
    "a": ""
  }
}"#;
        let document = LayerDocument::from_json(content).unwrap();
        let written = document.to_json().unwrap();
        let reread = LayerDocument::from_json(&written).unwrap();
        assert_eq!(
            serde_json::to_string(&reread.metadata).unwrap(),
            serde_json::to_string(&document.metadata).unwrap()
        );
        let keys: Vec<&str> = reread.metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["notes", "layer_type", "a"]);
    }
}
