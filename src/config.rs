//! Engine configuration
//!
//! Naming conventions shared by the indexer, the validator and capture
//! discovery. Everything has a default so an empty JSON object is a valid
//! configuration file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModStackError, Result};

/// Folder and node naming conventions of an exported capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conventions {
    /// Root node every capture hangs its namespaces under.
    pub root_node: String,
    /// Namespace holding materials.
    pub materials_root: String,
    /// Namespace holding meshes.
    pub meshes_root: String,
    /// Namespace holding lights.
    pub lights_root: String,
    /// Relationship binding a mesh to its material.
    pub material_binding: String,
    /// Dependencies folder next to the project file.
    pub deps_folder: String,
    /// Captures folder inside the dependencies folder.
    pub captures_folder: String,
    /// Alternate name accepted for a captures folder.
    pub legacy_capture_folder: String,
    /// Name of the linked mod folder shown in advisories.
    pub mod_folder: String,
    /// Extensions recognized as layer files.
    pub layer_extensions: Vec<String>,
    pub material_prefix: String,
    pub mesh_prefix: String,
    pub light_prefix: String,
    pub instance_prefix: String,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            root_node: "/RootNode".to_string(),
            materials_root: "Looks".to_string(),
            meshes_root: "meshes".to_string(),
            lights_root: "lights".to_string(),
            material_binding: "material:binding".to_string(),
            deps_folder: "deps".to_string(),
            captures_folder: "captures".to_string(),
            legacy_capture_folder: "capture".to_string(),
            mod_folder: "rtx-remix".to_string(),
            layer_extensions: vec!["json".to_string()],
            material_prefix: "mat_".to_string(),
            mesh_prefix: "mesh_".to_string(),
            light_prefix: "light_".to_string(),
            instance_prefix: "inst_".to_string(),
        }
    }
}

impl Conventions {
    /// Path of the materials namespace, e.g. `/RootNode/Looks`.
    pub fn materials_path(&self) -> String {
        format!("{}/{}", self.root_node, self.materials_root)
    }

    /// Path of the meshes namespace.
    pub fn meshes_path(&self) -> String {
        format!("{}/{}", self.root_node, self.meshes_root)
    }

    /// Path of the lights namespace.
    pub fn lights_path(&self) -> String {
        format!("{}/{}", self.root_node, self.lights_root)
    }

    /// The canonical sublayer reference for a capture file name,
    /// `./<deps>/<captures>/<file_name>`.
    pub fn capture_reference(&self, file_name: &str) -> String {
        format!("./{}/{}/{}", self.deps_folder, self.captures_folder, file_name)
    }

    /// Whether the path has one of the layer file extensions.
    pub fn is_layer_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.layer_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub conventions: Conventions,
    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            conventions: Conventions::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ModStackError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_default_paths() {
        let conventions = Conventions::default();
        assert_eq!(conventions.materials_path(), "/RootNode/Looks");
        assert_eq!(conventions.meshes_path(), "/RootNode/meshes");
        assert_eq!(conventions.lights_path(), "/RootNode/lights");
        assert_eq!(
            conventions.capture_reference("capture.json"),
            "./deps/captures/capture.json"
        );
    }

    #[test]
    fn test_is_layer_file() {
        let conventions = Conventions::default();
        assert!(conventions.is_layer_file(&PathBuf::from("a/capture.JSON")));
        assert!(!conventions.is_layer_file(&PathBuf::from("a/capture.dds")));
        assert!(!conventions.is_layer_file(&PathBuf::from("a/capture")));
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modstack.json");
        fs::write(
            &path,
            r#"{"conventions": {"deps_folder": "dependencies"}, "log_filter": "debug"}"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.conventions.deps_folder, "dependencies");
        assert_eq!(config.conventions.captures_folder, "captures");
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load(&PathBuf::from("/nonexistent/modstack.json"));
        assert!(matches!(result, Err(ModStackError::FileRead { .. })));
    }
}
