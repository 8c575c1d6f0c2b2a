//! Schema migration for layer documents.
//!
//! Layer files are read as raw JSON, upgraded one registered step at a time
//! and only then deserialized. Files without a `schema_version` predate
//! versioning and are treated as the 0.9 encoding.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{ModStackError, Result};

/// Current schema version for layer documents.
pub const CURRENT_SCHEMA_VERSION: &str = "1.0.0";

/// Version assumed for documents without a `schema_version` field.
pub const LEGACY_SCHEMA_VERSION: &str = "0.9.0";

/// Takes a JSON document and returns the migrated document or an error.
type MigrationFn = fn(Value) -> Result<Value>;

/// Maps (from_version, to_version) tuples to migration functions.
fn migration_registry() -> HashMap<(&'static str, &'static str), MigrationFn> {
    let mut registry: HashMap<(&'static str, &'static str), MigrationFn> = HashMap::new();
    registry.insert(("0.9.0", "1.0.0"), migrate_0_9_0_to_1_0_0);
    registry
}

/// All known schema versions in order.
fn version_order() -> &'static [&'static str] {
    &["0.9.0", "1.0.0"]
}

/// Migrate a layer document to [`CURRENT_SCHEMA_VERSION`].
///
/// # Errors
/// Returns `ModStackError::InvalidSchemaVersion` for versions this build does
/// not know (including newer ones) and `ModStackError::Migration` when a step
/// fails.
pub fn migrate_document(mut data: Value) -> Result<Value> {
    let current_version = data
        .get("schema_version")
        .and_then(Value::as_str)
        .unwrap_or(LEGACY_SCHEMA_VERSION)
        .to_string();

    if current_version == CURRENT_SCHEMA_VERSION {
        return Ok(data);
    }

    if !version_order().contains(&current_version.as_str()) {
        return Err(ModStackError::InvalidSchemaVersion {
            version: current_version,
        });
    }

    let path = find_migration_path(&current_version, CURRENT_SCHEMA_VERSION);
    if path.is_empty() {
        return Err(ModStackError::Migration {
            from: current_version,
            to: CURRENT_SCHEMA_VERSION.to_string(),
            reason: "No migration path found".to_string(),
        });
    }

    let registry = migration_registry();
    for (from, to) in path {
        let migration_fn =
            registry
                .get(&(from, to))
                .ok_or_else(|| ModStackError::Migration {
                    from: from.to_string(),
                    to: to.to_string(),
                    reason: "Migration function not found in registry".to_string(),
                })?;

        data = migration_fn(data).map_err(|e| ModStackError::Migration {
            from: from.to_string(),
            to: to.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(obj) = data.as_object_mut() {
            obj.insert("schema_version".to_string(), Value::String(to.to_string()));
        }
    }

    Ok(data)
}

/// The sequence of registered steps leading from `from` to `to`. Empty when
/// the versions are equal, unknown, or `to` is older than `from`.
pub fn find_migration_path(from: &str, to: &str) -> Vec<(&'static str, &'static str)> {
    let versions = version_order();
    let registry = migration_registry();

    let (Some(from_idx), Some(to_idx)) = (
        versions.iter().position(|&v| v == from),
        versions.iter().position(|&v| v == to),
    ) else {
        return Vec::new();
    };
    if from_idx >= to_idx {
        return Vec::new();
    }

    let mut path = Vec::new();
    let mut current_idx = from_idx;
    while current_idx < to_idx {
        let current = versions[current_idx];
        let next = ((current_idx + 1)..=to_idx)
            .find(|&next_idx| registry.contains_key(&(current, versions[next_idx])));
        match next {
            Some(next_idx) => {
                path.push((current, versions[next_idx]));
                current_idx = next_idx;
            }
            None => return Vec::new(),
        }
    }
    path
}

/// Metadata keys renamed by the 1.0 encoding.
const LEGACY_METADATA_KEYS: [(&str, &str); 4] = [
    ("lightspeed_layer_type", "layer_type"),
    ("lightspeed_game_name", "game_name"),
    ("lightspeed_exe_name", "exe_name"),
    ("lightspeed_game_icon", "game_icon"),
];

/// 0.9 stored metadata under `lightspeed_`-prefixed keys and sublayer paths
/// under `subLayers`.
fn migrate_0_9_0_to_1_0_0(mut data: Value) -> Result<Value> {
    let Some(obj) = data.as_object_mut() else {
        return Err(ModStackError::invalid_input("layer document is not an object"));
    };

    if let Some(sublayers) = obj.remove("subLayers") {
        obj.entry("sublayers".to_string()).or_insert(sublayers);
    }

    if let Some(Value::Object(metadata)) = obj.get_mut("metadata") {
        rename_keys(metadata, &LEGACY_METADATA_KEYS);
    }

    Ok(data)
}

/// Rename keys in place, keeping their position. A legacy key is dropped
/// when its replacement is already present.
fn rename_keys(map: &mut Map<String, Value>, renames: &[(&str, &str)]) {
    let entries = std::mem::take(map);
    let present: Vec<String> = entries.keys().cloned().collect();
    for (key, value) in entries {
        match renames.iter().find(|(old, _)| *old == key) {
            Some((_, new)) if present.iter().any(|k| k == new) => {}
            Some((_, new)) => {
                map.insert((*new).to_string(), value);
            }
            None => {
                map.insert(key, value);
            }
        }
    }
}
