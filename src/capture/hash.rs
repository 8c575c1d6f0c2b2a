//! Content hashes embedded in capture node names
//!
//! Exported assets are named `<prefix><16 uppercase hex-like chars>`, with an
//! optional `_<n>` instance counter, e.g. `mesh_0123456789ABCDEF` or
//! `inst_0123456789ABCDEF_2`.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Conventions;
use crate::error::{ModStackError, Result};
use crate::layers::NodePath;

/// Length of a content hash.
pub const HASH_LEN: usize = 16;

static DEFAULT_PATTERN: Lazy<Option<HashPattern>> =
    Lazy::new(|| HashPattern::from_conventions(&Conventions::default()).ok());

/// A 16-character uppercase content hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Validate a bare hash.
    pub fn parse(value: &str) -> Result<Self> {
        let valid = value.len() == HASH_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(ModStackError::invalid_input(format!(
                "not a content hash: {value:?}"
            )))
        }
    }

    /// The hash of a node directly under a namespace root: the last sixteen
    /// characters of its name.
    pub fn from_node_name(name: &str) -> Result<Self> {
        let split = name
            .char_indices()
            .rev()
            .nth(HASH_LEN - 1)
            .map(|(idx, _)| idx)
            .ok_or_else(|| {
                ModStackError::invalid_input(format!("node name too short for a hash: {name:?}"))
            })?;
        Self::parse(&name[split..])
    }

    /// Find the innermost prefixed hash anywhere in a node path, using the
    /// default naming prefixes.
    pub fn from_path(path: &NodePath) -> Result<(AssetKind, ContentHash)> {
        DEFAULT_PATTERN
            .as_ref()
            .ok_or_else(|| ModStackError::invalid_input("default hash pattern unavailable"))?
            .find(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = ModStackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ModStackError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

/// Which kind of asset a hashed node name denotes, from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Material,
    Mesh,
    Light,
    Instance,
}

/// Compiled matcher for prefixed hashes in node paths.
#[derive(Debug, Clone)]
pub struct HashPattern {
    regex: Regex,
    prefixes: [(String, AssetKind); 4],
}

impl HashPattern {
    pub fn from_conventions(conventions: &Conventions) -> Result<Self> {
        let prefixes = [
            (conventions.light_prefix.clone(), AssetKind::Light),
            (conventions.instance_prefix.clone(), AssetKind::Instance),
            (conventions.mesh_prefix.clone(), AssetKind::Mesh),
            (conventions.material_prefix.clone(), AssetKind::Material),
        ];
        let alternatives: Vec<String> = prefixes
            .iter()
            .map(|(prefix, _)| regex::escape(prefix))
            .collect();
        let pattern = format!(
            r"^(.*)({})([A-Z0-9]{{{HASH_LEN}}})(_[0-9]+)*(.*)$",
            alternatives.join("|")
        );
        let regex = Regex::new(&pattern)
            .map_err(|e| ModStackError::invalid_input(format!("hash pattern: {e}")))?;
        Ok(Self { regex, prefixes })
    }

    /// Find the innermost prefixed hash in a path.
    pub fn find(&self, path: &NodePath) -> Result<(AssetKind, ContentHash)> {
        let captures = self.regex.captures(path.as_str()).ok_or_else(|| {
            ModStackError::invalid_input(format!("no content hash in node path {path}"))
        })?;
        let prefix = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
        let kind = self
            .prefixes
            .iter()
            .find(|(candidate, _)| candidate == prefix)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| ModStackError::invalid_input(format!("unknown prefix {prefix:?}")))?;
        let hash = captures.get(3).map(|m| m.as_str()).unwrap_or_default();
        Ok((kind, ContentHash::parse(hash)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("mesh_0123456789ABCDEF", "0123456789ABCDEF" ; "mesh")]
    #[test_case("mat_FEDCBA9876543210", "FEDCBA9876543210" ; "material")]
    #[test_case("light_00000000000000AA", "00000000000000AA" ; "light")]
    fn test_from_node_name(name: &str, expected: &str) {
        assert_eq!(ContentHash::from_node_name(name).unwrap().as_str(), expected);
    }

    #[test_case("mesh_0123" ; "too short")]
    #[test_case("mesh_0123456789abcdef" ; "lowercase")]
    #[test_case("Looks" ; "plain name")]
    fn test_from_node_name_rejects(name: &str) {
        assert!(ContentHash::from_node_name(name).is_err());
    }

    #[test_case("/RootNode/meshes/mesh_0123456789ABCDEF", AssetKind::Mesh ; "mesh node")]
    #[test_case("/RootNode/Looks/mat_0123456789ABCDEF/Shader", AssetKind::Material ; "shader child")]
    #[test_case("/RootNode/instances/inst_0123456789ABCDEF_3", AssetKind::Instance ; "instance")]
    #[test_case("/RootNode/lights/light_0123456789ABCDEF", AssetKind::Light ; "light")]
    fn test_from_path(path: &str, kind: AssetKind) {
        let path = NodePath::new(path).unwrap();
        let (found, hash) = ContentHash::from_path(&path).unwrap();
        assert_eq!(found, kind);
        assert_eq!(hash.as_str(), "0123456789ABCDEF");
    }

    #[test]
    fn test_from_path_takes_innermost_hash() {
        let path = NodePath::new(
            "/RootNode/meshes/mesh_0000000000000001/ref_c/mesh_0000000000000002/mesh",
        )
        .unwrap();
        let (_, hash) = ContentHash::from_path(&path).unwrap();
        assert_eq!(hash.as_str(), "0000000000000002");
    }

    #[test]
    fn test_from_path_without_hash() {
        let path = NodePath::new("/RootNode/meshes").unwrap();
        assert!(ContentHash::from_path(&path).is_err());
    }

    #[test]
    fn test_custom_prefixes() {
        let conventions = Conventions {
            mesh_prefix: "geo.".to_string(),
            ..Conventions::default()
        };
        let pattern = HashPattern::from_conventions(&conventions).unwrap();
        let path = NodePath::new("/RootNode/meshes/geo.0123456789ABCDEF").unwrap();
        assert_eq!(pattern.find(&path).unwrap().0, AssetKind::Mesh);
    }
}
