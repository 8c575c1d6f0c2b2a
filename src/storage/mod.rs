//! Layer storage
//!
//! The engine reads and writes layers only through [`LayerStorage`]. Two
//! implementations ship with the crate: [`FsLayerStorage`] for JSON layer
//! files on disk and [`MemoryLayerStorage`] for in-memory layers.

mod document;
mod fs;
mod memory;
pub mod migration;

#[cfg(feature = "async-io")]
mod async_io;

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

pub use document::LayerDocument;
pub use fs::FsLayerStorage;
pub use memory::MemoryLayerStorage;
pub use migration::CURRENT_SCHEMA_VERSION;

#[cfg(feature = "async-io")]
pub use async_io::AsyncLayerStorage;

use crate::error::Result;
use crate::layers::Layer;

/// Whether a layer exists at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Exists,
    NotFound,
}

impl Stat {
    pub fn exists(self) -> bool {
        self == Stat::Exists
    }
}

/// Storage collaborator for reading and writing layers.
///
/// Every failure is reported as an `Err`; implementations never panic on
/// missing or malformed data.
pub trait LayerStorage {
    /// Open an existing layer.
    fn open(&self, identifier: &str) -> Result<Layer>;

    /// Create and persist a new empty layer. Fails when one already exists.
    fn create(&self, path: &Path) -> Result<Layer>;

    fn stat(&self, path: &Path) -> Result<Stat>;

    /// Persist a layer under its identifier.
    fn save(&self, layer: &Layer) -> Result<()>;

    /// SHA-256 of the stored bytes, hex encoded.
    fn fingerprint(&self, identifier: &str) -> Result<String>;
}

impl<S: LayerStorage + ?Sized> LayerStorage for &S {
    fn open(&self, identifier: &str) -> Result<Layer> {
        (**self).open(identifier)
    }

    fn create(&self, path: &Path) -> Result<Layer> {
        (**self).create(path)
    }

    fn stat(&self, path: &Path) -> Result<Stat> {
        (**self).stat(path)
    }

    fn save(&self, layer: &Layer) -> Result<()> {
        (**self).save(layer)
    }

    fn fingerprint(&self, identifier: &str) -> Result<String> {
        (**self).fingerprint(identifier)
    }
}

/// Resolve a sublayer asset path against the directory of its parent.
/// Absolute paths are returned as is; `.` and `..` are folded lexically.
pub fn resolve_asset_path(anchor: Option<&Path>, asset_path: &str) -> PathBuf {
    let asset = Path::new(asset_path);
    let joined = match anchor {
        Some(anchor) if asset.is_relative() => anchor.join(asset),
        _ => asset.to_path_buf(),
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
