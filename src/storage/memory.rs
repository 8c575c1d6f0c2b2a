//! In-memory layer storage.
//!
//! Layers are kept as serialized JSON so that saving and reopening goes
//! through the same document format (and migrations) as files on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{sha256_hex, LayerDocument, LayerStorage, Stat};
use crate::error::{ModStackError, Result};
use crate::layers::Layer;

#[derive(Debug, Default)]
pub struct MemoryLayerStorage {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryLayerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw document text under an identifier, replacing any previous
    /// content.
    pub fn insert_raw(&self, identifier: impl Into<String>, content: impl Into<String>) {
        self.documents.lock().insert(identifier.into(), content.into());
    }

    pub fn raw(&self, identifier: &str) -> Option<String> {
        self.documents.lock().get(identifier).cloned()
    }

    pub fn remove(&self, identifier: &str) -> bool {
        self.documents.lock().remove(identifier).is_some()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }

    fn key(path: &Path) -> String {
        path.display().to_string()
    }
}

impl LayerStorage for MemoryLayerStorage {
    fn open(&self, identifier: &str) -> Result<Layer> {
        let content = self
            .raw(identifier)
            .ok_or_else(|| ModStackError::LayerNotFound {
                identifier: identifier.to_string(),
            })?;
        let document = LayerDocument::from_json(&content)?;
        let real_path = (!identifier.starts_with(crate::layers::ANONYMOUS_PREFIX))
            .then(|| PathBuf::from(identifier));
        Ok(document.into_layer(identifier, real_path))
    }

    fn create(&self, path: &Path) -> Result<Layer> {
        let key = Self::key(path);
        let layer = Layer::with_path(path);
        let content = LayerDocument::from_layer(&layer).stamped().to_json()?;

        let mut documents = self.documents.lock();
        if documents.contains_key(&key) {
            return Err(ModStackError::LayerAlreadyExists {
                path: path.to_path_buf(),
            });
        }
        documents.insert(key, content);
        Ok(layer)
    }

    fn stat(&self, path: &Path) -> Result<Stat> {
        if self.documents.lock().contains_key(&Self::key(path)) {
            Ok(Stat::Exists)
        } else {
            Ok(Stat::NotFound)
        }
    }

    fn save(&self, layer: &Layer) -> Result<()> {
        let content = LayerDocument::from_layer(layer).stamped().to_json()?;
        self.insert_raw(layer.identifier(), content);
        Ok(())
    }

    fn fingerprint(&self, identifier: &str) -> Result<String> {
        self.raw(identifier)
            .map(|content| sha256_hex(content.as_bytes()))
            .ok_or_else(|| ModStackError::LayerNotFound {
                identifier: identifier.to_string(),
            })
    }
}
