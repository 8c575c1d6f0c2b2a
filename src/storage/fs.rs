//! JSON layer files on disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{sha256_hex, LayerDocument, LayerStorage, Stat};
use crate::error::{ModStackError, Result};
use crate::layers::Layer;

/// Stores each layer as a pretty-printed JSON document at its real path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLayerStorage;

impl FsLayerStorage {
    pub fn new() -> Self {
        Self
    }

    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ModStackError::LayerNotFound {
                    identifier: path.display().to_string(),
                }
            } else {
                ModStackError::FileRead {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })
    }

    fn write(&self, path: &Path, document: &LayerDocument) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| ModStackError::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let content = document.to_json()?;
        fs::write(path, content).map_err(|e| ModStackError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl LayerStorage for FsLayerStorage {
    fn open(&self, identifier: &str) -> Result<Layer> {
        let path = PathBuf::from(identifier);
        let content = self.read(&path)?;
        let document = LayerDocument::from_json(&content)?;
        debug!(path = %path.display(), sublayers = document.sublayers.len(), "layer opened");
        Ok(document.into_layer(identifier, Some(path)))
    }

    fn create(&self, path: &Path) -> Result<Layer> {
        if path.exists() {
            return Err(ModStackError::LayerAlreadyExists {
                path: path.to_path_buf(),
            });
        }
        let layer = Layer::with_path(path);
        self.write(path, &LayerDocument::from_layer(&layer).stamped())?;
        info!(path = %path.display(), "layer created");
        Ok(layer)
    }

    fn stat(&self, path: &Path) -> Result<Stat> {
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => Ok(Stat::Exists),
            Ok(_) => Ok(Stat::NotFound),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Stat::NotFound),
            Err(e) => Err(ModStackError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn save(&self, layer: &Layer) -> Result<()> {
        let path = layer
            .real_path()
            .ok_or_else(|| ModStackError::LayerNotFound {
                identifier: layer.identifier().to_string(),
            })?;
        self.write(path, &LayerDocument::from_layer(layer).stamped())?;
        debug!(path = %path.display(), "layer saved");
        Ok(())
    }

    fn fingerprint(&self, identifier: &str) -> Result<String> {
        let path = Path::new(identifier);
        let bytes = fs::read(path).map_err(|e| ModStackError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(sha256_hex(&bytes))
    }
}
