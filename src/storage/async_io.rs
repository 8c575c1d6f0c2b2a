//! Blocking storage calls moved onto the tokio blocking pool, so a host
//! running an async loop can yield while a layer is read.

use std::path::PathBuf;
use std::sync::Arc;

use super::{LayerStorage, Stat};
use crate::error::{ModStackError, Result};
use crate::layers::Layer;

/// Async facade over any [`LayerStorage`].
#[derive(Debug)]
pub struct AsyncLayerStorage<S> {
    inner: Arc<S>,
}

impl<S> Clone for AsyncLayerStorage<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> AsyncLayerStorage<S>
where
    S: LayerStorage + Send + Sync + 'static,
{
    pub fn new(storage: S) -> Self {
        Self {
            inner: Arc::new(storage),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub async fn open(&self, identifier: impl Into<String>) -> Result<Layer> {
        let identifier = identifier.into();
        self.run(move |storage| storage.open(&identifier)).await
    }

    pub async fn stat(&self, path: impl Into<PathBuf>) -> Result<Stat> {
        let path = path.into();
        self.run(move |storage| storage.stat(&path)).await
    }

    pub async fn fingerprint(&self, identifier: impl Into<String>) -> Result<String> {
        let identifier = identifier.into();
        self.run(move |storage| storage.fingerprint(&identifier)).await
    }

    async fn run<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || task(&storage))
            .await
            .map_err(|e| ModStackError::StorageTask {
                reason: e.to_string(),
            })?
    }
}
