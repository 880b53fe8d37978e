//! Lazily loaded, change-aware view of the artifact directory

use crate::artifacts::{self, ArtifactPaths};
use crate::error::{Result, VinoError};
use crate::training::{ModelPipeline, RegressionMetrics};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Modification time, length and file identity; `None` when the file does
/// not exist. Artifacts are replaced by rename, so every write gets a new
/// identity even when time and size match.
type Stamp = Option<(SystemTime, u64, u64)>;

#[cfg(unix)]
fn file_id(meta: &std::fs::Metadata) -> u64 {
    std::os::unix::fs::MetadataExt::ino(meta)
}

#[cfg(not(unix))]
fn file_id(_meta: &std::fs::Metadata) -> u64 {
    0
}

async fn stamp(path: &Path) -> Stamp {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some((meta.modified().ok()?, meta.len(), file_id(&meta)))
}

/// One cached artifact and the file stamp it was loaded from
struct Slot<T> {
    stamp: Stamp,
    value: Option<T>,
    loaded: bool,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            stamp: None,
            value: None,
            loaded: false,
        }
    }
}

impl<T: Clone> Slot<T> {
    fn fresh(&self, current: &Stamp) -> Option<Option<T>> {
        (self.loaded && self.stamp == *current).then(|| self.value.clone())
    }
}

/// Shared cache over the three artifacts.
///
/// Each accessor stats its file and reloads when the modification time or
/// size differs from what was loaded. A missing file yields `None`.
pub struct ArtifactCache {
    paths: ArtifactPaths,
    model: RwLock<Slot<Arc<ModelPipeline>>>,
    features: RwLock<Slot<Arc<Vec<String>>>>,
    metrics: RwLock<Slot<RegressionMetrics>>,
}

impl ArtifactCache {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            model: RwLock::new(Slot::default()),
            features: RwLock::new(Slot::default()),
            metrics: RwLock::new(Slot::default()),
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub async fn model(&self) -> Result<Option<Arc<ModelPipeline>>> {
        let paths = self.paths.clone();
        Self::get(&self.model, &self.paths.model(), move || {
            artifacts::read_model(&paths).map(Arc::new)
        })
        .await
    }

    pub async fn feature_names(&self) -> Result<Option<Arc<Vec<String>>>> {
        let paths = self.paths.clone();
        Self::get(&self.features, &self.paths.features(), move || {
            artifacts::read_feature_names(&paths).map(Arc::new)
        })
        .await
    }

    pub async fn metrics(&self) -> Result<Option<RegressionMetrics>> {
        let paths = self.paths.clone();
        Self::get(&self.metrics, &self.paths.metrics(), move || artifacts::read_metrics(&paths)).await
    }

    /// Drop everything; the next access reloads from disk
    pub async fn invalidate(&self) {
        *self.model.write().await = Slot::default();
        *self.features.write().await = Slot::default();
        *self.metrics.write().await = Slot::default();
        debug!("Artifact cache invalidated");
    }

    /// `load` runs on the blocking pool
    async fn get<T: Clone + Send + 'static>(
        slot: &RwLock<Slot<T>>,
        path: &Path,
        load: impl FnOnce() -> Result<T> + Send + 'static,
    ) -> Result<Option<T>> {
        let current = stamp(path).await;
        if let Some(hit) = slot.read().await.fresh(&current) {
            return Ok(hit);
        }

        let mut guard = slot.write().await;
        if let Some(hit) = guard.fresh(&current) {
            return Ok(hit);
        }
        let value = match current {
            Some(_) => Some(
                tokio::task::spawn_blocking(load)
                    .await
                    .map_err(|e| VinoError::IoError(std::io::Error::other(e.to_string())))??,
            ),
            None => None,
        };
        info!(path = %path.display(), present = value.is_some(), "Artifact (re)loaded");
        *guard = Slot {
            stamp: current,
            value: value.clone(),
            loaded: true,
        };
        Ok(value)
    }
}
