//! Shared server state

use crate::artifacts::ArtifactPaths;
use crate::inference::ArtifactCache;

use super::ServerConfig;

/// State shared across handlers; artifacts load lazily on first request
pub struct AppState {
    pub config: ServerConfig,
    pub cache: ArtifactCache,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let cache = ArtifactCache::new(ArtifactPaths::new(&config.artifact_dir));
        Self { config, cache }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        self.cache.paths()
    }
}
