//! TTL-cached camera directory.

use super::source::{CameraSource, StaticCameraSource};
use super::types::{Camera, CameraMap};
use crate::constants::DEFAULT_CAMERA_CACHE_TTL;
use crate::error::{Error, Result};
use moka::sync::Cache as MokaCache;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide camera lookup.
///
/// The full camera map is cached for a fixed time-to-live with no active
/// invalidation; an expired entry is reloaded on the next lookup. Concurrent
/// reloads may race, and the last one to finish wins.
#[derive(Clone)]
pub struct CameraDirectory {
    source: Arc<dyn CameraSource>,
    cache: MokaCache<(), Arc<CameraMap>>,
}

impl CameraDirectory {
    pub fn new<S: CameraSource>(source: S, ttl: Duration) -> Self {
        Self {
            source: Arc::new(source),
            cache: MokaCache::builder()
                .max_capacity(1)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Directory over a fixed list of cameras.
    pub fn fixed(cameras: impl IntoIterator<Item = Camera>) -> Self {
        Self::new(StaticCameraSource::new(cameras), DEFAULT_CAMERA_CACHE_TTL)
    }

    /// All cameras, served from cache while fresh.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CameraDirectory`] if the cache is cold and the source
    /// fails.
    pub async fn cameras(&self) -> Result<Arc<CameraMap>> {
        if let Some(map) = self.cache.get(&()) {
            return Ok(map);
        }
        self.refresh_all().await
    }

    /// Looks up one camera. `Ok(None)` is a miss.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CameraDirectory`] if a reload fails.
    pub async fn get(&self, id: &str) -> Result<Option<Camera>> {
        Ok(self.cameras().await?.get(id).cloned())
    }

    /// Reloads from the source and replaces the cached map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CameraDirectory`] if the source fails.
    pub async fn refresh_all(&self) -> Result<Arc<CameraMap>> {
        let cameras = self
            .source
            .load_all()
            .await
            .map_err(Error::CameraDirectory)?;

        let map: CameraMap = cameras
            .into_iter()
            .map(|c| (c.id().to_string(), c))
            .collect();
        let map = Arc::new(map);
        tracing::debug!(count = map.len(), "Camera directory refreshed");

        self.cache.insert((), Arc::clone(&map));
        Ok(map)
    }
}
