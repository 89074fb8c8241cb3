//! Authoritative camera sources.

use super::types::Camera;
use crate::config::CameraEntry;
use crate::services::keyed::Keyable;
use anyhow::Result;
use async_trait::async_trait;

/// Where the directory loads cameras from.
///
/// Implementations return every provisioned camera with its key attached.
#[async_trait]
pub trait CameraSource: Send + Sync + 'static {
    async fn load_all(&self) -> Result<Vec<Camera>>;
}

/// Cameras provisioned in the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticCameraSource {
    records: Vec<(String, Camera)>,
}

impl StaticCameraSource {
    pub fn new(cameras: impl IntoIterator<Item = Camera>) -> Self {
        Self {
            records: cameras
                .into_iter()
                .map(|c| (c.id().to_string(), c))
                .collect(),
        }
    }

    pub fn from_entries(entries: &[CameraEntry]) -> Self {
        let records = entries
            .iter()
            .map(|entry| {
                let camera = Camera {
                    name: entry.name.clone().unwrap_or_default(),
                    token: entry.token.clone(),
                    ..Camera::default()
                };
                (entry.id.clone(), camera)
            })
            .collect();
        Self { records }
    }
}

#[async_trait]
impl CameraSource for StaticCameraSource {
    async fn load_all(&self) -> Result<Vec<Camera>> {
        Ok(self
            .records
            .iter()
            .map(|(id, record)| {
                let mut camera = record.clone();
                camera.set_key(id.clone());
                camera
            })
            .collect())
    }
}
