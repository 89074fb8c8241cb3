//! Camera records.

use crate::services::keyed::Keyable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A provisioned camera.
///
/// The id is the record's storage key and is attached after loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Camera {
    /// Display name (may be empty).
    #[serde(default)]
    pub name: String,
    /// Opaque upload token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip)]
    pub(crate) id: Option<String>,
}

impl Camera {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: None,
            id: Some(id.into()),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The camera id, empty if no key has been attached.
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Name for humans: the display name, or the id when unnamed.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.id()
        } else {
            &self.name
        }
    }
}

impl Keyable for Camera {
    type Key = String;

    fn set_key(&mut self, key: String) {
        self.id.get_or_insert(key);
    }

    fn key(&self) -> Option<&String> {
        self.id.as_ref()
    }
}

/// Cameras by id.
pub type CameraMap = HashMap<String, Camera>;
