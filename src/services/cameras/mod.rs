//! Camera directory.
//!
//! Cameras are provisioned out-of-band; the engine only looks them up.
//! [`CameraDirectory`] caches the whole map from a [`CameraSource`] with a
//! time-to-live (24 hours by default).

mod directory;
mod source;
mod types;

pub use directory::CameraDirectory;
pub use source::{CameraSource, StaticCameraSource};
pub use types::{Camera, CameraMap};
