//! clipkeep - reconciliation and retention engine for camera media.
//!
//! Cameras upload motion clips, thumbnails and periodic snapshots into an
//! object store. clipkeep keeps a catalog of capture events in step with
//! that store and enforces retention over it:
//!
//! - [`engine::Engine::scan`] discovers new recordings and indexes each one exactly once
//! - [`engine::Engine::expunge`] removes events (and their blobs) past the retention horizon
//! - [`engine::Engine::sweep_snapshots`] prunes old snapshots and reports silent cameras
//!
//! The collaborators the engine talks to live under [`services`] and are all
//! pluggable through backend traits.

#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod http;
pub mod paths;
pub mod reliability;
pub mod scheduler;
pub mod services;

pub use config::Config;
pub use engine::Engine;
pub use error::{Error, Result};
