//! Collaborators the engine drives: object store, catalog index, camera
//! directory and notification transport.

pub mod cameras;
pub mod catalog;
pub mod keyed;
pub mod notify;
pub mod storage;

pub use keyed::Keyable;
