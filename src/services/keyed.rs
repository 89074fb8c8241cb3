//! Attaching storage identities to records read back from a store.

/// A persisted record whose identity lives outside its serialized body.
///
/// Stores hand records back without their key; the reader attaches it once
/// after a successful query. Later calls keep the first key.
pub trait Keyable {
    type Key;

    /// Attach the storage key. No-op if a key is already attached.
    fn set_key(&mut self, key: Self::Key);

    /// The attached key, if any.
    fn key(&self) -> Option<&Self::Key>;
}
