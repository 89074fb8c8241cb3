//! Catalog index of capture events.
//!
//! Events are keyed by their composite identity (`camera/filename`) and can
//! be paged by identity or by capture time. Backends:
//!
//! - [`RedbCatalogBackend`] - persistent, with a capture-time index
//! - [`MemoryCatalogBackend`] - ordered in-memory map for tests
//!
//! # Example
//!
//! ```ignore
//! use clipkeep::services::catalog::{CatalogIndex, EventOrder, EventQuery};
//!
//! let catalog = CatalogIndex::memory();
//! let page = catalog
//!     .query(&EventQuery::new(20).camera("garage").order(EventOrder::Newest))
//!     .await?;
//! let next = catalog
//!     .query(&EventQuery::new(20).camera("garage").order(EventOrder::Newest).after(page.cursor))
//!     .await?;
//! ```

mod backend;
mod index;
mod memory;
mod redb;
mod types;


pub use backend::CatalogBackend;
pub use index::CatalogIndex;
pub use memory::MemoryCatalogBackend;
pub use redb::RedbCatalogBackend;
pub use types::{
    Cursor, Event, EventFilter, EventKey, EventOrder, EventPage, EventQuery, Position,
};
