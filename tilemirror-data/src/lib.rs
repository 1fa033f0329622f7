//! Network, storage and synchronisation for tilemirror.
//!
//! Responsibilities:
//! - Fetch tile manifests and payloads from the remote service.
//! - Persist tiles in a deduplicated MBTiles store.
//! - Drive incremental synchronisation runs.
//!
//! Boundaries:
//! - Tile grammar, projection maths and the tileset registry live in
//!   `tilemirror-core`.
//! - Blocking work (manifest decoding, transforms) runs on the blocking pool.
//!
//! Invariants:
//! - A payload is stored before any reference points to it.
//! - The store's tileset identity never changes once claimed.
//! - No global mutable state.

pub mod catalog;
pub mod source;
pub mod store;
pub mod sync;

pub use catalog::{Catalog, CatalogRequest, CatalogVerdict, ManifestError, fetch_catalog};
pub use source::{HttpTileSource, TileSource, TransportError};
pub use store::{StoreError, TileStore};
pub use sync::{SyncError, SyncOptions, SyncOutcome, SyncReport, synchronise};
