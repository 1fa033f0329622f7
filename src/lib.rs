//! Facade crate for tilemirror.
//!
//! Re-exports the tile model from `tilemirror-core` and the synchronisation
//! engine from `tilemirror-data` so embedders depend on a single crate.

#![forbid(unsafe_code)]

pub use tilemirror_core::{
    ContentDigest, ContentKind, TileCoord, TileDescriptor, TilePath, TilePathError, Tileset,
    TmsCoord, ZoomRange, known_tilesets, lookup_tileset,
};

pub use tilemirror_data::{
    HttpTileSource, SyncError, SyncOptions, SyncOutcome, SyncReport, TileSource, TileStore,
    synchronise,
};
