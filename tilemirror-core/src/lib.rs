//! Core domain types for the tilemirror synchronisation engine.
//!
//! Responsibilities:
//! - Decode tile paths with a strict `{z}/{x}/{y}.{ext}` grammar.
//! - Convert between top-origin (XYZ) and bottom-origin (TMS) rows.
//! - Collapse manifest descriptors to one entry per content digest.
//! - Derive MBTiles bounds and centre from tile extents.
//! - Describe the known tilesets and their optional tile transforms.
//!
//! Boundaries:
//! - No I/O. Network access and SQLite persistence live in `tilemirror-data`.
//!
//! Invariants:
//! - Constructors validate their input and return `Result` so malformed
//!   coordinates never reach the store.
#![forbid(unsafe_code)]

pub mod coord;
pub mod dedup;
pub mod descriptor;
pub mod mercator;
pub mod terrain;
pub mod tileset;

pub use coord::{
    MAX_ZOOM, TileCoord, TilePath, TilePathError, TilePathErrorKind, TmsCoord, ZoomRange,
    ZoomRangeError,
};
pub use dedup::unique_by_digest;
pub use descriptor::{ContentDigest, DigestError, TileDescriptor};
pub use mercator::{MapCenter, TileExtent, center_zoom, extent_bounds, map_center};
pub use terrain::gsi_dem_to_terrain_rgb;
pub use tileset::{
    ContentKind, TileTransform, Tileset, TransformError, known_tilesets, lookup_tileset,
};
