//! MBTiles persistence for mirrored tilesets.
//!
//! The module is split into focused submodules:
//! - [`schema`] materialises the deduplicated MBTiles layout (`metadata`,
//!   `images`, `tile_ref` and the `tiles` view).
//! - `session` exposes [`TileStore`], the single writer path used by a run.
#![forbid(unsafe_code)]

mod error;
pub mod schema;
mod session;

pub use error::StoreError;
pub use schema::initialise_schema;
pub use session::{JournalMode, METADATA_IDENTITY, ReferenceBatch, TileStore};
