//! Synchronisation engine: turn a manifest into an up-to-date MBTiles store.
//!
//! A run moves through the phases of [`SyncPhase`]:
//! - [`content`] downloads payloads the store lacks, one per digest.
//! - [`references`] points every coordinate at its digest.
//! - [`gc`] drops payloads nothing refers to any more.
//! - [`metadata`] writes the MBTiles description and the checkpoint.
//!
//! [`synchronise`] drives them in order against one [`TileStore`](crate::store::TileStore).
#![forbid(unsafe_code)]

pub mod content;
mod error;
pub mod gc;
pub mod metadata;
mod orchestrator;
mod progress;
pub mod references;

pub use content::{POOL_WIDTH, sync_content};
pub use error::SyncError;
pub use gc::collect_garbage;
pub use metadata::{ATTRIBUTION, CHECKPOINT_KEY, read_checkpoint, version_stamp, write_metadata};
pub use orchestrator::{
    DEFAULT_PROGRESS_INTERVAL, SyncOptions, SyncOutcome, SyncReport, synchronise,
};
pub use progress::{
    ContentProgress, LogProgress, ProgressReporter, ReferenceProgress, SilentProgress, SyncPhase,
};
pub use references::{REFERENCE_BATCH, sync_references};

fn saturating_count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
