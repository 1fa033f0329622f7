//! Garbage collection of payloads no reference points to.

use log::info;

use super::SyncError;
use crate::store::TileStore;

/// Delete unreferenced payloads and compact the file.
///
/// Must run after the reference phase so that payloads still in use are
/// never removed. Returns the number of payloads deleted.
pub fn collect_garbage(store: &TileStore) -> Result<u64, SyncError> {
    let deleted = store.delete_unreferenced_images()?;
    store.vacuum()?;
    info!("removed {deleted} unreferenced tiles");
    Ok(deleted)
}
