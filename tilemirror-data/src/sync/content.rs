//! Content phase: fetch every payload the store does not hold yet.
//!
//! Fetches run through a bounded pool of [`POOL_WIDTH`] futures polled by the
//! calling task. Inserts happen only in the consuming loop, so the store sees
//! one writer even while many requests are in flight.

use std::{cell::Cell, pin::pin, time::Duration};

use futures_util::{StreamExt, stream};
use log::debug;
use tilemirror_core::{TileDescriptor, Tileset};
use tokio::{
    task,
    time::{self, Instant, MissedTickBehavior},
};

use super::{ContentProgress, ProgressReporter, SyncError, saturating_count};
use crate::source::TileSource;
use crate::store::TileStore;

/// Maximum number of tile requests in flight.
pub const POOL_WIDTH: usize = 20;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

enum Fetched<'d> {
    Present,
    Fresh {
        descriptor: &'d TileDescriptor,
        bytes: Vec<u8>,
    },
}

/// Store the payload of every descriptor in `unique` that is not present yet.
///
/// `unique` must hold one descriptor per digest. Progress is reported every
/// `interval` while the pool drains and once more when it is empty.
///
/// # Errors
/// The first failed fetch, transform or insert aborts the phase. Payloads
/// inserted before it remain stored.
pub async fn sync_content<S>(
    source: &S,
    store: &TileStore,
    tileset: &Tileset,
    unique: &[&TileDescriptor],
    reporter: &dyn ProgressReporter,
    interval: Duration,
) -> Result<ContentProgress, SyncError>
where
    S: TileSource + ?Sized,
{
    let mut progress = ContentProgress {
        total: saturating_count(unique.len()),
        ..ContentProgress::default()
    };
    let queued = Cell::new(0_u64);
    let mut fetches = pin!(
        stream::iter(unique.iter().copied())
            .map(|descriptor| {
                queued.set(queued.get() + 1);
                fetch_one(source, store, tileset, descriptor)
            })
            .buffer_unordered(POOL_WIDTH)
    );

    let period = interval.max(MIN_INTERVAL);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = fetches.next() => {
                let Some(result) = next else { break };
                match result? {
                    Fetched::Present => progress.skipped += 1,
                    Fetched::Fresh { descriptor, bytes } => {
                        store.insert_image(&descriptor.digest, descriptor.byte_size, &bytes)?;
                        progress.inserted += 1;
                    }
                }
            }
            _ = ticker.tick() => {
                progress.queued = queued.get();
                reporter.content_progress(&progress);
            }
        }
    }

    progress.queued = queued.get();
    reporter.content_progress(&progress);
    Ok(progress)
}

async fn fetch_one<'d, S>(
    source: &S,
    store: &TileStore,
    tileset: &Tileset,
    descriptor: &'d TileDescriptor,
) -> Result<Fetched<'d>, SyncError>
where
    S: TileSource + ?Sized,
{
    if store.has_image(&descriptor.digest)? {
        return Ok(Fetched::Present);
    }

    let body = source
        .fetch_tile(tileset.source_id(), &descriptor.path)
        .await?;
    let bytes = match tileset.transform() {
        Some(transform) => task::spawn_blocking(move || transform(&body))
            .await?
            .map_err(|source| SyncError::Transform {
                path: descriptor.path.clone(),
                source,
            })?,
        None => body,
    };
    debug!("fetched {} ({} bytes)", descriptor.path, bytes.len());
    Ok(Fetched::Fresh { descriptor, bytes })
}
