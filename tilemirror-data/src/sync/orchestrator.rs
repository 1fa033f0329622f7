//! Drives one synchronisation run from identity check to final metadata.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::info;
use tilemirror_core::{Tileset, unique_by_digest};

use super::{
    LogProgress, ProgressReporter, SyncError, SyncPhase, collect_garbage, read_checkpoint,
    saturating_count, sync_content, sync_references, write_metadata,
};
use crate::catalog::{CatalogRequest, CatalogVerdict, fetch_catalog};
use crate::source::TileSource;
use crate::store::{JournalMode, METADATA_IDENTITY, TileStore};

/// Default period between content progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Knobs for [`synchronise`].
#[derive(Clone, Copy)]
pub struct SyncOptions<'r> {
    /// Receives phase changes and progress snapshots.
    pub reporter: &'r dyn ProgressReporter,
    /// Period between content progress reports.
    pub progress_interval: Duration,
}

impl Default for SyncOptions<'_> {
    fn default() -> Self {
        Self {
            reporter: &LogProgress,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl std::fmt::Debug for SyncOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("progress_interval", &self.progress_interval)
            .finish_non_exhaustive()
    }
}

/// Counters from a run that updated the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Catalogue rows within the zoom range.
    pub catalog_size: u64,
    /// Distinct digests among them.
    pub unique: u64,
    /// Payloads downloaded and stored.
    pub inserted: u64,
    /// Payloads already present.
    pub skipped: u64,
    /// References inserted or rewritten.
    pub references_written: u64,
    /// Payloads removed by garbage collection.
    pub blobs_deleted: u64,
    /// Manifest time, now stored as the checkpoint.
    pub last_modified: DateTime<Utc>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The manifest was not newer than the checkpoint. The store was not
    /// written.
    UpToDate {
        /// Manifest time reported by the server.
        last_modified: DateTime<Utc>,
    },
    /// The store now mirrors the manifest.
    Updated(SyncReport),
}

/// Mirror `tileset` from `source` into `store`.
///
/// The store is consumed: it is closed when the run ends, and on success its
/// journal is switched back to `DELETE` so the output is a single file.
///
/// # Errors
/// Fails fast with the first [`SyncError`]. Payloads and reference batches
/// committed before the failure remain, so running again resumes the work.
pub async fn synchronise<S>(
    source: &S,
    mut store: TileStore,
    tileset: &Tileset,
    options: SyncOptions<'_>,
) -> Result<SyncOutcome, SyncError>
where
    S: TileSource + ?Sized,
{
    let reporter = options.reporter;

    enter(reporter, SyncPhase::VerifyIdentity);
    verify_identity(&mut store, tileset.id())?;
    let checkpoint = read_checkpoint(&store)?;

    enter(reporter, SyncPhase::FetchCatalog);
    let request = CatalogRequest {
        manifest_id: tileset.manifest_id(),
        zoom: tileset.zoom(),
        checkpoint,
    };
    let catalog = match fetch_catalog(source, &request).await? {
        CatalogVerdict::UpToDate { last_modified } => {
            enter(reporter, SyncPhase::UpToDate);
            info!(
                "{} is up to date (manifest modified {last_modified}); no update performed",
                tileset.id()
            );
            store.close()?;
            return Ok(SyncOutcome::UpToDate { last_modified });
        }
        CatalogVerdict::Stale(catalog) => catalog,
    };

    enter(reporter, SyncPhase::Dedup);
    let unique = unique_by_digest(&catalog.descriptors);
    info!(
        "{} catalogue rows, {} unique tiles",
        catalog.descriptors.len(),
        unique.len()
    );

    enter(reporter, SyncPhase::SyncContent);
    let content = sync_content(
        source,
        &store,
        tileset,
        &unique,
        reporter,
        options.progress_interval,
    )
    .await?;
    info!("stored {} new tiles", content.inserted);

    enter(reporter, SyncPhase::SyncReferences);
    let references = sync_references(&mut store, &catalog.descriptors, reporter)?;
    info!("{} tile references written", references.written);

    enter(reporter, SyncPhase::CollectGarbage);
    let blobs_deleted = collect_garbage(&store)?;

    enter(reporter, SyncPhase::WriteMetadata);
    let format = catalog
        .descriptors
        .first()
        .and_then(|descriptor| descriptor.extension());
    write_metadata(&mut store, tileset, format, catalog.last_modified)?;

    store.set_journal_mode(JournalMode::Delete)?;
    store.close()?;
    enter(reporter, SyncPhase::Done);

    Ok(SyncOutcome::Updated(SyncReport {
        catalog_size: saturating_count(catalog.descriptors.len()),
        unique: content.total,
        inserted: content.inserted,
        skipped: content.skipped,
        references_written: references.written,
        blobs_deleted,
        last_modified: catalog.last_modified,
    }))
}

fn enter(reporter: &dyn ProgressReporter, phase: SyncPhase) {
    info!("phase: {phase}");
    reporter.phase_started(phase);
}

/// Refuse stores bound to another tileset or holding unlabelled data, and
/// claim an empty store for `requested`.
///
/// The identity is claimed before any tile is written so an interrupted
/// first run can be resumed.
fn verify_identity(store: &mut TileStore, requested: &str) -> Result<(), SyncError> {
    match store.identity()? {
        Some(stored) if stored == requested => Ok(()),
        Some(stored) => Err(SyncError::IdentityConflict {
            stored,
            requested: requested.to_owned(),
        }),
        None => {
            let references = store.reference_count()?;
            if references > 0 {
                return Err(SyncError::AmbiguousExistingData { references });
            }
            store.write_metadata([(METADATA_IDENTITY, requested.to_owned())])?;
            Ok(())
        }
    }
}
