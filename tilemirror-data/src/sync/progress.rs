//! Progress hook driven by the orchestrator.
//!
//! Content progress is reported on a timer while the worker pool drains;
//! reference progress is reported every [`REFERENCE_BATCH`](super::REFERENCE_BATCH)
//! rows. Implementations must be cheap: they run on the synchronising task.

use std::fmt;

use log::info;

/// Stages of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Compare the store's identity with the requested tileset.
    VerifyIdentity,
    /// Download and decode the manifest.
    FetchCatalog,
    /// The manifest is not newer than the checkpoint; nothing to do.
    UpToDate,
    /// Reduce the catalogue to one row per digest.
    Dedup,
    /// Fetch and store missing payloads.
    SyncContent,
    /// Point every coordinate at its digest.
    SyncReferences,
    /// Remove payloads no reference points to.
    CollectGarbage,
    /// Write the MBTiles metadata and checkpoint.
    WriteMetadata,
    /// The run completed.
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::VerifyIdentity => "verify identity",
            Self::FetchCatalog => "fetch catalogue",
            Self::UpToDate => "up to date",
            Self::Dedup => "deduplicate",
            Self::SyncContent => "synchronise content",
            Self::SyncReferences => "synchronise references",
            Self::CollectGarbage => "collect garbage",
            Self::WriteMetadata => "write metadata",
            Self::Done => "done",
        };
        f.write_str(label)
    }
}

/// Counters for the content phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentProgress {
    /// Descriptors handed to the worker pool so far.
    pub queued: u64,
    /// Payloads fetched and stored.
    pub inserted: u64,
    /// Payloads already present in the store.
    pub skipped: u64,
    /// Unique descriptors in this run.
    pub total: u64,
}

/// Counters for the reference phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceProgress {
    /// Descriptors processed.
    pub processed: u64,
    /// References inserted or rewritten.
    pub written: u64,
    /// Descriptors in the catalogue.
    pub total: u64,
}

/// Receives progress from a run.
pub trait ProgressReporter {
    /// A phase is starting.
    fn phase_started(&self, _phase: SyncPhase) {}
    /// Periodic snapshot of the content phase.
    fn content_progress(&self, progress: &ContentProgress);
    /// Snapshot after each reference batch.
    fn reference_progress(&self, progress: &ReferenceProgress);
}

/// Reporter that writes progress through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn content_progress(&self, progress: &ContentProgress) {
        info!(
            "content: {}/{} queued, {} inserted, {} skipped",
            progress.queued, progress.total, progress.inserted, progress.skipped
        );
    }

    fn reference_progress(&self, progress: &ReferenceProgress) {
        info!(
            "references: {}/{} processed, {} written",
            progress.processed, progress.total, progress.written
        );
    }
}

/// Reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn content_progress(&self, _progress: &ContentProgress) {}

    fn reference_progress(&self, _progress: &ReferenceProgress) {}
}
