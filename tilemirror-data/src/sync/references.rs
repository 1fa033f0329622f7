//! Reference phase: point every catalogue coordinate at its digest.

use log::debug;
use tilemirror_core::TileDescriptor;

use super::{ProgressReporter, ReferenceProgress, SyncError, saturating_count};
use crate::store::TileStore;

/// Rows written per transaction and between progress reports.
pub const REFERENCE_BATCH: usize = 10_000;

/// Upsert a reference for every descriptor, in catalogue order.
///
/// Rows whose stored stamp already matches are left alone, so re-running an
/// unchanged catalogue writes nothing. Each batch commits before the next
/// starts.
///
/// # Errors
/// Returns [`SyncError::Parse`] for a malformed tile path; the batch that
/// contained it is rolled back.
pub fn sync_references(
    store: &mut TileStore,
    descriptors: &[TileDescriptor],
    reporter: &dyn ProgressReporter,
) -> Result<ReferenceProgress, SyncError> {
    write_in_batches(store, descriptors, reporter, REFERENCE_BATCH)
}

fn write_in_batches(
    store: &mut TileStore,
    descriptors: &[TileDescriptor],
    reporter: &dyn ProgressReporter,
    batch_size: usize,
) -> Result<ReferenceProgress, SyncError> {
    let mut progress = ReferenceProgress {
        total: saturating_count(descriptors.len()),
        ..ReferenceProgress::default()
    };
    for chunk in descriptors.chunks(batch_size.max(1)) {
        let batch = store.begin_references()?;
        for descriptor in chunk {
            let coord = descriptor.tile_path()?.coord().to_tms();
            if batch.upsert(coord, &descriptor.digest, descriptor.modified_stamp)? {
                progress.written += 1;
            }
            progress.processed += 1;
        }
        batch.commit()?;
        debug!("committed {} references", chunk.len());
        if chunk.len() == batch_size {
            reporter.reference_progress(&progress);
        }
    }
    Ok(progress)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::sync::ContentProgress;
    use rstest::{fixture, rstest};
    use tilemirror_core::ContentDigest;

    #[derive(Default)]
    struct Recorder {
        references: RefCell<Vec<ReferenceProgress>>,
    }

    impl ProgressReporter for Recorder {
        fn content_progress(&self, _progress: &ContentProgress) {}

        fn reference_progress(&self, progress: &ReferenceProgress) {
            self.references.borrow_mut().push(*progress);
        }
    }

    fn descriptor(path: &str, stamp: i64, digest: &str) -> TileDescriptor {
        TileDescriptor {
            path: path.to_owned(),
            modified_stamp: stamp,
            byte_size: 1,
            digest: ContentDigest::new(digest).expect("valid digest"),
        }
    }

    fn stored_row(store: &TileStore, zoom: u8, column: u32, row: u32) -> Option<String> {
        store
            .connection()
            .query_row(
                "SELECT image_md5 FROM tile_ref
                WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
                (zoom, column, row),
                |found| found.get(0),
            )
            .ok()
    }

    #[fixture]
    fn store() -> TileStore {
        TileStore::open_in_memory().expect("open store")
    }

    #[rstest]
    fn flips_rows_to_bottom_origin(mut store: TileStore) {
        let descriptors = [descriptor("3/4/5.pbf", 1, "aa")];
        sync_references(&mut store, &descriptors, &Recorder::default()).expect("references sync");
        assert_eq!(stored_row(&store, 3, 4, 2).as_deref(), Some("aa"));
        assert_eq!(stored_row(&store, 3, 4, 5), None);
    }

    #[rstest]
    fn rewrites_only_changed_stamps(mut store: TileStore) {
        let first = [descriptor("3/4/5.pbf", 1, "aa"), descriptor("3/1/1.pbf", 1, "bb")];
        let initial =
            sync_references(&mut store, &first, &Recorder::default()).expect("first pass");
        assert_eq!(initial.written, 2);

        let unchanged =
            sync_references(&mut store, &first, &Recorder::default()).expect("second pass");
        assert_eq!(unchanged.written, 0);
        assert_eq!(unchanged.processed, 2);

        let moved = [descriptor("3/4/5.pbf", 2, "cc"), descriptor("3/1/1.pbf", 1, "bb")];
        let updated =
            sync_references(&mut store, &moved, &Recorder::default()).expect("third pass");
        assert_eq!(updated.written, 1);
        assert_eq!(stored_row(&store, 3, 4, 2).as_deref(), Some("cc"));
    }

    #[rstest]
    fn reports_after_each_full_batch(mut store: TileStore) {
        let descriptors = [
            descriptor("2/0/0.pbf", 1, "aa"),
            descriptor("2/0/1.pbf", 1, "aa"),
            descriptor("2/0/2.pbf", 1, "aa"),
            descriptor("2/0/3.pbf", 1, "aa"),
            descriptor("2/1/0.pbf", 1, "aa"),
        ];
        let recorder = Recorder::default();
        let progress =
            write_in_batches(&mut store, &descriptors, &recorder, 2).expect("references sync");
        let processed: Vec<u64> = recorder
            .references
            .borrow()
            .iter()
            .map(|p| p.processed)
            .collect();
        assert_eq!(processed, [2, 4]);
        assert_eq!(progress.processed, 5);
        assert_eq!(progress.total, 5);
    }

    #[rstest]
    fn malformed_path_rolls_back_its_batch(mut store: TileStore) {
        let descriptors = [
            descriptor("2/0/0.pbf", 1, "aa"),
            descriptor("2/0/1.pbf", 1, "aa"),
            descriptor("2/0/2.pbf", 1, "aa"),
            descriptor("2/9/2.pbf", 1, "aa"),
        ];
        let err = write_in_batches(&mut store, &descriptors, &Recorder::default(), 2)
            .expect_err("column 9 is outside zoom 2");
        assert!(matches!(err, SyncError::Parse { .. }), "got {err:?}");
        assert_eq!(store.reference_count().expect("count"), 2);
    }
}
