//! Behavioural coverage for full synchronisation runs.
//!
//! Runs drive [`synchronise`] against [`StubTileSource`] and an on-disk store,
//! reopening the file between runs the way the CLI does.

use std::cell::RefCell;

use camino::Utf8PathBuf;
use chrono::{DateTime, TimeZone, Utc};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use rusqlite::Connection;
use tempfile::TempDir;
use tilemirror_core::{ContentDigest, ContentKind, TmsCoord, Tileset, ZoomRange};
use tilemirror_data::source::test_support::{
    StubTileSource, block_on_for_tests, gzip_manifest, manifest_line,
};
use tilemirror_data::store::TileStore;
use tilemirror_data::sync::{
    SilentProgress, SyncError, SyncOptions, SyncOutcome, SyncReport, synchronise,
};

const REPOINTED: &str = "3/5/3.pbf";

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .expect("valid timestamp")
}

fn digest(raw: &str) -> ContentDigest {
    ContentDigest::new(raw).expect("valid digest")
}

fn tileset(id: &str) -> Tileset {
    Tileset::new(
        id,
        "Test tiles",
        ZoomRange::new(2, 3).expect("valid range"),
        ContentKind::Vector,
    )
}

/// World state shared by the steps of one scenario.
struct SyncWorld {
    source: StubTileSource,
    dir: TempDir,
    outcome: RefCell<Option<Result<SyncOutcome, SyncError>>>,
}

impl SyncWorld {
    fn path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join("out.mbtiles")).expect("utf-8 path")
    }

    fn open(&self) -> TileStore {
        TileStore::open(&self.path()).expect("open store")
    }

    fn publish(&self, repointed: bool, modified: i64) {
        let last = if repointed {
            manifest_line(REPOINTED, 20, 3, "cc")
        } else {
            manifest_line(REPOINTED, 10, 3, "bb")
        };
        let manifest = gzip_manifest([
            manifest_line("2/1/1.pbf", 10, 3, "aa"),
            manifest_line("2/2/1.pbf", 10, 3, "aa"),
            last,
        ])
        .expect("gzip manifest");
        self.source.publish_manifest(manifest, Some(at(modified)));
    }

    fn run(&self, id: &str) -> Result<SyncOutcome, SyncError> {
        let options = SyncOptions {
            reporter: &SilentProgress,
            ..SyncOptions::default()
        };
        block_on_for_tests(synchronise(&self.source, self.open(), &tileset(id), options))
    }

    fn report(&self) -> SyncReport {
        match self.outcome.borrow().as_ref() {
            Some(Ok(SyncOutcome::Updated(report))) => report.clone(),
            other => panic!("expected an updating run, got {other:?}"),
        }
    }

    fn tile_data(&self, coord: TmsCoord) -> Vec<u8> {
        let connection = Connection::open(self.path()).expect("open database");
        connection
            .query_row(
                "SELECT tile_data FROM tiles
                WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
                (coord.zoom(), coord.column(), coord.row()),
                |row| row.get(0),
            )
            .expect("tile resolves")
    }

    fn metadata(&self, name: &str) -> String {
        self.open()
            .metadata(name)
            .expect("metadata lookup")
            .unwrap_or_else(|| panic!("metadata {name} missing"))
    }
}

#[fixture]
fn world() -> SyncWorld {
    SyncWorld {
        source: StubTileSource::new(),
        dir: TempDir::new().expect("tempdir"),
        outcome: RefCell::new(None),
    }
}

// --- Given steps ---

#[given("a manifest listing three tiles that share two digests")]
fn given_manifest(world: &SyncWorld) {
    world.publish(false, 5_000);
    for path in ["2/1/1.pbf", "2/2/1.pbf", REPOINTED] {
        world.source.insert_tile(path, path.as_bytes().to_vec());
    }
}

#[given("the standard tileset has been synchronised")]
fn given_synchronised(world: &SyncWorld) {
    let outcome = world.run("std").expect("initial run succeeds");
    assert!(matches!(outcome, SyncOutcome::Updated(_)));
    world.source.reset_fetches();
}

#[given("a store holding references but no identity")]
fn given_unlabelled_store(world: &SyncWorld) {
    let mut store = world.open();
    let batch = store.begin_references().expect("begin");
    batch
        .upsert(
            TmsCoord::new(2, 0, 0).expect("valid coordinate"),
            &digest("ff"),
            1,
        )
        .expect("upsert");
    batch.commit().expect("commit");
    store.close().expect("close");
}

// --- When steps ---

#[when("the standard tileset is synchronised")]
fn when_standard_synchronised(world: &SyncWorld) {
    world.outcome.replace(Some(world.run("std")));
}

#[when("the pale tileset is synchronised")]
fn when_pale_synchronised(world: &SyncWorld) {
    world.outcome.replace(Some(world.run("pale")));
}

#[when("the manifest is republished with a newer timestamp")]
fn when_republished(world: &SyncWorld) {
    world.publish(false, 6_000);
}

#[when("the manifest repoints one tile to new content")]
fn when_repointed(world: &SyncWorld) {
    world.publish(true, 6_000);
    world.source.insert_tile(REPOINTED, b"replacement".to_vec());
}

// --- Then steps ---

#[then("each digest is fetched once")]
fn then_fetched_once(world: &SyncWorld) {
    let mut fetched = world.source.fetched_paths();
    fetched.sort();
    assert_eq!(fetched, ["2/1/1.pbf", REPOINTED]);
    let report = world.report();
    assert_eq!((report.catalog_size, report.unique), (3, 2));
}

#[then("every tile resolves to its digest")]
fn then_tiles_resolve(world: &SyncWorld) {
    let shared = b"2/1/1.pbf".to_vec();
    // Rows flip to bottom origin: zoom 2 row 1 is stored as row 2.
    assert_eq!(world.tile_data(TmsCoord::new(2, 1, 2).expect("coord")), shared);
    assert_eq!(world.tile_data(TmsCoord::new(2, 2, 2).expect("coord")), shared);
    assert_eq!(
        world.tile_data(TmsCoord::new(3, 5, 4).expect("coord")),
        REPOINTED.as_bytes()
    );
    assert_eq!(world.open().image_count().expect("count"), 2);
}

#[then("the store records the manifest time as its checkpoint")]
fn then_checkpoint(world: &SyncWorld) {
    assert_eq!(world.metadata("lastModified"), "1970-01-01T01:23:20.000Z");
    assert_eq!(world.metadata("version"), "1.0.0+19700101012320");
    assert_eq!(world.metadata("format"), "pbf");
}

#[then("the run reports that no update was performed")]
fn then_up_to_date(world: &SyncWorld) {
    let outcome = world.outcome.borrow();
    assert!(
        matches!(
            outcome.as_ref(),
            Some(Ok(SyncOutcome::UpToDate { last_modified })) if *last_modified == at(5_000)
        ),
        "got {outcome:?}"
    );
}

#[then("no tiles are fetched")]
fn then_nothing_fetched(world: &SyncWorld) {
    assert_eq!(world.source.tile_fetches(), 0);
}

#[then("no references are written")]
fn then_no_references_written(world: &SyncWorld) {
    let report = world.report();
    assert_eq!(report.references_written, 0);
    assert_eq!((report.inserted, report.skipped), (0, 2));
    assert_eq!(report.last_modified, at(6_000));
}

#[then("the run fails with an identity conflict")]
fn then_identity_conflict(world: &SyncWorld) {
    let outcome = world.outcome.borrow();
    assert!(
        matches!(
            outcome.as_ref(),
            Some(Err(SyncError::IdentityConflict { stored, requested }))
                if stored == "std" && requested == "pale"
        ),
        "got {outcome:?}"
    );
}

#[then("the store still holds three references")]
fn then_rows_unchanged(world: &SyncWorld) {
    let store = world.open();
    assert_eq!(store.reference_count().expect("count"), 3);
    assert_eq!(store.identity().expect("identity").as_deref(), Some("std"));
    assert_eq!(world.source.tile_fetches(), 0);
}

#[then("the run fails because existing data is ambiguous")]
fn then_ambiguous(world: &SyncWorld) {
    let outcome = world.outcome.borrow();
    assert!(
        matches!(
            outcome.as_ref(),
            Some(Err(SyncError::AmbiguousExistingData { references: 1 }))
        ),
        "got {outcome:?}"
    );
    assert_eq!(world.source.manifest_requests(), 0);
}

#[then("exactly one payload is removed")]
fn then_one_removed(world: &SyncWorld) {
    let report = world.report();
    assert_eq!(report.blobs_deleted, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.references_written, 1);
}

#[then("the replaced payload is gone")]
fn then_replaced_gone(world: &SyncWorld) {
    let store = world.open();
    assert!(!store.has_image(&digest("bb")).expect("lookup"));
    assert!(store.has_image(&digest("aa")).expect("lookup"));
    assert!(store.has_image(&digest("cc")).expect("lookup"));
    assert_eq!(
        world.tile_data(TmsCoord::new(3, 5, 4).expect("coord")),
        b"replacement"
    );
}

#[then("the bounds lie within the projected world")]
fn then_bounds_within_world(world: &SyncWorld) {
    let bounds: Vec<f64> = world
        .metadata("bounds")
        .split(',')
        .map(|value| value.parse().expect("number"))
        .collect();
    let [west, south, east, north] = bounds.as_slice() else {
        panic!("expected four bounds values, got {bounds:?}");
    };
    assert!(-180.0 <= *west && west < east && *east <= 180.0, "{bounds:?}");
    assert!(-90.0 <= *south && south < north && *north <= 90.0, "{bounds:?}");
}

#[then("the center uses the maximum zoom of a shallow pyramid")]
fn then_center_zoom(world: &SyncWorld) {
    let center = world.metadata("center");
    let fields: Vec<&str> = center.split(',').collect();
    assert_eq!(fields.len(), 3, "{center}");
    assert_eq!(fields.last().copied(), Some("3"));
}

// --- Scenario registrations ---

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/sync.feature", name = $title)]
        fn $fn_name(world: SyncWorld) {
            let _ = world;
        }
    };
}

register_scenario!(first_run, "first run stores one payload per digest");
register_scenario!(unchanged_manifest, "an unchanged manifest is not read again");
register_scenario!(
    republished_manifest,
    "a republished but unchanged manifest writes nothing"
);
register_scenario!(identity_conflict, "a store bound to another tileset is refused");
register_scenario!(unlabelled_data, "unlabelled data is never adopted");
register_scenario!(orphaned_payloads, "repointed tiles leave no orphaned payloads");
register_scenario!(bounds_and_center, "bounds and center describe the minimum zoom");
