//! MBTiles metadata and the run checkpoint.
//!
//! The `lastModified` row doubles as the checkpoint: the next run compares
//! the manifest's `Last-Modified` header against it.

use chrono::{DateTime, SecondsFormat, Utc};
use log::warn;
use tilemirror_core::{Tileset, extent_bounds, map_center};

use super::SyncError;
use crate::store::{METADATA_IDENTITY, TileStore};

/// Metadata key holding the manifest time of the last successful run.
pub const CHECKPOINT_KEY: &str = "lastModified";

/// Attribution required by the tile publisher.
pub const ATTRIBUTION: &str =
    r#"<a href="https://www.gsi.go.jp/" target="_blank">&copy; GSI Japan</a>"#;

/// Manifest time recorded by the previous run.
///
/// A value that does not parse as RFC 3339 is logged and treated as absent,
/// which forces a full run.
pub fn read_checkpoint(store: &TileStore) -> Result<Option<DateTime<Utc>>, SyncError> {
    let Some(raw) = store.metadata(CHECKPOINT_KEY)? else {
        return Ok(None);
    };
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(stamp) => Ok(Some(stamp.with_timezone(&Utc))),
        Err(err) => {
            warn!("ignoring unreadable checkpoint {raw:?}: {err}");
            Ok(None)
        }
    }
}

/// `1.0.0+YYYYMMDDHHmmss` in UTC.
#[must_use]
pub fn version_stamp(last_modified: DateTime<Utc>) -> String {
    format!("1.0.0+{}", last_modified.format("%Y%m%d%H%M%S"))
}

/// Write the descriptive rows, the checkpoint, and the map view.
///
/// `format` is the extension of the first catalogue row. Bounds and center
/// are derived from the tiles stored at the minimum zoom and are skipped
/// when there are none.
pub fn write_metadata(
    store: &mut TileStore,
    tileset: &Tileset,
    format: Option<&str>,
    last_modified: DateTime<Utc>,
) -> Result<(), SyncError> {
    let zoom = tileset.zoom();
    let mut entries = vec![
        (METADATA_IDENTITY, tileset.id().to_owned()),
        ("name", tileset.name().to_owned()),
    ];
    match format {
        Some(extension) => entries.push(("format", extension.to_owned())),
        None => warn!("catalogue for {} is empty; format left unset", tileset.id()),
    }
    entries.extend([
        ("minzoom", zoom.min().to_string()),
        ("maxzoom", zoom.max().to_string()),
        ("version", version_stamp(last_modified)),
        (
            CHECKPOINT_KEY,
            last_modified.to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
        ("attribution", ATTRIBUTION.to_owned()),
    ]);

    if let Some(extent) = store.tile_extent(zoom.min())? {
        let bounds = extent_bounds(&extent);
        let center = map_center(&bounds, zoom);
        entries.push((
            "bounds",
            format!(
                "{},{},{},{}",
                bounds.min().x,
                bounds.min().y,
                bounds.max().x,
                bounds.max().y
            ),
        ));
        entries.push((
            "center",
            format!("{},{},{}", center.longitude, center.latitude, center.zoom),
        ));
    } else {
        warn!(
            "no tiles stored at zoom {} for {}; bounds and center left unset",
            zoom.min(),
            tileset.id()
        );
    }

    store.write_metadata(entries)?;
    Ok(())
}
