//! Spherical web-mercator helpers for MBTiles `bounds` and `center`.

use std::f64::consts::PI;

use geo::{Coord, Rect};

use crate::coord::{MAX_ZOOM, ZoomRange};

const MAX_LONGITUDE: f64 = 180.0;
const MAX_LATITUDE: f64 = 90.0;

/// Column and bottom-origin row span of the stored tiles at one zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileExtent {
    /// Zoom level the span was measured at.
    pub zoom: u8,
    /// Westernmost column.
    pub min_column: u32,
    /// Easternmost column.
    pub max_column: u32,
    /// Southernmost bottom-origin row.
    pub min_row: u32,
    /// Northernmost bottom-origin row.
    pub max_row: u32,
}

/// Geographic rectangle covered by `extent`, clamped to `[-180, 180]` by
/// `[-90, 90]`.
///
/// The west and south edges come from the lower-left tile, the east and
/// north edges from the upper-right tile.
///
/// # Examples
/// ```
/// use tilemirror_core::{TileExtent, extent_bounds};
///
/// let world = extent_bounds(&TileExtent {
///     zoom: 0,
///     min_column: 0,
///     max_column: 0,
///     min_row: 0,
///     max_row: 0,
/// });
/// assert_eq!(world.min().x, -180.0);
/// assert_eq!(world.max().x, 180.0);
/// assert!(world.max().y < 85.06);
/// ```
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "tile edges are derived with floating point projection maths"
)]
pub fn extent_bounds(extent: &TileExtent) -> Rect<f64> {
    let zoom = extent.zoom.min(MAX_ZOOM);
    let tiles = f64::from(1_u32 << zoom);
    let west = column_longitude(f64::from(extent.min_column), tiles);
    let east = column_longitude(f64::from(extent.max_column) + 1.0, tiles);
    // Bottom-origin row r occupies top-origin row `tiles - 1 - r`.
    let south = row_latitude(tiles - f64::from(extent.min_row), tiles);
    let north = row_latitude(tiles - 1.0 - f64::from(extent.max_row), tiles);
    Rect::new(
        Coord {
            x: west.max(-MAX_LONGITUDE),
            y: south.max(-MAX_LATITUDE),
        },
        Coord {
            x: east.min(MAX_LONGITUDE),
            y: north.min(MAX_LATITUDE),
        },
    )
}

#[expect(
    clippy::float_arithmetic,
    reason = "longitude is linear in the column index"
)]
fn column_longitude(column: f64, tiles: f64) -> f64 {
    column / tiles * 360.0 - MAX_LONGITUDE
}

#[expect(
    clippy::float_arithmetic,
    reason = "inverse mercator projection of a row edge"
)]
fn row_latitude(row: f64, tiles: f64) -> f64 {
    (PI * (1.0 - 2.0 * row / tiles)).sinh().atan().to_degrees()
}

/// Default map view written to the MBTiles `center` row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapCenter {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Initial zoom level.
    pub zoom: u8,
}

/// Zoom used for the initial view: the maximum for shallow pyramids,
/// otherwise halfway between the bounds, rounded down.
///
/// # Examples
/// ```
/// use tilemirror_core::{ZoomRange, center_zoom};
///
/// let shallow = ZoomRange::new(7, 8).expect("valid range");
/// let deep = ZoomRange::new(4, 16).expect("valid range");
/// assert_eq!(center_zoom(shallow), 8);
/// assert_eq!(center_zoom(deep), 10);
/// ```
#[must_use]
pub const fn center_zoom(range: ZoomRange) -> u8 {
    let span = range.max() - range.min();
    if span <= 1 {
        range.max()
    } else {
        range.min() + span.div_euclid(2)
    }
}

/// Midpoint of `bounds` paired with [`center_zoom`].
#[must_use]
#[expect(clippy::float_arithmetic, reason = "midpoint of the bounding box")]
pub fn map_center(bounds: &Rect<f64>, range: ZoomRange) -> MapCenter {
    let min = bounds.min();
    let max = bounds.max();
    MapCenter {
        longitude: (max.x - min.x) / 2.0 + min.x,
        latitude: (max.y - min.y) / 2.0 + min.y,
        zoom: center_zoom(range),
    }
}
