//! Tile coordinates, zoom ranges and the `{z}/{x}/{y}.{ext}` path grammar.
//!
//! Remote catalogues address tiles with top-origin rows (row 0 is the north
//! edge, the XYZ convention). MBTiles stores bottom-origin rows (the TMS
//! convention). The two conventions get distinct types so a row can never be
//! written to the store without passing through [`TileCoord::to_tms`].

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Highest zoom level accepted by the path grammar.
///
/// `2^30` tiles per axis still fits in a `u32` index.
pub const MAX_ZOOM: u8 = 30;

const fn tiles_per_axis(zoom: u8) -> u32 {
    1_u32 << zoom
}

/// Tile address using top-origin rows, as published by XYZ tile services.
///
/// # Examples
/// ```
/// use tilemirror_core::TileCoord;
///
/// # fn main() -> Result<(), tilemirror_core::TilePathError> {
/// let coord = TileCoord::new(3, 4, 5)?;
/// assert_eq!(coord.to_tms().row(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    zoom: u8,
    column: u32,
    row: u32,
}

impl TileCoord {
    /// Validate and construct a top-origin tile coordinate.
    pub fn new(zoom: u8, column: u32, row: u32) -> Result<Self, TilePathError> {
        validate_indices(zoom, column, row)?;
        Ok(Self { zoom, column, row })
    }

    /// Zoom level.
    #[must_use]
    pub const fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Column index, counted from the west edge.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Row index, counted from the north edge.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Convert to the bottom-origin convention used by MBTiles:
    /// `row' = 2^zoom - 1 - row`.
    #[must_use]
    pub const fn to_tms(self) -> TmsCoord {
        TmsCoord {
            zoom: self.zoom,
            column: self.column,
            row: flip_row(self.zoom, self.row),
        }
    }
}

/// Tile address using bottom-origin rows, as stored in MBTiles `tile_row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TmsCoord {
    zoom: u8,
    column: u32,
    row: u32,
}

impl TmsCoord {
    /// Validate and construct a bottom-origin tile coordinate.
    pub fn new(zoom: u8, column: u32, row: u32) -> Result<Self, TilePathError> {
        validate_indices(zoom, column, row)?;
        Ok(Self { zoom, column, row })
    }

    /// Zoom level.
    #[must_use]
    pub const fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Column index, counted from the west edge.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Row index, counted from the south edge.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Convert back to the top-origin convention.
    #[must_use]
    pub const fn to_xyz(self) -> TileCoord {
        TileCoord {
            zoom: self.zoom,
            column: self.column,
            row: flip_row(self.zoom, self.row),
        }
    }
}

// Callers guarantee `row < 2^zoom`, which every constructor enforces.
const fn flip_row(zoom: u8, row: u32) -> u32 {
    tiles_per_axis(zoom) - 1 - row
}

fn validate_indices(zoom: u8, column: u32, row: u32) -> Result<(), TilePathError> {
    let describe = || format!("{zoom}/{column}/{row}");
    if zoom > MAX_ZOOM {
        return Err(TilePathError::new(describe(), TilePathErrorKind::ZoomOutOfRange { zoom }));
    }
    let limit = tiles_per_axis(zoom);
    for (axis, value) in [("column", column), ("row", row)] {
        if value >= limit {
            return Err(TilePathError::new(
                describe(),
                TilePathErrorKind::IndexOutOfRange { axis, value, zoom },
            ));
        }
    }
    Ok(())
}

/// A decoded manifest path: a tile coordinate plus its file extension.
///
/// The grammar is exactly `{z}/{x}/{y}.{ext}` where `z`, `x` and `y` are
/// unsigned decimal integers and `ext` is a non-empty ASCII alphanumeric
/// token. Anything else is rejected.
///
/// # Examples
/// ```
/// use tilemirror_core::TilePath;
///
/// let path: TilePath = "18/232837/103222.png".parse().expect("valid path");
/// assert_eq!(path.coord().zoom(), 18);
/// assert_eq!(path.extension(), "png");
/// assert!("18/232837/-1.png".parse::<TilePath>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TilePath {
    coord: TileCoord,
    extension: String,
}

impl TilePath {
    /// Decoded top-origin coordinate.
    #[must_use]
    pub const fn coord(&self) -> TileCoord {
        self.coord
    }

    /// File extension without the leading dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Parse only the zoom segment of a manifest path.
    ///
    /// Used when filtering manifests by zoom before the full path is needed.
    pub fn leading_zoom(raw: &str) -> Result<u8, TilePathError> {
        let segment = raw.split('/').next().unwrap_or_default();
        let zoom = parse_segment::<u8>(raw, "zoom", segment)?;
        if zoom > MAX_ZOOM {
            return Err(TilePathError::new(raw, TilePathErrorKind::ZoomOutOfRange { zoom }));
        }
        Ok(zoom)
    }
}

impl FromStr for TilePath {
    type Err = TilePathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (stem, extension) = raw
            .rsplit_once('.')
            .ok_or_else(|| TilePathError::new(raw, TilePathErrorKind::MissingExtension))?;
        if extension.is_empty() || !extension.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(TilePathError::new(
                raw,
                TilePathErrorKind::InvalidExtension {
                    extension: extension.to_owned(),
                },
            ));
        }

        let segments: Vec<&str> = stem.split('/').collect();
        let [zoom_text, column_text, row_text] = segments.as_slice() else {
            return Err(TilePathError::new(
                raw,
                TilePathErrorKind::SegmentCount {
                    found: segments.len(),
                },
            ));
        };
        let zoom = parse_segment::<u8>(raw, "zoom", zoom_text)?;
        let column = parse_segment::<u32>(raw, "column", column_text)?;
        let row = parse_segment::<u32>(raw, "row", row_text)?;
        let coord = TileCoord::new(zoom, column, row).map_err(|err| err.with_path(raw))?;

        Ok(Self {
            coord,
            extension: extension.to_owned(),
        })
    }
}

impl fmt::Display for TilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}.{}",
            self.coord.zoom, self.coord.column, self.coord.row, self.extension
        )
    }
}

fn parse_segment<T: FromStr>(
    raw: &str,
    segment: &'static str,
    value: &str,
) -> Result<T, TilePathError> {
    let invalid = || {
        TilePathError::new(
            raw,
            TilePathErrorKind::InvalidSegment {
                segment,
                value: value.to_owned(),
            },
        )
    };
    // `str::parse` tolerates a leading `+`; the grammar does not.
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse::<T>().map_err(|_| invalid())
}

/// Error raised when a tile path does not match the `{z}/{x}/{y}.{ext}` grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tile path {path:?}: {kind}")]
pub struct TilePathError {
    path: String,
    kind: TilePathErrorKind,
}

impl TilePathError {
    fn new(path: impl Into<String>, kind: TilePathErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    fn with_path(mut self, path: &str) -> Self {
        path.clone_into(&mut self.path);
        self
    }

    /// The offending input.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// What was wrong with it.
    #[must_use]
    pub const fn kind(&self) -> &TilePathErrorKind {
        &self.kind
    }
}

/// Specific grammar violations reported by [`TilePathError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TilePathErrorKind {
    /// No `.` separates the coordinate from the extension.
    #[error("missing file extension")]
    MissingExtension,
    /// The extension is empty or contains non-alphanumeric characters.
    #[error("invalid extension {extension:?}")]
    InvalidExtension {
        /// The rejected extension.
        extension: String,
    },
    /// The coordinate did not have exactly three `/`-separated segments.
    #[error("expected 3 segments, found {found}")]
    SegmentCount {
        /// Number of segments present.
        found: usize,
    },
    /// A segment was empty, signed, non-numeric or overflowed.
    #[error("{segment} segment {value:?} is not an unsigned integer")]
    InvalidSegment {
        /// Which segment failed.
        segment: &'static str,
        /// The raw segment text.
        value: String,
    },
    /// The zoom exceeds [`MAX_ZOOM`].
    #[error("zoom {zoom} exceeds maximum {max}", max = MAX_ZOOM)]
    ZoomOutOfRange {
        /// The rejected zoom.
        zoom: u8,
    },
    /// A column or row lies outside `[0, 2^zoom)`.
    #[error("{axis} {value} is outside the grid at zoom {zoom}")]
    IndexOutOfRange {
        /// `column` or `row`.
        axis: &'static str,
        /// The rejected index.
        value: u32,
        /// Zoom of the grid.
        zoom: u8,
    },
}

/// Inclusive zoom interval `[min, max]`.
///
/// # Examples
/// ```
/// use tilemirror_core::ZoomRange;
///
/// let range = ZoomRange::new(4, 16).expect("valid range");
/// assert!(range.contains(4));
/// assert!(!range.contains(17));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoomRange {
    min: u8,
    max: u8,
}

impl ZoomRange {
    /// Validate and construct a zoom range.
    pub const fn new(min: u8, max: u8) -> Result<Self, ZoomRangeError> {
        if min > max {
            return Err(ZoomRangeError::Inverted { min, max });
        }
        if max > MAX_ZOOM {
            return Err(ZoomRangeError::TooDeep { max });
        }
        Ok(Self { min, max })
    }

    /// Lowest zoom level included.
    #[must_use]
    pub const fn min(&self) -> u8 {
        self.min
    }

    /// Highest zoom level included.
    #[must_use]
    pub const fn max(&self) -> u8 {
        self.max
    }

    /// Whether `zoom` lies inside the range.
    #[must_use]
    pub const fn contains(&self, zoom: u8) -> bool {
        zoom >= self.min && zoom <= self.max
    }
}

/// Errors returned by [`ZoomRange::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ZoomRangeError {
    /// The minimum exceeds the maximum.
    #[error("minimum zoom {min} exceeds maximum zoom {max}")]
    Inverted {
        /// Requested minimum.
        min: u8,
        /// Requested maximum.
        max: u8,
    },
    /// The maximum exceeds [`MAX_ZOOM`].
    #[error("maximum zoom {max} exceeds {limit}", limit = MAX_ZOOM)]
    TooDeep {
        /// Requested maximum.
        max: u8,
    },
}
