//! Registry of the tilesets the synchroniser knows how to mirror.

use std::error::Error as StdError;

use thiserror::Error;

use crate::coord::ZoomRange;
use crate::terrain::gsi_dem_to_terrain_rgb;

/// Post-processing applied to each fetched payload before it is stored.
///
/// Transforms must be pure: the stored blob is keyed by the digest of the
/// *source* payload, so the same input must always yield the same output.
pub type TileTransform = fn(&[u8]) -> Result<Vec<u8>, TransformError>;

/// Failure raised by a [`TileTransform`].
#[derive(Debug, Error)]
#[error("tile transform failed while {stage}")]
pub struct TransformError {
    stage: &'static str,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl TransformError {
    /// Wrap `source` with the name of the step that failed.
    pub fn new(stage: &'static str, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    /// The step that failed, for example `decoding PNG`.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        self.stage
    }
}

/// Payload family published by a tileset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Mapbox vector tiles.
    Vector,
    /// Raster images.
    Raster,
}

impl ContentKind {
    /// Lower-case label used in listings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Raster => "raster",
        }
    }
}

/// A mirrored tileset: its identity, zoom range and where its data lives.
///
/// # Examples
/// ```
/// use tilemirror_core::lookup_tileset;
///
/// let dem = lookup_tileset("dem_terrain_rgb").expect("registered tileset");
/// assert_eq!(dem.source_id(), "dem_png");
/// assert_eq!(dem.manifest_id(), "dem_png");
/// assert!(dem.transform().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Tileset {
    id: String,
    name: String,
    zoom: ZoomRange,
    kind: ContentKind,
    source_id: Option<String>,
    manifest_id: Option<String>,
    transform: Option<TileTransform>,
}

impl Tileset {
    /// Describe a tileset whose tiles and manifest live under its own id.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        zoom: ZoomRange,
        kind: ContentKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            zoom,
            kind,
            source_id: None,
            manifest_id: None,
            transform: None,
        }
    }

    /// Fetch tiles from a different remote directory.
    #[must_use]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Fetch the manifest from a different remote directory.
    #[must_use]
    pub fn with_manifest_id(mut self, manifest_id: impl Into<String>) -> Self {
        self.manifest_id = Some(manifest_id.into());
        self
    }

    /// Post-process every fetched payload with `transform`.
    #[must_use]
    pub fn with_transform(mut self, transform: TileTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Identity recorded in the output file.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zoom levels mirrored.
    #[must_use]
    pub const fn zoom(&self) -> ZoomRange {
        self.zoom
    }

    /// Payload family.
    #[must_use]
    pub const fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Remote directory holding the tiles; defaults to the id.
    #[must_use]
    pub fn source_id(&self) -> &str {
        self.source_id.as_deref().unwrap_or(&self.id)
    }

    /// Remote directory holding the manifest; defaults to [`Self::source_id`].
    #[must_use]
    pub fn manifest_id(&self) -> &str {
        self.manifest_id
            .as_deref()
            .unwrap_or_else(|| self.source_id())
    }

    /// Optional per-tile transform.
    #[must_use]
    pub const fn transform(&self) -> Option<TileTransform> {
        self.transform
    }
}

const fn zoom(min: u8, max: u8) -> ZoomRange {
    match ZoomRange::new(min, max) {
        Ok(range) => range,
        Err(_) => panic!("registry zoom ranges are validated at compile time"),
    }
}

const VECTOR_ZOOM: ZoomRange = zoom(4, 16);
const RELIEF_ZOOM: ZoomRange = zoom(5, 15);
const HILLSHADE_ZOOM: ZoomRange = zoom(2, 16);
const EARTH_HILLSHADE_ZOOM: ZoomRange = zoom(0, 8);
const KUCHINOERABU_ZOOM: ZoomRange = zoom(14, 18);
const DEM_ZOOM: ZoomRange = zoom(1, 14);

/// Every tileset shipped with the tool, in listing order.
#[must_use]
pub fn known_tilesets() -> Vec<Tileset> {
    vec![
        Tileset::new(
            "experimental_bvmap",
            "地理院地図Vector",
            VECTOR_ZOOM,
            ContentKind::Vector,
        ),
        Tileset::new("relief", "色別標高図", RELIEF_ZOOM, ContentKind::Raster),
        Tileset::new("hillshademap", "陰影起伏図", HILLSHADE_ZOOM, ContentKind::Raster),
        Tileset::new(
            "earthhillshade",
            "陰影起伏図（全球版）",
            EARTH_HILLSHADE_ZOOM,
            ContentKind::Raster,
        ),
        Tileset::new(
            "20150911dol",
            "口永良部島の火山活動 UAV撮影による正射画像（2015年9月8,11,12日撮影）",
            KUCHINOERABU_ZOOM,
            ContentKind::Raster,
        ),
        Tileset::new(
            "dem_terrain_rgb",
            "標高タイル（Terrain-RGB）",
            DEM_ZOOM,
            ContentKind::Raster,
        )
        .with_source_id("dem_png")
        .with_transform(gsi_dem_to_terrain_rgb),
    ]
}

/// Find a registered tileset by id.
#[must_use]
pub fn lookup_tileset(id: &str) -> Option<Tileset> {
    known_tilesets()
        .into_iter()
        .find(|tileset| tileset.id() == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("experimental_bvmap", 4, 16, ContentKind::Vector)]
    #[case("relief", 5, 15, ContentKind::Raster)]
    #[case("hillshademap", 2, 16, ContentKind::Raster)]
    #[case("earthhillshade", 0, 8, ContentKind::Raster)]
    #[case("20150911dol", 14, 18, ContentKind::Raster)]
    fn registers_plain_tilesets(
        #[case] id: &str,
        #[case] min: u8,
        #[case] max: u8,
        #[case] kind: ContentKind,
    ) {
        let tileset = lookup_tileset(id).expect("tileset should be registered");
        assert_eq!(tileset.zoom(), ZoomRange::new(min, max).expect("valid range"));
        assert_eq!(tileset.kind(), kind);
        assert_eq!(tileset.source_id(), id);
        assert_eq!(tileset.manifest_id(), id);
        assert!(tileset.transform().is_none());
    }

    #[rstest]
    fn unknown_ids_are_absent() {
        assert!(lookup_tileset("std").is_none());
    }

    #[rstest]
    fn manifest_alias_overrides_source() {
        let tileset = Tileset::new("mirror", "Mirror", zoom(0, 1), ContentKind::Raster)
            .with_source_id("tiles")
            .with_manifest_id("catalogue");
        assert_eq!(tileset.source_id(), "tiles");
        assert_eq!(tileset.manifest_id(), "catalogue");
    }

    #[rstest]
    fn registry_ids_are_unique() {
        let tilesets = known_tilesets();
        let mut ids: Vec<&str> = tilesets.iter().map(Tileset::id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), tilesets.len());
    }

    #[rstest]
    fn transform_errors_name_their_stage() {
        let err = TransformError::new("decoding PNG", "truncated stream");
        assert_eq!(err.stage(), "decoding PNG");
        assert_eq!(err.to_string(), "tile transform failed while decoding PNG");
    }
}
