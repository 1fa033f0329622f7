//! Download and decode the remote tile manifest (`mokuroku.csv.gz`).
//!
//! The manifest is a gzip-compressed CSV with one row per tile:
//! `path,modified,size,digest`. Rows are decoded lazily by [`ManifestRows`]
//! and filtered to the requested zoom range.

use std::io::{self, BufRead, BufReader, Read};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use log::{info, warn};
use thiserror::Error;
use tilemirror_core::{ContentDigest, TileDescriptor, TilePath, ZoomRange};
use tokio::task;

use crate::source::TileSource;
use crate::sync::SyncError;

/// Failure while decoding a manifest body.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A line could not be decoded as a manifest row.
    #[error("manifest line {line}: {reason}")]
    Malformed {
        /// One-based line number.
        line: u64,
        /// What was wrong with the line.
        reason: String,
    },
    /// The body stopped yielding bytes before it was complete.
    #[error("manifest body broke off at line {line}")]
    Interrupted {
        /// One-based line being read when the body failed.
        line: u64,
        /// Error reported by the underlying reader.
        #[source]
        source: io::Error,
    },
}

impl ManifestError {
    /// Line being decoded when the failure occurred.
    #[must_use]
    pub const fn line(&self) -> u64 {
        match self {
            Self::Malformed { line, .. } | Self::Interrupted { line, .. } => *line,
        }
    }
}

/// Whether a read error came from the payload rather than the transport.
///
/// Gzip decoding reports corrupt input as `InvalidInput` or `UnexpectedEof`;
/// `read_line` reports invalid UTF-8 as `InvalidData`.
fn is_decode_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof
    )
}

/// Pull-based decoder over a gzip manifest body.
///
/// Blank lines and rows outside the zoom range are skipped. The first error
/// ends the sequence.
///
/// # Examples
/// ```
/// use std::io::Write;
///
/// use flate2::{Compression, write::GzEncoder};
/// use tilemirror_core::ZoomRange;
/// use tilemirror_data::catalog::ManifestRows;
///
/// let mut gzip = GzEncoder::new(Vec::new(), Compression::default());
/// gzip.write_all(b"3/1/2.png,100,20,aa\n9/1/2.png,100,20,bb\n").expect("compress");
/// let body = gzip.finish().expect("finish gzip");
///
/// let zoom = ZoomRange::new(0, 8).expect("valid range");
/// let rows: Vec<_> = ManifestRows::new(body.as_slice(), zoom)
///     .collect::<Result<_, _>>()
///     .expect("manifest decodes");
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].path, "3/1/2.png");
/// ```
pub struct ManifestRows<R: Read> {
    reader: BufReader<GzDecoder<R>>,
    zoom: ZoomRange,
    line: u64,
    buffer: String,
    finished: bool,
}

impl<R: Read> ManifestRows<R> {
    /// Decode `body`, keeping rows whose leading zoom lies in `zoom`.
    pub fn new(body: R, zoom: ZoomRange) -> Self {
        Self {
            reader: BufReader::new(GzDecoder::new(body)),
            zoom,
            line: 0,
            buffer: String::new(),
            finished: false,
        }
    }

    fn fail(&mut self, reason: impl Into<String>) -> Option<Result<TileDescriptor, ManifestError>> {
        self.finished = true;
        Some(Err(ManifestError::Malformed {
            line: self.line,
            reason: reason.into(),
        }))
    }

    fn read_failed(&mut self, source: io::Error) -> Option<Result<TileDescriptor, ManifestError>> {
        if is_decode_error(&source) {
            return self.fail(source.to_string());
        }
        self.finished = true;
        Some(Err(ManifestError::Interrupted {
            line: self.line,
            source,
        }))
    }
}

impl<R: Read> Iterator for ManifestRows<R> {
    type Item = Result<TileDescriptor, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.buffer.clear();
            self.line += 1;
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => self.finished = true,
                Ok(_) => {
                    let row = self.buffer.trim_end_matches(['\r', '\n']);
                    if row.trim().is_empty() {
                        continue;
                    }
                    let descriptor = match parse_row(row) {
                        Ok(descriptor) => descriptor,
                        Err(reason) => return self.fail(reason),
                    };
                    match TilePath::leading_zoom(&descriptor.path) {
                        Ok(zoom) if self.zoom.contains(zoom) => return Some(Ok(descriptor)),
                        Ok(_) => {}
                        Err(err) => return self.fail(err.to_string()),
                    }
                }
                Err(err) => return self.read_failed(err),
            }
        }
        None
    }
}

fn parse_row(row: &str) -> Result<TileDescriptor, String> {
    let fields: Vec<&str> = row.split(',').collect();
    let [path, modified, size, digest] = fields.as_slice() else {
        return Err(format!("expected 4 fields, found {}", fields.len()));
    };
    if path.is_empty() {
        return Err("empty tile path".to_owned());
    }
    let modified_stamp = modified
        .trim()
        .parse::<i64>()
        .map_err(|err| format!("modified stamp {modified:?}: {err}"))?;
    let byte_size = size
        .trim()
        .parse::<u64>()
        .map_err(|err| format!("byte size {size:?}: {err}"))?;
    let digest = ContentDigest::new(digest.trim()).map_err(|err| err.to_string())?;
    Ok(TileDescriptor {
        path: (*path).to_owned(),
        modified_stamp,
        byte_size,
        digest,
    })
}

/// What to fetch and what the store already holds.
#[derive(Debug, Clone, Copy)]
pub struct CatalogRequest<'a> {
    /// Remote directory holding `mokuroku.csv.gz`.
    pub manifest_id: &'a str,
    /// Zoom levels to keep.
    pub zoom: ZoomRange,
    /// Manifest time recorded by the previous successful run.
    pub checkpoint: Option<DateTime<Utc>>,
}

/// Decoded manifest rows, in manifest order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Every row within the zoom range, duplicates included.
    pub descriptors: Vec<TileDescriptor>,
    /// Modification time of the manifest.
    pub last_modified: DateTime<Utc>,
}

/// Outcome of comparing the remote manifest with the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogVerdict {
    /// The manifest is not newer than the checkpoint; its body was not read.
    UpToDate {
        /// Modification time reported by the server.
        last_modified: DateTime<Utc>,
    },
    /// The manifest changed and has been decoded.
    Stale(Catalog),
}

/// Fetch the manifest and decide whether the store needs updating.
///
/// A response without a usable `Last-Modified` header is treated as modified
/// now, so it is always considered newer than the checkpoint.
///
/// # Errors
/// Returns [`SyncError::Network`] or [`SyncError::Fetch`] when the request
/// fails or the body breaks off, and [`SyncError::Format`] when the body
/// cannot be decoded.
pub async fn fetch_catalog<S>(
    source: &S,
    request: &CatalogRequest<'_>,
) -> Result<CatalogVerdict, SyncError>
where
    S: TileSource + ?Sized,
{
    let response = source.fetch_manifest(request.manifest_id).await?;
    let last_modified = response.last_modified.unwrap_or_else(|| {
        warn!("manifest {} has no Last-Modified header; assuming now", response.url);
        Utc::now()
    });

    if let Some(checkpoint) = request.checkpoint
        && last_modified <= checkpoint
    {
        return Ok(CatalogVerdict::UpToDate { last_modified });
    }

    let zoom = request.zoom;
    let body = response.body;
    // The body is a blocking bridge over the HTTP stream.
    let descriptors = task::spawn_blocking(move || {
        ManifestRows::new(body, zoom).collect::<Result<Vec<_>, _>>()
    })
    .await?
    .map_err(|err| SyncError::from_manifest(err, &response.url))?;
    info!(
        "manifest {} lists {} tiles in zoom {}..={}",
        response.url,
        descriptors.len(),
        zoom.min(),
        zoom.max()
    );

    Ok(CatalogVerdict::Stale(Catalog {
        descriptors,
        last_modified,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support::{
        FailingReader, StubTileSource, block_on_for_tests, gzip_manifest, manifest_line,
    };
    use chrono::TimeZone;
    use flate2::{Compression, write::GzEncoder};
    use rstest::{fixture, rstest};
    use std::io::{Cursor, Write};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).single().expect("valid timestamp")
    }

    fn decode(lines: &[&str], zoom: ZoomRange) -> Result<Vec<TileDescriptor>, ManifestError> {
        let body = gzip_manifest(lines).expect("gzip manifest");
        ManifestRows::new(body.as_slice(), zoom).collect()
    }

    /// First half of a gzip manifest large enough to span many reads.
    fn truncated_manifest() -> Vec<u8> {
        let lines = (0..5_000_u32).map(|index| {
            manifest_line(&format!("4/{index}/6.pbf"), 100, 10, &format!("{index:08x}"))
        });
        let mut body = gzip_manifest(lines).expect("gzip manifest");
        body.truncate(body.len() / 2);
        body
    }

    #[fixture]
    fn zoom() -> ZoomRange {
        ZoomRange::new(4, 16).expect("valid range")
    }

    #[fixture]
    fn stub() -> StubTileSource {
        let stub = StubTileSource::new();
        let body = gzip_manifest([
            manifest_line("4/13/6.pbf", 100, 10, "aa"),
            manifest_line("3/6/3.pbf", 100, 10, "bb"),
            manifest_line("5/27/12.pbf", 101, 11, "cc"),
        ])
        .expect("gzip manifest");
        stub.publish_manifest(body, Some(at(2_000)));
        stub
    }

    #[rstest]
    fn filters_rows_by_zoom(zoom: ZoomRange) {
        let rows = decode(
            &["3/1/1.pbf,1,2,aa", "4/1/1.pbf,1,2,bb", "17/1/1.pbf,1,2,cc", "16/1/1.pbf,1,2,dd"],
            zoom,
        )
        .expect("manifest should decode");
        let paths: Vec<&str> = rows.iter().map(|row| row.path.as_str()).collect();
        assert_eq!(paths, ["4/1/1.pbf", "16/1/1.pbf"]);
    }

    #[rstest]
    fn skips_blank_lines_and_carriage_returns(zoom: ZoomRange) {
        let rows = decode(&["", "4/1/1.pbf,7,2,AB\r", "   "], zoom).expect("manifest decodes");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].modified_stamp, 7);
        assert_eq!(rows[0].digest.as_str(), "ab");
    }

    #[rstest]
    #[case(&["4/1/1.pbf,1,2"], 1, "expected 4 fields, found 3")]
    #[case(&["4/1/1.pbf,1,2,aa", "4/1/2.pbf,x,2,aa"], 2, "modified stamp")]
    #[case(&["4/1/1.pbf,1,-2,aa"], 1, "byte size")]
    #[case(&["4/1/1.pbf,1,2,zz"], 1, "non-hex")]
    #[case(&["", ",1,2,aa"], 2, "empty tile path")]
    #[case(&["z/1/1.pbf,1,2,aa"], 1, "zoom segment")]
    fn reports_malformed_rows(
        #[case] lines: &[&str],
        #[case] line: u64,
        #[case] reason: &str,
        zoom: ZoomRange,
    ) {
        match decode(lines, zoom).expect_err("row should be rejected") {
            ManifestError::Malformed { line: at_line, reason: message } => {
                assert_eq!(at_line, line);
                assert!(message.contains(reason), "unexpected reason {message:?}");
            }
            other => panic!("expected a malformed row, got {other:?}"),
        }
    }

    #[rstest]
    fn rejects_corrupt_gzip(zoom: ZoomRange) {
        let result: Result<Vec<_>, _> =
            ManifestRows::new(b"plain text".as_slice(), zoom).collect();
        let err = result.expect_err("non-gzip body should fail");
        assert!(matches!(err, ManifestError::Malformed { line: 1, .. }), "got {err:?}");
    }

    #[rstest]
    fn rejects_invalid_utf8(zoom: ZoomRange) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"4/1/1.pbf,1,2,aa\n4/\xff/1.pbf,1,2,aa\n").expect("compress");
        let body = encoder.finish().expect("finish gzip");
        let result: Result<Vec<_>, _> = ManifestRows::new(body.as_slice(), zoom).collect();
        let err = result.expect_err("invalid UTF-8 should fail");
        assert!(matches!(err, ManifestError::Malformed { line: 2, .. }), "got {err:?}");
    }

    #[rstest]
    fn reports_body_that_breaks_off(zoom: ZoomRange) {
        let body = Cursor::new(truncated_manifest())
            .chain(FailingReader(io::ErrorKind::ConnectionReset));
        let result: Result<Vec<_>, _> = ManifestRows::new(body, zoom).collect();
        let err = result.expect_err("broken body should fail");
        assert!(err.line() > 1, "rows before the break should decode");
        assert!(
            matches!(
                &err,
                ManifestError::Interrupted { source, .. }
                    if source.kind() == io::ErrorKind::ConnectionReset
            ),
            "got {err:?}"
        );
    }

    #[rstest]
    fn decodes_stale_manifest(stub: StubTileSource, zoom: ZoomRange) {
        let request = CatalogRequest {
            manifest_id: "experimental_bvmap",
            zoom,
            checkpoint: Some(at(1_999)),
        };
        let verdict = block_on_for_tests(fetch_catalog(&stub, &request)).expect("fetch succeeds");
        let catalog = match verdict {
            CatalogVerdict::Stale(catalog) => catalog,
            other => panic!("expected a stale verdict, got {other:?}"),
        };
        assert_eq!(catalog.last_modified, at(2_000));
        let paths: Vec<&str> = catalog.descriptors.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, ["4/13/6.pbf", "5/27/12.pbf"]);
    }

    #[rstest]
    #[case(2_000)]
    #[case(2_500)]
    fn reports_up_to_date_when_not_newer(
        stub: StubTileSource,
        zoom: ZoomRange,
        #[case] checkpoint: i64,
    ) {
        let request = CatalogRequest {
            manifest_id: "experimental_bvmap",
            zoom,
            checkpoint: Some(at(checkpoint)),
        };
        let verdict = block_on_for_tests(fetch_catalog(&stub, &request)).expect("fetch succeeds");
        assert_eq!(verdict, CatalogVerdict::UpToDate { last_modified: at(2_000) });
    }

    #[rstest]
    fn missing_header_counts_as_modified_now(stub: StubTileSource, zoom: ZoomRange) {
        let body = gzip_manifest([manifest_line("4/13/6.pbf", 100, 10, "aa")]).expect("gzip");
        stub.publish_manifest(body, None);
        let request = CatalogRequest {
            manifest_id: "experimental_bvmap",
            zoom,
            checkpoint: Some(at(2_000)),
        };
        let verdict = block_on_for_tests(fetch_catalog(&stub, &request)).expect("fetch succeeds");
        assert!(matches!(verdict, CatalogVerdict::Stale(_)));
    }

    #[rstest]
    fn surfaces_format_errors(stub: StubTileSource, zoom: ZoomRange) {
        stub.publish_manifest(b"not gzip".to_vec(), Some(at(3_000)));
        let request = CatalogRequest {
            manifest_id: "experimental_bvmap",
            zoom,
            checkpoint: None,
        };
        let err = block_on_for_tests(fetch_catalog(&stub, &request)).expect_err("should fail");
        assert!(matches!(err, SyncError::Format { line: 1, .. }), "got {err:?}");
    }

    #[rstest]
    fn dropped_connection_is_a_network_error(stub: StubTileSource, zoom: ZoomRange) {
        stub.publish_interrupted_manifest(
            truncated_manifest(),
            io::ErrorKind::ConnectionReset,
            Some(at(3_000)),
        );
        let request = CatalogRequest {
            manifest_id: "experimental_bvmap",
            zoom,
            checkpoint: None,
        };
        let err = block_on_for_tests(fetch_catalog(&stub, &request)).expect_err("should fail");
        match err {
            SyncError::Network { url, source } => {
                assert_eq!(url, "https://example.org/xyz/experimental_bvmap/mokuroku.csv.gz");
                assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
            }
            other => panic!("expected a network error, got {other:?}"),
        }
    }
}
