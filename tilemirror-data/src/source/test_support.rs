//! Test utilities for tile sources.
//!
//! [`StubTileSource`] serves a manifest and tiles from memory and records
//! every tile request so tests can assert on network traffic.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    future::Future,
    io::{self, Cursor, Read, Write},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::{Compression, write::GzEncoder};

use super::{BaseUrl, ManifestResponse, TileSource, TransportError};

/// In-memory [`TileSource`].
///
/// Interior mutability lets a scenario publish a new manifest between runs
/// while the synchroniser holds a shared reference.
#[derive(Debug)]
pub struct StubTileSource {
    base_url: BaseUrl,
    manifest: RefCell<Vec<u8>>,
    manifest_break: Cell<Option<io::ErrorKind>>,
    last_modified: Cell<Option<DateTime<Utc>>>,
    tiles: RefCell<HashMap<String, Vec<u8>>>,
    failures: RefCell<HashMap<String, u16>>,
    fetched: RefCell<Vec<String>>,
    manifest_requests: Cell<usize>,
}

impl StubTileSource {
    /// Construct a stub with an empty manifest at `https://example.org`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: BaseUrl::from("https://example.org"),
            manifest: RefCell::new(Vec::new()),
            manifest_break: Cell::new(None),
            last_modified: Cell::new(None),
            tiles: RefCell::new(HashMap::new()),
            failures: RefCell::new(HashMap::new()),
            fetched: RefCell::new(Vec::new()),
            manifest_requests: Cell::new(0),
        }
    }

    /// Publish a gzip manifest body and its `Last-Modified` value.
    pub fn publish_manifest(&self, gzip_body: Vec<u8>, last_modified: Option<DateTime<Utc>>) {
        *self.manifest.borrow_mut() = gzip_body;
        self.manifest_break.set(None);
        self.last_modified.set(last_modified);
    }

    /// Serve `partial_body`, then fail the next read with `kind`.
    ///
    /// Models a connection that drops while the manifest is streaming.
    pub fn publish_interrupted_manifest(
        &self,
        partial_body: Vec<u8>,
        kind: io::ErrorKind,
        last_modified: Option<DateTime<Utc>>,
    ) {
        self.publish_manifest(partial_body, last_modified);
        self.manifest_break.set(Some(kind));
    }

    /// Serve `body` for `path`, regardless of the source id requested.
    pub fn insert_tile(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.tiles.borrow_mut().insert(path.to_owned(), body.into());
    }

    /// Answer requests for `path` with HTTP `status`.
    pub fn fail_tile(&self, path: &str, status: u16) {
        self.failures.borrow_mut().insert(path.to_owned(), status);
    }

    /// Paths requested so far, in request order.
    #[must_use]
    pub fn fetched_paths(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    /// Number of tile requests issued so far.
    #[must_use]
    pub fn tile_fetches(&self) -> usize {
        self.fetched.borrow().len()
    }

    /// Number of manifest requests issued so far.
    #[must_use]
    pub fn manifest_requests(&self) -> usize {
        self.manifest_requests.get()
    }

    /// Forget recorded tile requests.
    pub fn reset_fetches(&self) {
        self.fetched.borrow_mut().clear();
    }
}

impl Default for StubTileSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl TileSource for StubTileSource {
    fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    async fn fetch_manifest(&self, manifest_id: &str) -> Result<ManifestResponse, TransportError> {
        self.manifest_requests.set(self.manifest_requests.get() + 1);
        let bytes = Cursor::new(self.manifest.borrow().clone());
        let body: Box<dyn Read + Send> = match self.manifest_break.get() {
            Some(kind) => Box::new(bytes.chain(FailingReader(kind))),
            None => Box::new(bytes),
        };
        Ok(ManifestResponse {
            url: self.base_url.manifest_url(manifest_id),
            last_modified: self.last_modified.get(),
            body,
        })
    }

    async fn fetch_tile(&self, source_id: &str, path: &str) -> Result<Vec<u8>, TransportError> {
        self.fetched.borrow_mut().push(path.to_owned());
        let url = self.base_url.tile_url(source_id, path);
        if let Some(status) = self.failures.borrow().get(path) {
            return Err(TransportError::Http {
                url,
                status: *status,
                message: "stubbed failure".to_owned(),
            });
        }
        self.tiles
            .borrow()
            .get(path)
            .cloned()
            .ok_or(TransportError::Http {
                url,
                status: 404,
                message: "not found".to_owned(),
            })
    }
}

/// Reader whose every read fails with the wrapped error kind.
#[derive(Debug, Clone, Copy)]
pub struct FailingReader(pub io::ErrorKind);

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(self.0, "stubbed transport failure"))
    }
}

/// One manifest line: `path,modified,size,digest`.
#[must_use]
pub fn manifest_line(path: &str, modified: i64, size: u64, digest: &str) -> String {
    format!("{path},{modified},{size},{digest}")
}

/// Gzip-compress manifest lines, one per row.
///
/// # Errors
/// Propagates compression failures, which do not occur for in-memory sinks.
pub fn gzip_manifest<I, S>(lines: I) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for line in lines {
        encoder.write_all(line.as_ref().as_bytes())?;
        encoder.write_all(b"\n")?;
    }
    encoder.finish()
}

/// Drive `future` to completion on a fresh current-thread runtime.
///
/// # Panics
/// Panics when the runtime cannot be created.
pub fn block_on_for_tests<F: Future>(future: F) -> F::Output {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(future),
        Err(err) => panic!("failed to build test runtime: {err}"),
    }
}
