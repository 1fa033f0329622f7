//! Shared helpers used by tile sources.

use std::io::{self, Read};

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use tokio_util::io::{StreamReader, SyncIoBridge};

use super::BaseUrl;

/// Trim trailing slashes and fall back to the GSI endpoint.
pub(crate) fn sanitise_base_url(url: impl Into<String>) -> BaseUrl {
    let raw = url.into();
    let trimmed = raw.trim_end_matches('/');
    if trimmed.is_empty() {
        BaseUrl::default()
    } else {
        BaseUrl::new(trimmed.to_owned())
    }
}

/// Parse an HTTP date (`Wed, 21 Oct 2015 07:28:00 GMT`).
pub(crate) fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

/// Convert an asynchronous HTTP response into a blocking reader.
///
/// Must be called from within a Tokio runtime; the returned reader must only
/// be read from a blocking thread.
pub(crate) fn to_sync_reader(response: reqwest::Response) -> Box<dyn Read + Send> {
    let stream = response.bytes_stream().map_err(io::Error::other);
    Box::new(SyncIoBridge::new(StreamReader::new(stream)))
}
