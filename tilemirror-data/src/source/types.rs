//! Endpoint wrappers and manifest responses.

use std::{fmt, io::Read, ops::Deref};

use chrono::{DateTime, Utc};
use url::Url;

/// Host serving the GSI `xyz` tile tree.
pub const DEFAULT_BASE_URL: &str = "https://cyberjapandata.gsi.go.jp";

/// Base URL of a tile service, without a trailing slash.
///
/// # Examples
/// ```
/// # use tilemirror_data::source::BaseUrl;
/// let url = BaseUrl::new("https://example.org");
/// assert_eq!(url.manifest_url("relief"), "https://example.org/xyz/relief/mokuroku.csv.gz");
/// assert_eq!(url.tile_url("relief", "5/28/12.png"), "https://example.org/xyz/relief/5/28/12.png");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    /// Construct a new [`BaseUrl`] from an owned or borrowed string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Location of the gzip manifest for `manifest_id`.
    #[must_use]
    pub fn manifest_url(&self, manifest_id: &str) -> String {
        format!("{}/xyz/{manifest_id}/mokuroku.csv.gz", self.0)
    }

    /// Location of one tile of `source_id`.
    #[must_use]
    pub fn tile_url(&self, source_id: &str, path: &str) -> String {
        format!("{}/xyz/{source_id}/{path}", self.0)
    }

    /// Consume the wrapper and return the inner [`String`].
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl From<&str> for BaseUrl {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl TryFrom<Url> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(value: Url) -> Result<Self, Self::Error> {
        if value.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        Ok(Self(value.as_str().trim_end_matches('/').to_owned()))
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for BaseUrl {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Headers and body of a manifest download.
///
/// The body is a blocking reader over the still-compressed stream; it must be
/// consumed off the async executor. Dropping it without reading abandons the
/// transfer.
pub struct ManifestResponse {
    /// URL the manifest was fetched from.
    pub url: String,
    /// Parsed `Last-Modified` header, when present and well formed.
    pub last_modified: Option<DateTime<Utc>>,
    /// Gzip-compressed CSV body.
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for ManifestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestResponse")
            .field("url", &self.url)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}
