//! Manifest rows and the content digests that identify tile payloads.

use std::{fmt, ops::Deref, str::FromStr};

use thiserror::Error;

use crate::coord::{TilePath, TilePathError};

/// Hex-encoded content digest published by the catalogue (MD5 for GSI).
///
/// Digests key the blob table, so two tiles with the same digest share a
/// single stored payload. The digest is a deduplication key, not an
/// integrity check.
///
/// # Examples
/// ```
/// use tilemirror_core::ContentDigest;
///
/// let digest = ContentDigest::new("D41D8CD98F00B204E9800998ECF8427E").expect("hex digest");
/// assert_eq!(digest.as_str(), "d41d8cd98f00b204e9800998ecf8427e");
/// assert!(ContentDigest::new("not-hex").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Validate a hexadecimal digest, normalising it to lower case.
    pub fn new(value: impl Into<String>) -> Result<Self, DigestError> {
        let mut raw = value.into();
        if raw.is_empty() {
            return Err(DigestError::Empty);
        }
        if let Some(position) = raw.find(|ch: char| !ch.is_ascii_hexdigit()) {
            return Err(DigestError::NotHex { value: raw, position });
        }
        raw.make_ascii_lowercase();
        Ok(Self(raw))
    }

    /// Borrow the digest text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner [`String`].
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for ContentDigest {
    type Err = DigestError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::new(raw)
    }
}

impl AsRef<str> for ContentDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ContentDigest {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors returned by [`ContentDigest::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    /// The digest column was empty.
    #[error("content digest is empty")]
    Empty,
    /// A character outside `[0-9a-fA-F]` was found.
    #[error("content digest {value:?} has a non-hex character at byte {position}")]
    NotHex {
        /// The rejected digest.
        value: String,
        /// Byte offset of the first offending character.
        position: usize,
    },
}

/// One manifest row: where a tile lives, when it changed, how big it is and
/// what it contains.
///
/// The path stays in its raw form. It is decoded with the strict grammar
/// only when a reference is written, so a malformed path surfaces as a
/// parse failure at that point rather than while reading the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileDescriptor {
    /// Relative tile path, `{z}/{x}/{y}.{ext}`.
    pub path: String,
    /// Modification stamp published by the catalogue (epoch seconds).
    pub modified_stamp: i64,
    /// Payload size in bytes as published by the catalogue.
    pub byte_size: u64,
    /// Content digest of the payload.
    pub digest: ContentDigest,
}

impl TileDescriptor {
    /// Decode the raw path with the strict tile grammar.
    pub fn tile_path(&self) -> Result<TilePath, TilePathError> {
        self.path.parse()
    }

    /// Text after the final `.` of the path, if any.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.path
            .rsplit_once('.')
            .map(|(_, extension)| extension)
            .filter(|extension| !extension.is_empty() && !extension.contains('/'))
    }
}
