//! Errors surfaced by a synchronisation run.

use std::io;

use thiserror::Error;
use tilemirror_core::{TilePathError, TransformError};
use tokio::task::JoinError;

use crate::catalog::ManifestError;
use crate::source::TransportError;
use crate::store::StoreError;

/// Failure of any phase of a run. Every phase fails fast; work committed
/// before the failure stays in the store.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The store is bound to a different tileset.
    #[error("store belongs to tileset '{stored}', refusing to write '{requested}'")]
    IdentityConflict {
        /// Identity recorded in the store.
        stored: String,
        /// Tileset requested by the caller.
        requested: String,
    },
    /// The store holds references but no identity marker.
    #[error("store holds {references} tile references but no tileset identity")]
    AmbiguousExistingData {
        /// Number of references found.
        references: u64,
    },
    /// The connection failed or broke off while reading a body.
    #[error("network error contacting {url}")]
    Network {
        /// Request URL.
        url: String,
        /// I/O error reported by the transport.
        #[source]
        source: io::Error,
    },
    /// The server answered with a non-success status.
    #[error("request to {url} failed with status {status}: {message}")]
    Fetch {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Server or client description of the failure.
        message: String,
    },
    /// The manifest could not be decoded.
    #[error("malformed manifest at line {line}: {reason}")]
    Format {
        /// One-based manifest line.
        line: u64,
        /// What was wrong with it.
        reason: String,
    },
    /// A manifest row carried a malformed tile path.
    #[error(transparent)]
    Parse {
        /// Grammar violation.
        #[from]
        source: TilePathError,
    },
    /// The tileset transform rejected a payload.
    #[error("failed to transform tile {path}")]
    Transform {
        /// Path of the tile being transformed.
        path: String,
        /// Decoder or encoder failure.
        #[source]
        source: TransformError,
    },
    /// The store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A blocking worker panicked or was cancelled.
    #[error("background worker failed")]
    Worker(#[from] JoinError),
}

impl From<TransportError> for SyncError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Http {
                url,
                status,
                message,
            } => Self::Fetch {
                url,
                status,
                message,
            },
            TransportError::Network { url, source } => Self::Network { url, source },
            TransportError::Client { source } => Self::Network {
                url: String::from("<client>"),
                source: io::Error::other(source),
            },
        }
    }
}

impl SyncError {
    /// Classify a manifest failure for the manifest fetched from `url`.
    ///
    /// A body that broke off is a network failure; anything else is a
    /// format failure.
    #[must_use]
    pub fn from_manifest(error: ManifestError, url: &str) -> Self {
        match error {
            ManifestError::Malformed { line, reason } => Self::Format { line, reason },
            ManifestError::Interrupted { source, .. } => Self::Network {
                url: url.to_owned(),
                source,
            },
        }
    }
}
