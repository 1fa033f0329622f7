//! Error types emitted by the tilemirror CLI.
//!
//! Keep this error type reasonably small, as most CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::{io, sync::Arc};

use camino::Utf8PathBuf;
use thiserror::Error;
use tilemirror_data::{StoreError, SyncError, TransportError};

/// Errors emitted by the tilemirror CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (pass it on the command line or set {env})")]
    MissingArgument {
        /// Name of the missing argument.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// The requested tileset is not in the registry.
    #[error("unknown tileset '{id}' (run `tilemirror list` for the known ids)")]
    UnknownTileset {
        /// Requested id.
        id: String,
    },
    /// The output directory could not be created.
    #[error("failed to create the directory for {path:?}: {source}")]
    CreateOutputDir {
        /// Output file whose parent was being created.
        path: Utf8PathBuf,
        /// I/O error reported by the filesystem.
        #[source]
        source: io::Error,
    },
    /// Opening the output store failed.
    #[error(transparent)]
    OpenStore(#[from] StoreError),
    /// Constructing the HTTP client failed.
    #[error("failed to build the tile source for {endpoint}: {source}")]
    BuildSource {
        /// Configured endpoint.
        endpoint: String,
        /// Client construction failure.
        #[source]
        source: TransportError,
    },
    /// The async runtime could not be started.
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] io::Error),
    /// The synchronisation run failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] io::Error),
}

impl CliError {
    /// Process exit status for this error.
    ///
    /// Help and version requests surface as parse errors but succeed; every
    /// other error exits with 1.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ArgumentParsing(err) if !err.use_stderr() => 0,
            _ => 1,
        }
    }
}
