//! Sync command implementation for the tilemirror CLI.

use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tilemirror_core::{Tileset, lookup_tileset};
use tilemirror_data::source::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use tilemirror_data::sync::{SyncOptions, SyncOutcome};
use tilemirror_data::{HttpTileSource, TileSource, TileStore, synchronise};

use crate::fs::ensure_parent_dir;
use crate::{
    ARG_ENDPOINT, ARG_OUTPUT, ARG_TILESET, ARG_USER_AGENT, CliError, DEFAULT_OUTPUT, ENV_TILESET,
};

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "sync",
    long_about = "Download a tileset's manifest and bring the MBTiles file up \
                 to date. Only tiles whose content changed since the last run \
                 are downloaded; running again after a failure resumes.",
    about = "Mirror a tileset into an MBTiles file"
)]
#[ortho_config(prefix = "TILEMIRROR")]
pub(crate) struct SyncArgs {
    /// Tileset id, as printed by `tilemirror list`.
    #[arg(value_name = "tileset-id")]
    #[serde(default)]
    pub(crate) tileset: Option<String>,
    /// Output MBTiles file.
    #[arg(short = 'o', long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Base URL of the tile service.
    #[arg(long = ARG_ENDPOINT, value_name = "url")]
    #[serde(default)]
    pub(crate) endpoint: Option<String>,
    /// User agent sent with every request.
    #[arg(long = ARG_USER_AGENT, value_name = "string")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
}

impl SyncArgs {
    pub(crate) fn into_config(self) -> Result<SyncConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncConfig::try_from(merged)
    }
}

/// Resolved `sync` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct SyncConfig {
    /// Registered tileset to mirror.
    pub(crate) tileset: Tileset,
    /// Output MBTiles file.
    pub(crate) output: Utf8PathBuf,
    /// Base URL of the tile service.
    pub(crate) endpoint: String,
    /// User agent sent with every request.
    pub(crate) user_agent: String,
}

impl TryFrom<SyncArgs> for SyncConfig {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        let id = args.tileset.ok_or(CliError::MissingArgument {
            field: ARG_TILESET,
            env: ENV_TILESET,
        })?;
        let tileset = lookup_tileset(&id).ok_or(CliError::UnknownTileset { id })?;
        Ok(Self {
            tileset,
            output: args
                .output
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT)),
            endpoint: args
                .endpoint
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            user_agent: args
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
        })
    }
}

pub(crate) fn run_sync(args: SyncArgs) -> Result<SyncOutcome, CliError> {
    let config = args.into_config()?;
    let source = HttpTileSource::new(config.endpoint.clone())
        .map_err(|source| CliError::BuildSource {
            endpoint: config.endpoint.clone(),
            source,
        })?
        .with_user_agent(config.user_agent.clone());
    sync_with(&source, &config)
}

/// Run one synchronisation of `config` against `source`.
pub(crate) fn sync_with<S>(source: &S, config: &SyncConfig) -> Result<SyncOutcome, CliError>
where
    S: TileSource + ?Sized,
{
    ensure_parent_dir(&config.output).map_err(|source| CliError::CreateOutputDir {
        path: config.output.clone(),
        source,
    })?;
    let store = TileStore::open(&config.output)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    info!(
        "syncing {} into {} from {}",
        config.tileset.id(),
        config.output,
        source.base_url()
    );
    let outcome = runtime.block_on(synchronise(
        source,
        store,
        &config.tileset,
        SyncOptions::default(),
    ))?;
    match &outcome {
        SyncOutcome::UpToDate { last_modified } => {
            info!("already up to date with the manifest of {last_modified}");
        }
        SyncOutcome::Updated(report) => info!(
            "updated to {}: {} tiles ({} unique), {} downloaded, {} removed",
            report.last_modified,
            report.catalog_size,
            report.unique,
            report.inserted,
            report.blobs_deleted
        ),
    }
    Ok(outcome)
}
