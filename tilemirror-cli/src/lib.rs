//! Command-line interface for mirroring GSI tilesets into MBTiles files.
#![forbid(unsafe_code)]

use std::io::{self, Write};

use clap::{Parser, Subcommand};
use tilemirror_core::{Tileset, known_tilesets};

mod error;
mod fs;
mod sync;

pub use error::CliError;

use sync::{SyncArgs, run_sync};

const ARG_TILESET: &str = "tileset";
const ARG_OUTPUT: &str = "output";
const ARG_ENDPOINT: &str = "endpoint";
const ARG_USER_AGENT: &str = "user-agent";
const ENV_TILESET: &str = "TILEMIRROR_CMDS_SYNC_TILESET";
const DEFAULT_OUTPUT: &str = "./out.mbtiles";

/// Run the tilemirror CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Sync(args) => run_sync(args).map(|_| ()),
        Command::List => {
            let mut stdout = io::stdout().lock();
            write_tilesets(&mut stdout, &known_tilesets())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "tilemirror",
    about = "Mirror GSI map tiles into a local MBTiles file",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download or refresh a tileset in an MBTiles file.
    Sync(SyncArgs),
    /// List the tilesets that can be mirrored.
    List,
}

fn write_tilesets(writer: &mut dyn Write, tilesets: &[Tileset]) -> Result<(), CliError> {
    for tileset in tilesets {
        let zoom = tileset.zoom();
        writeln!(
            writer,
            "{}\t{}\tz{}-{}\t{}",
            tileset.id(),
            tileset.kind().as_str(),
            zoom.min(),
            zoom.max(),
            tileset.name()
        )
        .map_err(CliError::WriteOutput)?;
    }
    writer.flush().map_err(CliError::WriteOutput)
}

#[cfg(test)]
mod tests;
