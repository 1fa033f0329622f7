//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use tilemirror_cli::CliError;

#[expect(clippy::print_stderr, reason = "fatal errors are reported to the operator")]
fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let Err(err) = tilemirror_cli::run() else {
        return ExitCode::SUCCESS;
    };
    match &err {
        // clap renders usage, help and version text itself.
        CliError::ArgumentParsing(parse) => {
            if let Err(print_err) = parse.print() {
                eprintln!("tilemirror: failed to print usage: {print_err}");
            }
        }
        other => eprintln!("tilemirror: {other}"),
    }
    ExitCode::from(err.exit_code())
}
