//! simm: simulate raw data through a mediation library.
//!
//! # Usage
//!
//! ```text
//! simm run --config <file.json> [--access <id>] [--dbl-time <secs>] [--cleanup] [--json]
//! simm run --input <dir> --lib <name> --mask <glob> [...]
//! simm inspect --lib <name> [--json]
//! simm stop --lib <name>
//! simm cleanup --config <file.json> [--access <id>]
//! ```

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{cleanup::CleanupArgs, inspect::InspectArgs, run::RunArgs, stop::StopArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "simm",
    version,
    about = "Provision a simulation access, feed it raw data and wait for the load",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full simulation workflow.
    Run(RunArgs),

    /// Show what a library's connect and dbl files describe.
    Inspect(InspectArgs),

    /// Terminate a running engine instance.
    Stop(StopArgs),

    /// Delete rows seeded by a previous run.
    Cleanup(CleanupArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let run_log = logging::init_tracing();
    let result = match cli.command {
        Commands::Run(args) => args.run(&run_log),
        Commands::Inspect(args) => args.run(),
        Commands::Stop(args) => args.run(),
        Commands::Cleanup(args) => args.run(),
    };
    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "command failed");
    }
    result
}
