#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sideload")]
#[command(author, version, about = "Load npm packages on demand, installing missing ones via npx", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Make packages loadable, installing missing ones temporarily
    Ensure {
        /// Package specs (e.g., "left-pad", "chalk@^5.0.0", "@scope/pkg/file.js")
        #[arg(required = true)]
        packages: Vec<String>,

        /// Use the install fallback even when not launched by npx/bunx
        #[arg(long)]
        standalone: bool,
    },

    /// Parse a package spec and show how it would be handled
    Inspect {
        /// The spec to parse (e.g., "@scope/pkg@^1.0.0/dist/index.js")
        spec: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Commands::Ensure {
            packages,
            standalone,
        } => commands::ensure::run(&cwd, &packages, standalone, cli.json),
        Commands::Inspect { spec } => commands::inspect::run(&spec, cli.json),
    }
}
