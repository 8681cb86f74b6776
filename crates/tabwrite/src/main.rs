//! tabwrite - Streaming-insert writer
//!
//! # Usage
//!
//! ```bash
//! # Write rows from a file, dead letters to another file
//! tabwrite run --config tabwrite.toml --input rows.jsonl --dead-letter failed.jsonl
//!
//! # Read rows from stdin until it closes or Ctrl+C
//! tabwrite run --config tabwrite.toml --input -
//!
//! # Validate a configuration without writing anything
//! tabwrite check --config tabwrite.toml
//! ```

mod cmd;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// tabwrite - Destination-routed, batched, retrying streaming-insert writer
#[derive(Parser, Debug)]
#[command(name = "tabwrite")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream rows through the writer against the in-memory backend
    Run(cmd::run::RunArgs),

    /// Validate a configuration file
    Check(cmd::check::CheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => cmd::run::run(args, cli.log_level.as_deref()).await,
        Command::Check(args) => cmd::check::run(args),
    }
}
