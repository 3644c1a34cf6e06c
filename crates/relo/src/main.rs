//! relo CLI - Live reloader for browser extensions.
//!
//! Provides commands for:
//! - `serve`: Start the reload server next to your extension build
//! - `agent`: Run a simulated extension agent against the server

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{AgentArgs, ServeArgs};
use output::Output;

/// relo - Live reloader for browser extensions.
#[derive(Parser)]
#[command(name = "relo", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the reload server.
    Serve(ServeArgs),
    /// Run a simulated extension agent.
    Agent(AgentArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // Check if verbose flag is set for the selected command
    let verbose = match &cli.command {
        Commands::Serve(args) => args.verbose,
        Commands::Agent(args) => args.verbose,
    };

    // Initialize tracing with appropriate log level
    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = match cli.command {
        Commands::Serve(args) => rt.block_on(args.execute()),
        Commands::Agent(args) => rt.block_on(args.execute()),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
