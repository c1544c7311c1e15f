//! Cadenza CLI - Command-line interface for the cadenza synthesis engine.

mod commands;
mod performance;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadenza")]
#[command(author, version, about = "Cadenza synthesis engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project file without rendering it
    Check(commands::check::CheckArgs),

    /// Render a project and report level statistics
    Render(commands::render::RenderArgs),

    /// List the registered pluggable processors
    Processors(commands::processors::ProcessorsArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check(args) => commands::check::run(args),
        Commands::Render(args) => commands::render::run(args),
        Commands::Processors(args) => commands::processors::run(args),
    }
}
