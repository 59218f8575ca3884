//! Blogsuite CLI - Main Entry Point
//!
//! Inspects and maintains the persistent fixture cache shared by test runs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use blogsuite_common::SuiteConfig;
use commands::cache;

/// Blogsuite CLI - fixture cache maintenance for the blog UI test suite
#[derive(Parser)]
#[command(name = "blogsuite")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Suite configuration file
    #[arg(long, global = true, default_value_os_t = blogsuite_common::default_config_path())]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and maintain the fixture cache
    #[command(subcommand)]
    Cache(cache::CacheCommands),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Cache(cmd) => {
            let config = SuiteConfig::from_env(&cli.config)?;
            let ok = cache::execute(cmd, &config, cli.format)?;
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("blogsuite v{}", blogsuite_common::VERSION);
        }
    }

    Ok(())
}
