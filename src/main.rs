//! Warden sidecar - main entry point.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use warden::config::WardenConfig;

/// Warden - per-node sidecar for a consistent-hash-sharded cache proxy.
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "WARDEN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sidecar
    Run {
        /// Configuration file
        #[arg(short, long, env = "WARDEN_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Validate a configuration file and exit
    CheckConfig {
        /// Configuration file
        config: PathBuf,
    },

    /// Compute the ring token for a slot
    Token {
        /// Slot index
        #[arg(long)]
        slot: i64,

        /// Ring size
        #[arg(long)]
        ring_size: i64,

        /// Rack name
        #[arg(long)]
        rack: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    match cli.command {
        Commands::Run { config } => {
            let config = match config {
                Some(path) => WardenConfig::from_file(&path)?,
                None => WardenConfig::development(),
            };
            warden::run(config).await?;
        }

        Commands::CheckConfig { config } => {
            WardenConfig::from_file(&config)?;
            println!("{} is valid", config.display());
        }

        Commands::Token { slot, ring_size, rack } => {
            let token = warden::token::create_token(slot, ring_size, &rack)?;
            println!("{}", token);
        }
    }

    Ok(())
}
