//! CleanJoy CLI - Tools for exercising the checkout.
//!
//! # Usage
//!
//! ```bash
//! # List bookable services and their time slots
//! cj-cli services
//!
//! # Run a checkout scenario and print every transition
//! cj-cli simulate scenarios/guest-checkout.yaml
//! ```
//!
//! # Commands
//!
//! - `services` - List the service registry
//! - `simulate` - Run a YAML checkout scenario against in-memory collaborators
//!
//! Set `STRIPE_SECRET_KEY` to charge through Stripe test mode instead of the
//! sandbox gateway (scenarios with a `gateway` section always use the sandbox).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "cj-cli")]
#[command(author, version, about = "CleanJoy checkout CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List bookable services
    Services,
    /// Run a checkout scenario
    Simulate {
        /// Path to the scenario YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env before the filter reads RUST_LOG
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cleanjoy_checkout=info,cj_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Services => commands::services::list(),
        Commands::Simulate { file } => commands::simulate::run(&file).await?,
    }
    Ok(())
}
