//! # seedgraph - Entity Seeder
//!
//! The main binary for the seedgraph reference-resolving seeder.
//!
//! ## Usage
//!
//! ```bash
//! # Check documents without touching the database
//! seedgraph validate countries.yaml airports.yaml
//!
//! # Seed and commit
//! seedgraph seed countries.yaml airports.yaml --commit --by-class
//!
//! # Inspect
//! seedgraph classes
//! seedgraph list Airport --json-mode
//! ```

use clap::Parser;
use seedgraph::cli;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments first so that -v can raise the default log level.
    let cli = cli::Cli::parse();

    // SEEDGRAPH_LOG_FORMAT=json switches to machine-parseable logs.
    let log_format = std::env::var("SEEDGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_level = if cli.verbose {
        "seedgraph=debug,seedgraph_core=debug"
    } else {
        "seedgraph=info,seedgraph_core=info"
    };
    let filter = EnvFilter::try_from_env("SEEDGRAPH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| default_level.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
