//! # seedgraph CLI Module
//!
//! This module implements the CLI interface for seedgraph.
//!
//! ## Available Commands
//!
//! - `seed` - Seed documents into the database
//! - `validate` - Check documents without building anything
//! - `classes` - List registered classes
//! - `list` - List stored entities of a class
//! - `init` - Initialize new database

mod commands;

use crate::config::{DEFAULT_CONFIG_FILE, SeedgraphConfig};
use clap::{Parser, Subcommand};
use seedgraph_core::SeedError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// seedgraph - reference-resolving entity seeder
///
/// Builds entity graphs from JSON or YAML seed documents and stores them
/// in a redb database.
#[derive(Parser, Debug)]
#[command(name = "seedgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only errors and machine output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(short = 'c', long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Path to the entity database (overrides `[store] path`)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Seed documents into the database, one run per file
    Seed {
        /// Seed files (.json, .yaml, .yml), seeded in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Commit the seeded entities (otherwise the run is rolled back)
        #[arg(long)]
        commit: bool,

        /// Do not flush the store after each entity
        #[arg(long)]
        no_flush: bool,

        /// Report entity counts per class
        #[arg(long)]
        by_class: bool,
    },

    /// Validate document shape without building entities
    Validate {
        /// Seed files (.json, .yaml, .yml)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List registered classes
    Classes,

    /// List stored entities of a class
    List {
        /// Class name or `module:Name` path
        class: String,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), SeedError> {
    let config = SeedgraphConfig::load(&cli.config)?;
    let db_path = config.database_path(cli.database.as_deref());
    let output = Output {
        json_mode: cli.json_mode,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Some(Commands::Seed {
            files,
            commit,
            no_flush,
            by_class,
        }) => cmd_seed(
            &db_path,
            &config,
            &files,
            SeedFlags {
                commit,
                no_flush,
                by_class,
            },
            output,
        ),
        Some(Commands::Validate { files }) => cmd_validate(&config, &files, output),
        Some(Commands::Classes) => cmd_classes(&config, output),
        Some(Commands::List { class }) => cmd_list(&db_path, &config, &class, output),
        Some(Commands::Init { force }) => cmd_init(&db_path, force, output),
        None => {
            // No subcommand - list registered classes by default
            cmd_classes(&config, output)
        }
    }
}
