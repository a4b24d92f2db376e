//! # seedgraph
//!
//! Command-line wrapper around `seedgraph-core`: configuration loading and
//! the CLI commands. The binary in `main.rs` only sets up logging and
//! dispatches to [`cli::execute`].

pub mod cli;
pub mod config;
