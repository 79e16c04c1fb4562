//! Command line synthesizer for the classes API blueprints.
//!
//! Loads `blueprints.toml`, builds the pipeline and service stacks and
//! writes their templates into a cloud assembly directory.

#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod tracing;

pub use cli::{Cli, Commands};
pub use config::BlueprintsConfig;
pub use errors::{CliError, EXIT_CLI, EXIT_OK, EXIT_SYNTH, exit_code_for, render_error};
