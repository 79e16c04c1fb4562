//! Subcommand implementations
//!
//! Every command returns the text to print on stdout; the binary decides
//! where it goes.

pub mod list;
pub mod policy;
pub mod synth;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::config::BlueprintsConfig;
use crate::errors::{CliError, OkEnvelope};
use serde::Serialize;

/// Run the parsed command line.
///
/// # Errors
///
/// Returns the first configuration or synthesis error.
pub fn run(cli: &Cli) -> Result<String, CliError> {
    let span = crate::command_span!(cli.command.name());
    let _guard = span.enter();

    let config = BlueprintsConfig::load(&cli.config)?;
    match &cli.command {
        Commands::Synth { stack, out, format } => synth::execute_synth(
            &config,
            &cli.context,
            stack.as_deref(),
            out,
            (*format).into(),
            cli.json,
        ),
        Commands::List => list::execute_list(&config, &cli.context, cli.json),
        Commands::Policy { stages } => {
            policy::execute_policy(&config, &cli.context, stages, cli.json)
        },
        Commands::Validate => validate::execute_validate(&config, &cli.context, cli.json),
    }
}

/// Serialize a payload inside an ok envelope
pub(crate) fn json_envelope<T: Serialize>(data: T) -> Result<String, CliError> {
    serde_json::to_string_pretty(&OkEnvelope::new(data))
        .map_err(|e| blueprints_core::Error::serialization(e).into())
}
