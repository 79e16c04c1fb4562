//! CLI error type and exit codes

use miette::{Diagnostic, Report};
use serde::Serialize;
use std::io::{self, Write};
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Synthesis error exit code
pub const EXIT_SYNTH: i32 = 3;

/// CLI-specific error types with exit code mapping
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Configuration file or argument problem (exit code 2)
    #[error("Configuration error: {message}")]
    #[diagnostic(code(blueprints::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },

    /// A stack could not be assembled, synthesized or written
    #[error(transparent)]
    #[diagnostic(transparent)]
    Synth(#[from] blueprints_core::Error),
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Short machine-readable category
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Synth(err) if is_config_error(err) => "config",
            Self::Synth(_) => "synth",
        }
    }
}

/// Errors caused by the configuration rather than by assembling templates
const fn is_config_error(err: &blueprints_core::Error) -> bool {
    use blueprints_core::Error;
    matches!(
        err,
        Error::InvalidStageName { .. }
            | Error::EmptyStageSet
            | Error::DuplicateStage { .. }
            | Error::UncoveredStage { .. }
            | Error::MissingField { .. }
            | Error::InvalidConfig { .. }
            | Error::UnknownStack { .. }
    )
}

/// Map CLI error to its exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Synth(inner) if is_config_error(inner) => EXIT_CLI,
        CliError::Synth(_) => EXIT_SYNTH,
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct OkEnvelope<T> {
    /// Always "ok"
    pub status: &'static str,
    /// The payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Wrap a payload
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope<E> {
    /// Always "error"
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Wrap error details
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Render an error as a JSON envelope on stdout or a diagnostic on stderr
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn render_error(err: CliError, json_mode: bool) {
    if json_mode {
        let envelope = ErrorEnvelope::new(serde_json::json!({
            "code": err.category(),
            "message": err.to_string(),
        }));
        match serde_json::to_string(&envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        eprintln!("{:?}", Report::new(err));
        let _ = io::stderr().flush();
    }
}
