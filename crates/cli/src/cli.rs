//! Command line definition

use crate::config::parse_context;
use crate::tracing::{LogLevel, TracingConfig, TracingFormat};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Template format written by `synth`
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum TemplateFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

impl From<TemplateFormat> for blueprints_core::assembly::OutputFormat {
    fn from(format: TemplateFormat) -> Self {
        match format {
            TemplateFormat::Json => Self::Json,
            TemplateFormat::Yaml => Self::Yaml,
        }
    }
}

/// Synthesizes the classes API pipeline and service stacks.
#[derive(Parser, Debug)]
#[command(name = "blueprints")]
#[command(about = "Synthesize the classes API deployment templates")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file.
    #[arg(
        long,
        short = 'c',
        global = true,
        default_value = "blueprints.toml",
        env = "BLUEPRINTS_CONFIG"
    )]
    pub config: PathBuf,

    /// Context overrides applied before the stacks are built.
    #[arg(
        long = "context",
        global = true,
        value_name = "KEY=VALUE",
        value_parser = parse_context,
        help = "Override a setting: stage, serviceStackName (stack prefix), sentryVersion or lambdaCodePath"
    )]
    pub context: Vec<(String, String)>,

    /// Logging verbosity level.
    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Log output format.
    #[arg(
        long,
        global = true,
        help = "Log format (ignored with --json)",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    /// Emit JSON output and JSON logs.
    #[arg(long, global = true, help = "Emit JSON envelope and JSON logs")]
    pub json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Write templates and a manifest into an output directory.
    Synth {
        /// Stack to synthesize; every stack when omitted
        stack: Option<String>,
        /// Output directory
        #[arg(long, short = 'o', default_value = "cdk.out")]
        out: PathBuf,
        /// Template format
        #[arg(long, short = 'f', default_value = "json", value_enum)]
        format: TemplateFormat,
    },
    /// List the configured stacks.
    List,
    /// Print the build role's permission statements.
    Policy {
        /// Stages to cover instead of the configured set
        #[arg(long = "stage", short = 's', value_name = "STAGE")]
        stages: Vec<String>,
    },
    /// Construct and synthesize every stack without writing anything.
    Validate,
}

impl Commands {
    /// Subcommand name, used in spans
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Synth { .. } => "synth",
            Self::List => "list",
            Self::Policy { .. } => "policy",
            Self::Validate => "validate",
        }
    }
}

impl Cli {
    /// Tracing settings derived from the global flags
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig {
            format: if self.json {
                TracingFormat::Json
            } else {
                self.log_format
            },
            level: self.level.into(),
            ..TracingConfig::default()
        }
    }
}
