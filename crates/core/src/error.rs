//! Error types shared by every blueprint crate

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Synthesis error.
///
/// Every variant is fatal: synthesis either produces a complete template or
/// nothing at all.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A stage name that cannot be used in resource names
    #[error("Invalid stage name '{name}'")]
    #[diagnostic(
        code(blueprints::stage::invalid),
        help("Stage names are lowercase, start with a letter and contain only a-z, 0-9 and '-' (max 32 chars)")
    )]
    InvalidStageName {
        /// The rejected name
        name: String,
    },

    /// A stage set with no stages
    #[error("Stage set is empty")]
    #[diagnostic(
        code(blueprints::stage::empty),
        help("Configure at least one stage, e.g. stages = [\"test\", \"prod\"]")
    )]
    EmptyStageSet,

    /// A stage listed more than once
    #[error("Stage '{name}' is listed more than once")]
    #[diagnostic(code(blueprints::stage::duplicate))]
    DuplicateStage {
        /// The repeated name
        name: String,
    },

    /// A stage deployed by the pipeline that the build role does not cover
    #[error("Stage '{stage}' is deployed but the build role only covers [{covered}]")]
    #[diagnostic(
        code(blueprints::stage::uncovered),
        help("Add the stage to [app].stages so the build role is granted access to it")
    )]
    UncoveredStage {
        /// The uncovered stage
        stage: String,
        /// Comma separated list of covered stages
        covered: String,
    },

    /// A required configuration field is missing or blank
    #[error("{component}: required field '{field}' is missing")]
    #[diagnostic(code(blueprints::config::missing_field))]
    MissingField {
        /// Component being configured
        component: &'static str,
        /// Name of the field
        field: &'static str,
    },

    /// A configuration value is present but unusable
    #[error("{component}: {message}")]
    #[diagnostic(code(blueprints::config::invalid))]
    InvalidConfig {
        /// Component being configured
        component: &'static str,
        /// What is wrong with the value
        message: String,
    },

    /// A `${...}` substitution string that cannot be rendered
    #[error("Malformed resource-name template '{template}': {reason}")]
    #[diagnostic(code(blueprints::template::malformed))]
    MalformedTemplate {
        /// The offending template
        template: String,
        /// Why it was rejected
        reason: String,
    },

    /// A logical id that CloudFormation would reject
    #[error("Invalid logical id '{id}'")]
    #[diagnostic(
        code(blueprints::template::logical_id),
        help("Logical ids must be non-empty and ASCII alphanumeric")
    )]
    InvalidLogicalId {
        /// The rejected id
        id: String,
    },

    /// Two resources, parameters or outputs share a logical id
    #[error("Logical id '{id}' is already defined in this template")]
    #[diagnostic(code(blueprints::template::duplicate))]
    DuplicateLogicalId {
        /// The repeated id
        id: String,
    },

    /// A component failed structural validation
    #[error("{component} is invalid:\n  - {}", .violations.join("\n  - "))]
    #[diagnostic(code(blueprints::validation))]
    Validation {
        /// Component that failed
        component: String,
        /// Every violation found
        violations: Vec<String>,
    },

    /// A stack name not present in the registry
    #[error("Unknown stack '{name}'. Available: {available}")]
    #[diagnostic(code(blueprints::stack::unknown))]
    UnknownStack {
        /// Requested name
        name: String,
        /// Comma separated registered names
        available: String,
    },

    /// JSON/YAML rendering failed
    #[error("Serialization failed: {message}")]
    #[diagnostic(code(blueprints::serialization))]
    Serialization {
        /// Underlying serializer message
        message: String,
    },

    /// I/O error with path context
    #[error("I/O error during {operation} of {}: {source}", .path.display())]
    #[diagnostic(code(blueprints::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path involved
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
    },
}

impl Error {
    /// Create an invalid-config error
    pub fn invalid_config(component: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            component,
            message: message.into(),
        }
    }

    /// Create a malformed-template error
    pub fn malformed(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedTemplate {
            template: template.into(),
            reason: reason.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization {
            message: message.to_string(),
        }
    }

    /// Create an I/O error with path context
    pub fn io(source: std::io::Error, path: &Path, operation: &'static str) -> Self {
        Self::Io {
            source,
            path: path.to_path_buf(),
            operation,
        }
    }
}

/// Fails with [`Error::MissingField`] when `value` is blank.
///
/// # Errors
///
/// Returns `MissingField` for empty or whitespace-only values.
pub fn require(component: &'static str, field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::MissingField { component, field });
    }
    Ok(())
}

/// Result type for synthesis operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_lists_every_violation() {
        let error = Error::Validation {
            component: "pipeline".to_string(),
            violations: vec!["first".to_string(), "second".to_string()],
        };
        let rendered = error.to_string();
        assert!(rendered.starts_with("pipeline is invalid:"));
        assert!(rendered.contains("- first"));
        assert!(rendered.contains("- second"));
    }

    #[test]
    fn test_require_rejects_blank() {
        assert!(require("pipeline", "gitOwner", "ndlib").is_ok());
        let err = require("pipeline", "gitOwner", "  ").unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                field: "gitOwner",
                ..
            }
        ));
    }

    #[test]
    fn test_io_error_keeps_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::io(io, Path::new("cdk.out/manifest.json"), "write");
        assert!(err.to_string().contains("cdk.out/manifest.json"));
        assert!(err.to_string().contains("gone"));
    }
}
