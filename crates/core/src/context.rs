//! Synthesis context
//!
//! Naming inputs that every stack needs. They are passed explicitly at
//! construction time instead of being looked up from an ambient scope.

use crate::arn::Locator;
use crate::error::{Error, Result};
use crate::stage::StageName;
use serde::Deserialize;

/// Default prefix of the service stacks (`<prefix>-<stage>`)
pub const DEFAULT_SERVICE_STACK_PREFIX: &str = "classesAPI";

/// Default application namespace under the parameter root
pub const DEFAULT_APPLICATION: &str = "classesAPI";

/// Default root of the remote configuration namespace
pub const DEFAULT_PARAMETER_ROOT: &str = "/all";

/// Explicit naming context for one synthesis run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SynthContext {
    /// Prefix of every service stack name
    pub service_stack_prefix: String,
    /// Application namespace under [`Self::parameter_root`]
    pub application: String,
    /// Root of the remote configuration namespace
    pub parameter_root: String,
    /// Fixed account id; the deploying account when unset
    pub account: Option<String>,
    /// Fixed region; the deploying region when unset
    pub region: Option<String>,
}

impl Default for SynthContext {
    fn default() -> Self {
        Self {
            service_stack_prefix: DEFAULT_SERVICE_STACK_PREFIX.to_string(),
            application: DEFAULT_APPLICATION.to_string(),
            parameter_root: DEFAULT_PARAMETER_ROOT.to_string(),
            account: None,
            region: None,
        }
    }
}

/// Check the shape of a parameter namespace root: a leading `/`, no
/// trailing `/` and no empty segments, e.g. `/all`.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] naming the first broken rule.
pub fn validate_parameter_root(root: &str) -> Result<()> {
    let reason = match root.strip_prefix('/') {
        None => "must start with '/'",
        Some(rest) if rest.is_empty() || rest.ends_with('/') => "must not end with '/'",
        Some(rest) if rest.split('/').any(str::is_empty) => "must not contain empty segments",
        Some(_) => return Ok(()),
    };
    Err(Error::invalid_config(
        "context",
        format!("parameter_root '{root}' {reason}"),
    ))
}

impl SynthContext {
    /// Check the naming inputs before any name is derived from them.
    ///
    /// # Errors
    ///
    /// Fails when [`Self::parameter_root`] is not an absolute path without
    /// empty segments.
    pub fn validate(&self) -> Result<()> {
        validate_parameter_root(&self.parameter_root)
    }

    /// Override the service stack prefix
    #[must_use]
    pub fn with_service_stack_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.service_stack_prefix = prefix.into();
        self
    }

    /// `<prefix>-<stage>`
    #[must_use]
    pub fn service_stack_name(&self, stage: &StageName) -> String {
        format!("{}-{stage}", self.service_stack_prefix)
    }

    /// `<root>/<application>`: cross-stage configuration and secrets
    #[must_use]
    pub fn app_namespace(&self) -> String {
        format!("{}/{}", self.parameter_root, self.application)
    }

    /// `<root>/<application>/<stage>`: stage-scoped configuration
    #[must_use]
    pub fn stage_namespace(&self, stage: &StageName) -> String {
        format!("{}/{stage}", self.app_namespace())
    }

    /// `<root>/<application>/<stage>/<key>`
    #[must_use]
    pub fn stage_parameter(&self, stage: &StageName, key: &str) -> String {
        format!("{}/{key}", self.stage_namespace(stage))
    }

    /// Account slot for ARN templating
    #[must_use]
    pub fn account_locator(&self) -> Locator {
        Locator::from_option(self.account.as_deref())
    }

    /// Region slot for ARN templating
    #[must_use]
    pub fn region_locator(&self) -> Locator {
        Locator::from_option(self.region.as_deref())
    }
}
