//! Build specification schema
//!
//! Defines the command sequence a build project runs.
//! See: <https://docs.aws.amazon.com/codebuild/latest/userguide/build-spec-ref.html>

use blueprints_core::{Error, Result};
use indexmap::IndexMap;
use serde::Serialize;

/// Buildspec format version
pub const BUILDSPEC_VERSION: &str = "0.2";

/// A complete build specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSpec {
    /// Format version, always `0.2`
    pub version: String,

    /// Build-wide environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<BuildSpecEnv>,

    /// Ordered command phases
    pub phases: Phases,
}

/// Environment declared inside the buildspec itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSpecEnv {
    /// Plain variables
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, String>,

    /// Variables resolved from the parameter store (name -> parameter path)
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub parameter_store: IndexMap<String, String>,
}

/// Build phases, run in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Phases {
    /// Install tools and runtimes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<Phase>,
    /// Prepare the build
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_build: Option<Phase>,
    /// Main build commands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Phase>,
    /// Commands after the build
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_build: Option<Phase>,
}

/// One build phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Phase {
    /// Pinned runtimes, e.g. `nodejs: 12.x`
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub runtime_versions: IndexMap<String, String>,

    /// Shell commands
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
}

impl Phase {
    /// A phase running `commands`
    #[must_use]
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            runtime_versions: IndexMap::new(),
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    /// Pin a runtime version
    #[must_use]
    pub fn runtime(mut self, runtime: impl Into<String>, version: impl Into<String>) -> Self {
        self.runtime_versions.insert(runtime.into(), version.into());
        self
    }
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSpec {
    /// An empty buildspec
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: BUILDSPEC_VERSION.to_string(),
            env: None,
            phases: Phases::default(),
        }
    }

    /// Set the install phase
    #[must_use]
    pub fn install(mut self, phase: Phase) -> Self {
        self.phases.install = Some(phase);
        self
    }

    /// Set the pre-build phase
    #[must_use]
    pub fn pre_build(mut self, phase: Phase) -> Self {
        self.phases.pre_build = Some(phase);
        self
    }

    /// Set the build phase
    #[must_use]
    pub fn build(mut self, phase: Phase) -> Self {
        self.phases.build = Some(phase);
        self
    }

    /// Set the post-build phase
    #[must_use]
    pub fn post_build(mut self, phase: Phase) -> Self {
        self.phases.post_build = Some(phase);
        self
    }

    /// Phases that are set, in run order
    pub fn phases(&self) -> impl Iterator<Item = (&'static str, &Phase)> {
        [
            ("install", self.phases.install.as_ref()),
            ("pre_build", self.phases.pre_build.as_ref()),
            ("build", self.phases.build.as_ref()),
            ("post_build", self.phases.post_build.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, phase)| phase.map(|p| (name, p)))
    }

    /// Every command in run order
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.phases()
            .flat_map(|(_, phase)| phase.commands.iter().map(String::as_str))
    }

    /// Check that something runs and no command is blank.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every violation.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();
        if self.commands().next().is_none() {
            violations.push("buildspec has no commands".to_string());
        }
        for (name, phase) in self.phases() {
            if phase.commands.iter().any(|c| c.trim().is_empty()) {
                violations.push(format!("phase '{name}' has a blank command"));
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                component: "buildspec".to_string(),
                violations,
            })
        }
    }

    /// The buildspec as the JSON string a build project embeds.
    ///
    /// # Errors
    ///
    /// Fails validation or serialization.
    pub fn to_json_string(&self) -> Result<String> {
        self.validate()?;
        serde_json::to_string_pretty(self).map_err(Error::serialization)
    }
}
