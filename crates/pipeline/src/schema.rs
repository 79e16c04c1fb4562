//! Pipeline Definition Schema Types
//!
//! Stages run strictly one after another. Inside a stage, actions sharing a
//! run-order run in parallel and lower run-orders finish before higher ones
//! start. Artifacts connect producers to later consumers by name.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[A-Za-z0-9.@_-]{1,100}$").unwrap()
});

/// Whether `name` is a usable stage, action or artifact name
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    NAME.is_match(name)
}

/// Lowest run-order
pub const MIN_RUN_ORDER: u32 = 1;
/// Highest run-order
pub const MAX_RUN_ORDER: u32 = 999;

/// A named handle passed between actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Artifact(String);

impl Artifact {
    /// Create an artifact handle
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Artifact name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a source action learns about new commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTrigger {
    /// A webhook starts the pipeline on every push to the branch
    Webhook,
    /// Never triggers; fetched whenever another source starts the pipeline
    None,
}

/// Fetches a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSource {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Branch to fetch
    pub branch: String,
    /// Access token, usually a secret dynamic reference
    pub oauth_token: String,
    /// Change trigger
    pub trigger: SourceTrigger,
}

/// Runs a build project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBuild {
    /// Logical id of the build project
    pub project: String,
    /// Action-level plaintext variables (name, value)
    pub environment: Vec<(String, String)>,
}

/// Waits for a human decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualApproval {
    /// Logical id of the topic notified when approval is pending
    pub topic: Option<String>,
    /// Text shown to the approver
    pub additional_information: Option<String>,
}

/// What an action does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Source fetch
    GitHubSource(GitHubSource),
    /// Build or test
    CodeBuild(CodeBuild),
    /// Approval gate
    ManualApproval(ManualApproval),
}

/// One pipeline action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Action name, unique within its stage
    pub name: String,
    /// What the action does
    pub kind: ActionKind,
    /// Relative execution order within the stage
    pub run_order: u32,
    /// Consumed artifacts; the first one is the primary source
    pub inputs: Vec<Artifact>,
    /// Produced artifacts
    pub outputs: Vec<Artifact>,
    /// Namespace exposing the action's output variables
    pub namespace: Option<String>,
}

impl Action {
    /// A GitHub source producing `output`
    #[must_use]
    pub fn github_source(name: impl Into<String>, source: GitHubSource, output: Artifact) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::GitHubSource(source),
            run_order: MIN_RUN_ORDER,
            inputs: Vec::new(),
            outputs: vec![output],
            namespace: None,
        }
    }

    /// A build of `project` reading `input` plus `extra_inputs`
    #[must_use]
    pub fn code_build(
        name: impl Into<String>,
        project: impl Into<String>,
        input: Artifact,
        extra_inputs: Vec<Artifact>,
    ) -> Self {
        let mut inputs = vec![input];
        inputs.extend(extra_inputs);
        Self {
            name: name.into(),
            kind: ActionKind::CodeBuild(CodeBuild {
                project: project.into(),
                environment: Vec::new(),
            }),
            run_order: MIN_RUN_ORDER,
            inputs,
            outputs: Vec::new(),
            namespace: None,
        }
    }

    /// An approval gate notifying `topic`
    #[must_use]
    pub fn manual_approval(
        name: impl Into<String>,
        topic: Option<String>,
        additional_information: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::ManualApproval(ManualApproval {
                topic,
                additional_information,
            }),
            run_order: MIN_RUN_ORDER,
            inputs: Vec::new(),
            outputs: Vec::new(),
            namespace: None,
        }
    }

    /// Set the run-order
    #[must_use]
    pub const fn with_run_order(mut self, run_order: u32) -> Self {
        self.run_order = run_order;
        self
    }

    /// Expose output variables under `namespace`
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Add an action-level plaintext variable to a build action.
    ///
    /// Has no effect on other action kinds.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let ActionKind::CodeBuild(build) = &mut self.kind {
            build.environment.push((name.into(), value.into()));
        }
        self
    }

    /// Reference to one of this action's output variables, e.g. `CommitId`
    #[must_use]
    pub fn variable(&self, variable: &str) -> Option<String> {
        self.namespace
            .as_ref()
            .map(|ns| format!("#{{{ns}.{variable}}}"))
    }

    /// Whether this is a source action
    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self.kind, ActionKind::GitHubSource(_))
    }

    /// Whether this is an approval gate
    #[must_use]
    pub const fn is_approval(&self) -> bool {
        matches!(self.kind, ActionKind::ManualApproval(_))
    }
}

/// A pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Stage name
    pub name: String,
    /// Actions in declaration order
    pub actions: Vec<Action>,
}

impl Stage {
    /// Create a stage
    #[must_use]
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }

    /// Actions sorted by run-order; declaration order breaks ties
    #[must_use]
    pub fn ordered_actions(&self) -> Vec<&Action> {
        let mut actions: Vec<&Action> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.run_order);
        actions
    }
}

/// A complete pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// Logical id of the pipeline resource
    pub logical_id: String,
    /// Logical id of the role the pipeline runs as
    pub role: String,
    /// Logical id of the artifact bucket
    pub artifact_bucket: String,
    /// Stages in execution order
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Create an empty pipeline
    #[must_use]
    pub fn new(
        logical_id: impl Into<String>,
        role: impl Into<String>,
        artifact_bucket: impl Into<String>,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            role: role.into(),
            artifact_bucket: artifact_bucket.into(),
            stages: Vec::new(),
        }
    }

    /// Append a stage
    #[must_use]
    pub fn add_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Look up a stage by name
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Every action in every stage
    pub fn actions(&self) -> impl Iterator<Item = (&Stage, &Action)> {
        self.stages
            .iter()
            .flat_map(|stage| stage.actions.iter().map(move |action| (stage, action)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert!(is_valid_name("Build_and_Deploy"));
        assert!(is_valid_name("AppCode"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name(&"a".repeat(101)));
    }

    #[test]
    fn test_ordered_actions_sorts_by_run_order() {
        let stage = Stage::new(
            "DeployToTest",
            vec![
                Action::manual_approval("Approve", None, None).with_run_order(99),
                Action::code_build("Build", "P", Artifact::new("AppCode"), vec![]),
                Action::code_build("Smoke", "Q", Artifact::new("AppCode"), vec![]).with_run_order(98),
            ],
        );
        let names: Vec<_> = stage.ordered_actions().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Build", "Smoke", "Approve"]);
    }

    #[test]
    fn test_action_variables() {
        let source = Action::github_source(
            "SourceAppCode",
            GitHubSource {
                owner: "ndlib".to_string(),
                repo: "classes-api".to_string(),
                branch: "main".to_string(),
                oauth_token: "token".to_string(),
                trigger: SourceTrigger::Webhook,
            },
            Artifact::new("AppCode"),
        );
        assert_eq!(source.variable("CommitId"), None);
        let source = source.with_namespace("SourceAppCode");
        assert_eq!(source.variable("CommitId").unwrap(), "#{SourceAppCode.CommitId}");
    }

    #[test]
    fn test_with_variable_only_applies_to_builds() {
        let build = Action::code_build("Build", "P", Artifact::new("AppCode"), vec![])
            .with_variable("VERSION", "#{SourceAppCode.CommitId}");
        match &build.kind {
            ActionKind::CodeBuild(b) => assert_eq!(b.environment.len(), 1),
            other => panic!("unexpected kind: {other:?}"),
        }
        let approval = Action::manual_approval("Approve", None, None).with_variable("X", "y");
        assert!(approval.is_approval());
    }
}
