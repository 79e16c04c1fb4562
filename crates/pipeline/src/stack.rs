//! Pipeline stack
//!
//! The continuous-delivery stack: artifact storage, the pipeline and build
//! identities, deploy and smoke-test projects, notifications and the
//! Source → DeployToTest → DeployToProd pipeline.

use crate::bucket::ArtifactBucket;
use crate::emitter::PipelineEmitter;
use crate::notifications::{PipelineNotifications, SlackApproval, Topic};
use crate::project::{BuildProject, DeploymentProps};
use crate::schema::{Action, Artifact, GitHubSource, Pipeline, SourceTrigger, Stage};
use crate::validation::PipelineValidator;
use blueprints_core::error::require;
use blueprints_core::{
    Error, Result, StackDefinition, StageName, StageSet, SynthContext, Template, intrinsic,
};
use blueprints_iam::{PolicyAssembler, Role};
use serde::Deserialize;

/// Logical ids of the pipeline stack's components
pub mod ids {
    /// Artifact storage bucket
    pub const ARTIFACT_BUCKET: &str = "ArtifactBucket";
    /// Identity the pipeline engine runs as
    pub const PIPELINE_ROLE: &str = "CodePipelineRole";
    /// Identity every build project runs as
    pub const BUILD_ROLE: &str = "CodeBuildTrustRole";
    /// The pipeline
    pub const PIPELINE: &str = "CodePipeline";
    /// Execution state notifications
    pub const NOTIFICATIONS: &str = "PipelineNotifications";
    /// Deploys the test stage
    pub const TEST_BUILD_PROJECT: &str = "ClassesApiTestBuildProject";
    /// Smoke tests the test stage
    pub const QA_PROJECT: &str = "QAProject";
    /// Deploys the production stage
    pub const PROD_BUILD_PROJECT: &str = "ClassesApiProdBuildProject";
    /// Approval notifications
    pub const APPROVAL_TOPIC: &str = "PipelineApprovalTopic";
    /// Chat relay subscription
    pub const SLACK_APPROVAL: &str = "SlackApproval";
}

/// Application source output
pub const APP_ARTIFACT: &str = "AppCode";
/// Infrastructure source output
pub const INFRA_ARTIFACT: &str = "InfraCode";
/// Name of the application source action, also its variable namespace
pub const APP_SOURCE_ACTION: &str = "SourceAppCode";
/// Name of the infrastructure source action
pub const INFRA_SOURCE_ACTION: &str = "SourceInfraCode";
/// Name of the deploy action in both deploy stages
pub const DEPLOY_ACTION: &str = "Build_and_Deploy";
/// Name of the smoke-test action
pub const SMOKE_TEST_ACTION: &str = "SmokeTests";
/// Name of the approval gate
pub const APPROVAL_ACTION: &str = "ManualApprovalOfTestEnvironment";
/// Text shown to the approver
pub const APPROVAL_INFORMATION: &str = "Approve or Reject this change after testing";
/// Run-order of the smoke test in the test stage
pub const SMOKE_TEST_RUN_ORDER: u32 = 98;
/// Run-order of the approval gate in the test stage
pub const APPROVAL_RUN_ORDER: u32 = 99;
/// Field of the source token secret holding the token
pub const GIT_TOKEN_FIELD: &str = "oauth";

/// `[pipeline]` configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct PipelineStackConfig {
    /// Owner of both repositories
    pub git_owner: String,
    /// Secret holding the source token under the `oauth` field
    pub git_token_path: String,
    /// Application repository
    pub service_repository: String,
    /// Application branch
    pub service_branch: String,
    /// Infrastructure repository
    pub blueprints_repository: String,
    /// Infrastructure branch
    pub blueprints_branch: String,
    /// Comma separated email receivers
    pub email_receivers: String,
    /// Stack exporting the chat relay function
    #[serde(default)]
    pub slack_notify_stack_name: Option<String>,
    /// Contact tag value
    pub contact: String,
    /// Owner tag value
    pub owner: String,
    /// Parameter path of the sentry auth token
    pub sentry_token_path: String,
    /// Sentry organisation
    pub sentry_org: String,
    /// Sentry project
    pub sentry_project: String,
    /// Stack name, `<prefix>-pipeline` when unset
    #[serde(default)]
    pub stack_name: Option<String>,
    /// Stage deployed and smoke tested before approval
    #[serde(default = "StageName::test")]
    pub test_stage: StageName,
    /// Stage deployed after approval
    #[serde(default = "StageName::prod")]
    pub prod_stage: StageName,
}

impl PipelineStackConfig {
    fn validate(&self) -> Result<()> {
        const COMPONENT: &str = "pipeline";
        require(COMPONENT, "git_owner", &self.git_owner)?;
        require(COMPONENT, "git_token_path", &self.git_token_path)?;
        require(COMPONENT, "service_repository", &self.service_repository)?;
        require(COMPONENT, "service_branch", &self.service_branch)?;
        require(COMPONENT, "blueprints_repository", &self.blueprints_repository)?;
        require(COMPONENT, "blueprints_branch", &self.blueprints_branch)?;
        if self.test_stage == self.prod_stage {
            return Err(Error::invalid_config(
                COMPONENT,
                format!(
                    "test_stage and prod_stage must differ, both are '{}'",
                    self.test_stage
                ),
            ));
        }
        if let Some(name) = &self.stack_name {
            require(COMPONENT, "stack_name", name)?;
        }
        Ok(())
    }

    fn deployment(&self, stage: &StageName) -> DeploymentProps {
        DeploymentProps {
            stage: stage.clone(),
            service_repository: self.service_repository.clone(),
            service_branch: self.service_branch.clone(),
            blueprints_repository: self.blueprints_repository.clone(),
            blueprints_branch: self.blueprints_branch.clone(),
            contact: self.contact.clone(),
            owner: self.owner.clone(),
            sentry_token_path: self.sentry_token_path.clone(),
            sentry_org: self.sentry_org.clone(),
            sentry_project: self.sentry_project.clone(),
        }
    }

    fn source(&self, repo: &str, branch: &str, trigger: SourceTrigger) -> GitHubSource {
        GitHubSource {
            owner: self.git_owner.clone(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            oauth_token: intrinsic::secrets_manager_reference(&self.git_token_path, GIT_TOKEN_FIELD),
            trigger,
        }
    }
}

/// The continuous-delivery stack.
#[derive(Debug, Clone)]
pub struct PipelineStack {
    stack_name: String,
    bucket: ArtifactBucket,
    pipeline_role: Role,
    build_role: Role,
    projects: Vec<BuildProject>,
    notifications: PipelineNotifications,
    approval_topic: Topic,
    slack: Option<SlackApproval>,
    pipeline: Pipeline,
}

impl PipelineStack {
    /// Assemble and validate every component.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid configuration value, on a deployed stage
    /// the build role does not cover, or on an invalid pipeline structure.
    pub fn new(config: &PipelineStackConfig, stages: StageSet, ctx: &SynthContext) -> Result<Self> {
        config.validate()?;
        stages.ensure_covers(&config.test_stage)?;
        stages.ensure_covers(&config.prod_stage)?;

        let stack_name = config
            .stack_name
            .clone()
            .unwrap_or_else(|| format!("{}-pipeline", ctx.service_stack_prefix));

        let bucket = ArtifactBucket::new(ids::ARTIFACT_BUCKET)?;
        let assembler = PolicyAssembler::new(ids::BUILD_ROLE, stages, bucket.bucket_ref(), ctx)?;
        let build_role = Role::build_role(ids::BUILD_ROLE, &assembler)?;

        let projects = vec![
            BuildProject::deployment(
                ids::TEST_BUILD_PROJECT,
                ids::BUILD_ROLE,
                &config.deployment(&config.test_stage),
                ctx,
            )?,
            BuildProject::smoke_test(ids::QA_PROJECT, ids::BUILD_ROLE, &config.test_stage, ctx)?,
            BuildProject::deployment(
                ids::PROD_BUILD_PROJECT,
                ids::BUILD_ROLE,
                &config.deployment(&config.prod_stage),
                ctx,
            )?,
        ];
        for project in &projects {
            assembler.stages().ensure_covers(project.stage())?;
        }

        let approval_topic = Topic::new(ids::APPROVAL_TOPIC, ids::APPROVAL_TOPIC)?;
        let project_ids: Vec<&str> = projects.iter().map(BuildProject::logical_id).collect();
        let pipeline_role = Role::pipeline_role(
            ids::PIPELINE_ROLE,
            &bucket.bucket_ref(),
            &project_ids,
            &[approval_topic.logical_id()],
        )?;

        let notifications =
            PipelineNotifications::new(ids::NOTIFICATIONS, ids::PIPELINE, &config.email_receivers, ctx)?;

        let slack = match config.slack_notify_stack_name.as_deref() {
            Some(name) => Some(SlackApproval::new(ids::SLACK_APPROVAL, &approval_topic, name)?),
            None => {
                tracing::warn!(
                    stack = %stack_name,
                    "slack_notify_stack_name is not set; approvals are not relayed to chat"
                );
                None
            }
        };

        let pipeline = Self::pipeline(config, &approval_topic);
        PipelineValidator::new(&pipeline)
            .validate()
            .map_err(|errors| Error::Validation {
                component: format!("pipeline {}", pipeline.logical_id),
                violations: errors.iter().map(ToString::to_string).collect(),
            })?;

        tracing::debug!(
            stack = %stack_name,
            projects = projects.len(),
            stages = pipeline.stages.len(),
            "Pipeline stack assembled"
        );

        Ok(Self {
            stack_name,
            bucket,
            pipeline_role,
            build_role,
            projects,
            notifications,
            approval_topic,
            slack,
            pipeline,
        })
    }

    fn pipeline(config: &PipelineStackConfig, approval_topic: &Topic) -> Pipeline {
        let app_source = Action::github_source(
            APP_SOURCE_ACTION,
            config.source(
                &config.service_repository,
                &config.service_branch,
                SourceTrigger::Webhook,
            ),
            Artifact::new(APP_ARTIFACT),
        )
        .with_namespace(APP_SOURCE_ACTION);
        let infra_source = Action::github_source(
            INFRA_SOURCE_ACTION,
            config.source(
                &config.blueprints_repository,
                &config.blueprints_branch,
                SourceTrigger::None,
            ),
            Artifact::new(INFRA_ARTIFACT),
        );

        let version = app_source
            .variable("CommitId")
            .unwrap_or_else(|| format!("#{{{APP_SOURCE_ACTION}.CommitId}}"));
        let deploy = |project: &str| {
            Action::code_build(
                DEPLOY_ACTION,
                project,
                Artifact::new(APP_ARTIFACT),
                vec![Artifact::new(INFRA_ARTIFACT)],
            )
            .with_variable("VERSION", version.clone())
        };

        Pipeline::new(ids::PIPELINE, ids::PIPELINE_ROLE, ids::ARTIFACT_BUCKET)
            .add_stage(Stage::new("Source", vec![app_source, infra_source]))
            .add_stage(Stage::new(
                "DeployToTest",
                vec![
                    deploy(ids::TEST_BUILD_PROJECT),
                    Action::code_build(
                        SMOKE_TEST_ACTION,
                        ids::QA_PROJECT,
                        Artifact::new(APP_ARTIFACT),
                        vec![],
                    )
                    .with_run_order(SMOKE_TEST_RUN_ORDER),
                    Action::manual_approval(
                        APPROVAL_ACTION,
                        Some(approval_topic.logical_id().to_string()),
                        Some(APPROVAL_INFORMATION.to_string()),
                    )
                    .with_run_order(APPROVAL_RUN_ORDER),
                ],
            ))
            .add_stage(Stage::new(
                "DeployToProd",
                vec![deploy(ids::PROD_BUILD_PROJECT)],
            ))
    }

    /// The pipeline definition
    #[must_use]
    pub const fn pipeline_definition(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Identity every build project runs as
    #[must_use]
    pub const fn build_role(&self) -> &Role {
        &self.build_role
    }

    /// Identity the pipeline engine runs as
    #[must_use]
    pub const fn pipeline_role(&self) -> &Role {
        &self.pipeline_role
    }

    /// Build projects in pipeline order
    #[must_use]
    pub fn projects(&self) -> &[BuildProject] {
        &self.projects
    }

    /// Whether approvals are relayed to chat
    #[must_use]
    pub const fn relays_approvals(&self) -> bool {
        self.slack.is_some()
    }
}

impl StackDefinition for PipelineStack {
    fn stack_name(&self) -> &str {
        &self.stack_name
    }

    fn description(&self) -> &'static str {
        "Continuous-delivery pipeline for the classes API"
    }

    fn validate(&self) -> Result<()> {
        self.build_role.validate()?;
        self.pipeline_role.validate()?;
        PipelineValidator::new(&self.pipeline)
            .validate()
            .map_err(|errors| Error::Validation {
                component: format!("pipeline {}", self.pipeline.logical_id),
                violations: errors.iter().map(ToString::to_string).collect(),
            })
    }

    fn synthesize(&self) -> Result<Template> {
        let mut template = Template::new(self.description());

        self.bucket.add_to(&mut template)?;
        self.pipeline_role.add_to(&mut template)?;
        self.build_role.add_to(&mut template)?;
        for project in &self.projects {
            project.add_to(&mut template)?;
        }
        self.notifications.add_to(&mut template)?;
        self.approval_topic.add_to(&mut template)?;
        if let Some(slack) = &self.slack {
            slack.add_to(&mut template)?;
        }

        let emitted = PipelineEmitter::new()
            .with_role_policy(self.pipeline_role.policy_logical_id())
            .emit(&self.pipeline)?;
        template.extend_resources(emitted)?;

        tracing::info!(
            stack = %self.stack_name,
            resources = template.resources.len(),
            "Synthesized pipeline stack"
        );
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PipelineStackConfig {
        PipelineStackConfig {
            git_owner: "ndlib".to_string(),
            git_token_path: "/all/github/ndlib-git".to_string(),
            service_repository: "classes-api".to_string(),
            service_branch: "main".to_string(),
            blueprints_repository: "classes-api-blueprints".to_string(),
            blueprints_branch: "main".to_string(),
            email_receivers: "a@nd.edu".to_string(),
            slack_notify_stack_name: None,
            contact: "me@nd.edu".to_string(),
            owner: "WSE".to_string(),
            sentry_token_path: "/all/sentry/token".to_string(),
            sentry_org: "ndlib".to_string(),
            sentry_project: "classes-api".to_string(),
            stack_name: None,
            test_stage: StageName::test(),
            prod_stage: StageName::prod(),
        }
    }

    #[test]
    fn test_default_stack_name() {
        let stack = PipelineStack::new(&config(), StageSet::default(), &SynthContext::default()).unwrap();
        assert_eq!(stack.stack_name(), "classesAPI-pipeline");
        assert!(!stack.relays_approvals());
    }

    #[test]
    fn test_uncovered_stage_is_rejected() {
        let stages = StageSet::new(["test"]).unwrap();
        let err = PipelineStack::new(&config(), stages, &SynthContext::default()).unwrap_err();
        assert!(matches!(err, Error::UncoveredStage { ref stage, .. } if stage == "prod"));
    }

    #[test]
    fn test_same_test_and_prod_stage_is_rejected() {
        let mut config = config();
        config.prod_stage = StageName::test();
        assert!(matches!(
            PipelineStack::new(&config, StageSet::default(), &SynthContext::default()),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_blank_owner_is_rejected() {
        let mut config = config();
        config.git_owner = " ".to_string();
        assert!(matches!(
            PipelineStack::new(&config, StageSet::default(), &SynthContext::default()),
            Err(Error::MissingField {
                field: "git_owner",
                ..
            })
        ));
    }

    #[test]
    fn test_source_token_is_secret_reference() {
        let stack = PipelineStack::new(&config(), StageSet::default(), &SynthContext::default()).unwrap();
        let source = &stack.pipeline_definition().stages[0].actions[0];
        match &source.kind {
            crate::schema::ActionKind::GitHubSource(github) => assert_eq!(
                github.oauth_token,
                "{{resolve:secretsmanager:/all/github/ndlib-git:SecretString:oauth::}}"
            ),
            other => panic!("unexpected kind: {other:?}"),
        }
    }
}
