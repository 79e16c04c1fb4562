//! Build Task Definitions
//!
//! Two build project variants run inside the pipeline: the deployment build,
//! which deploys one stage of the service, and the smoke test, which runs
//! the API collection against a deployed stage.

use crate::buildspec::{BuildSpec, Phase};
use blueprints_core::error::require;
use blueprints_core::template::validate_logical_id;
use blueprints_core::{Error, Resource, Result, StageName, SynthContext, Template, intrinsic};
use serde::Serialize;
use serde_json::{Value, json};

/// Build image used by every project
pub const BUILD_IMAGE: &str = "aws/codebuild/standard:4.0";

/// Compute size used by every project
pub const COMPUTE_TYPE: &str = "BUILD_GENERAL1_SMALL";

/// Node runtime pinned in the install phase
pub const NODE_RUNTIME: &str = "12.x";

/// Test collection run by the smoke test
pub const SMOKE_TEST_COLLECTION: &str = "./spec/postman/qa_collection.json";

/// Where a build variable's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableSource {
    /// The value itself
    Plaintext,
    /// A parameter store path, resolved when the build starts
    ParameterStore,
    /// A secret reference, resolved when the build starts
    SecretsManager,
}

/// A build environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentVariable {
    /// Variable name
    pub name: String,
    /// Value source
    #[serde(rename = "Type")]
    pub source: VariableSource,
    /// Value, parameter path or secret reference
    pub value: String,
}

impl EnvironmentVariable {
    /// A literal value
    #[must_use]
    pub fn plaintext(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: VariableSource::Plaintext,
            value: value.into(),
        }
    }

    /// A value resolved from the parameter store
    #[must_use]
    pub fn parameter_store(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: VariableSource::ParameterStore,
            value: path.into(),
        }
    }

    /// A value resolved from a secret
    #[must_use]
    pub fn secrets_manager(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: VariableSource::SecretsManager,
            value: secret.into(),
        }
    }
}

/// Which build this project runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    /// Deploys the service to a stage
    Deployment,
    /// Runs the smoke test collection against a stage
    SmokeTest,
}

/// Inputs of the deployment build.
#[derive(Debug, Clone)]
pub struct DeploymentProps {
    /// Stage to deploy
    pub stage: StageName,
    /// Application repository name
    pub service_repository: String,
    /// Application branch
    pub service_branch: String,
    /// Infrastructure repository name
    pub blueprints_repository: String,
    /// Infrastructure branch
    pub blueprints_branch: String,
    /// Contact tag value
    pub contact: String,
    /// Owner tag value
    pub owner: String,
    /// Parameter store path of the sentry auth token
    pub sentry_token_path: String,
    /// Sentry organisation
    pub sentry_org: String,
    /// Sentry project
    pub sentry_project: String,
}

impl DeploymentProps {
    fn validate(&self) -> Result<()> {
        const COMPONENT: &str = "deployment build";
        require(COMPONENT, "service_repository", &self.service_repository)?;
        require(COMPONENT, "service_branch", &self.service_branch)?;
        require(COMPONENT, "blueprints_repository", &self.blueprints_repository)?;
        require(COMPONENT, "blueprints_branch", &self.blueprints_branch)?;
        require(COMPONENT, "contact", &self.contact)?;
        require(COMPONENT, "owner", &self.owner)?;
        require(COMPONENT, "sentry_token_path", &self.sentry_token_path)?;
        require(COMPONENT, "sentry_org", &self.sentry_org)?;
        require(COMPONENT, "sentry_project", &self.sentry_project)?;
        if !self.sentry_token_path.starts_with('/') {
            return Err(Error::invalid_config(
                COMPONENT,
                format!(
                    "sentry_token_path '{}' must be an absolute parameter path",
                    self.sentry_token_path
                ),
            ));
        }
        Ok(())
    }
}

/// A containerized build task.
#[derive(Debug, Clone)]
pub struct BuildProject {
    logical_id: String,
    kind: ProjectKind,
    stage: StageName,
    description: String,
    role_logical_id: String,
    environment: Vec<EnvironmentVariable>,
    buildspec: BuildSpec,
}

impl BuildProject {
    /// The deployment build for one stage.
    ///
    /// The commit being deployed arrives through the action-level `VERSION`
    /// variable, so the project itself does not pin one.
    ///
    /// # Errors
    ///
    /// Fails on a blank required field or an invalid logical id.
    pub fn deployment(
        logical_id: impl Into<String>,
        role_logical_id: impl Into<String>,
        props: &DeploymentProps,
        ctx: &SynthContext,
    ) -> Result<Self> {
        props.validate()?;
        let stage = props.stage.clone();
        let stack_name = ctx.service_stack_name(&stage);
        let endpoint_parameter = ctx.stage_parameter(&stage, "api-url");
        let release = format!("{}@$VERSION", props.sentry_project);

        let environment = vec![
            EnvironmentVariable::plaintext("STAGE", stage.as_str()),
            EnvironmentVariable::plaintext("CONTACT", &props.contact),
            EnvironmentVariable::plaintext("OWNER", &props.owner),
            EnvironmentVariable::plaintext("SENTRY_ORG", &props.sentry_org),
            EnvironmentVariable::plaintext("SENTRY_PROJECT", &props.sentry_project),
            EnvironmentVariable::parameter_store("SENTRY_AUTH_TOKEN", &props.sentry_token_path),
        ];

        let buildspec = BuildSpec::new()
            .install(
                Phase::new([
                    "cd $CODEBUILD_SRC_DIR_InfraCode/deploy/cdk",
                    "npm install -g aws-cdk @sentry/cli",
                    "npm install",
                ])
                .runtime("nodejs", NODE_RUNTIME),
            )
            .pre_build(Phase::new([format!(
                "echo \"Deploying {stack_name} at $VERSION from {}@{} with {}@{}\"",
                props.service_repository,
                props.service_branch,
                props.blueprints_repository,
                props.blueprints_branch
            )]))
            .build(Phase::new([
                "cd $CODEBUILD_SRC_DIR_InfraCode/deploy/cdk".to_string(),
                format!(
                    "npx cdk deploy {stack_name} --require-approval never --exclusively \
                     -c stage=$STAGE -c serviceStackName={} -c sentryVersion=$VERSION \
                     -c lambdaCodePath=$CODEBUILD_SRC_DIR/src -c contact=$CONTACT -c owner=$OWNER",
                    ctx.service_stack_prefix
                ),
            ]))
            .post_build(Phase::new([
                format!(
                    "ENDPOINT=$(aws cloudformation describe-stacks --stack-name {stack_name} \
                     --query \"Stacks[0].Outputs[?ExportName=='{stack_name}-api-url'].OutputValue\" --output text)"
                ),
                format!(
                    "aws ssm put-parameter --name {endpoint_parameter} --type String --overwrite --value \"$ENDPOINT\""
                ),
                format!("sentry-cli releases new -p $SENTRY_PROJECT {release}"),
                format!("sentry-cli releases finalize {release}"),
                format!("sentry-cli releases deploys {release} new -e $STAGE"),
            ]));

        Self::new(
            logical_id,
            ProjectKind::Deployment,
            stage,
            format!("Deploys {stack_name}"),
            role_logical_id,
            environment,
            buildspec,
        )
    }

    /// The smoke test against one stage.
    ///
    /// A failing collection fails the build; nothing is retried.
    ///
    /// # Errors
    ///
    /// Fails on an invalid logical id.
    pub fn smoke_test(
        logical_id: impl Into<String>,
        role_logical_id: impl Into<String>,
        stage: &StageName,
        ctx: &SynthContext,
    ) -> Result<Self> {
        let environment = vec![EnvironmentVariable::parameter_store(
            "API_URL",
            ctx.stage_parameter(stage, "api-url"),
        )];

        let buildspec = BuildSpec::new()
            .install(
                Phase::new([
                    "npm install -g newman",
                    "echo \"Ensure that the Newman spec is readable\"",
                    "chmod -R 755 ./spec/postman/*",
                ])
                .runtime("nodejs", NODE_RUNTIME),
            )
            .build(Phase::new([
                "echo \"Beginning tests at `date`\"".to_string(),
                format!("newman run {SMOKE_TEST_COLLECTION} --env-var classesApiUrl=$API_URL"),
            ]));

        Self::new(
            logical_id,
            ProjectKind::SmokeTest,
            stage.clone(),
            format!("Smoke tests {}", ctx.service_stack_name(stage)),
            role_logical_id,
            environment,
            buildspec,
        )
    }

    fn new(
        logical_id: impl Into<String>,
        kind: ProjectKind,
        stage: StageName,
        description: String,
        role_logical_id: impl Into<String>,
        environment: Vec<EnvironmentVariable>,
        buildspec: BuildSpec,
    ) -> Result<Self> {
        let logical_id = logical_id.into();
        let role_logical_id = role_logical_id.into();
        validate_logical_id(&logical_id)?;
        validate_logical_id(&role_logical_id)?;
        buildspec.validate()?;
        Ok(Self {
            logical_id,
            kind,
            stage,
            description,
            role_logical_id,
            environment,
            buildspec,
        })
    }

    /// Logical id of the project resource
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Build variant
    #[must_use]
    pub const fn kind(&self) -> ProjectKind {
        self.kind
    }

    /// Stage this project deploys or tests
    #[must_use]
    pub const fn stage(&self) -> &StageName {
        &self.stage
    }

    /// Project-level environment
    #[must_use]
    pub fn environment(&self) -> &[EnvironmentVariable] {
        &self.environment
    }

    /// Look up a project-level variable
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&EnvironmentVariable> {
        self.environment.iter().find(|v| v.name == name)
    }

    /// Command sequence
    #[must_use]
    pub const fn buildspec(&self) -> &BuildSpec {
        &self.buildspec
    }

    /// The `AWS::CodeBuild::Project` resource.
    ///
    /// # Errors
    ///
    /// Fails if the buildspec cannot be rendered.
    pub fn to_resource(&self) -> Result<Resource> {
        let environment: Vec<Value> = self
            .environment
            .iter()
            .map(|v| serde_json::to_value(v).map_err(Error::serialization))
            .collect::<Result<_>>()?;

        Ok(Resource::new(
            "AWS::CodeBuild::Project",
            json!({
                "Description": self.description,
                "ServiceRole": intrinsic::get_att(&self.role_logical_id, "Arn"),
                "Source": {
                    "Type": "CODEPIPELINE",
                    "BuildSpec": self.buildspec.to_json_string()?
                },
                "Artifacts": { "Type": "CODEPIPELINE" },
                "Environment": {
                    "Type": "LINUX_CONTAINER",
                    "Image": BUILD_IMAGE,
                    "ComputeType": COMPUTE_TYPE,
                    "PrivilegedMode": false,
                    "EnvironmentVariables": environment
                }
            }),
        )
        .depends_on(format!("{}DefaultPolicy", self.role_logical_id)))
    }

    /// Add the project to a template.
    ///
    /// # Errors
    ///
    /// Fails on rendering or a logical id collision.
    pub fn add_to(&self, template: &mut Template) -> Result<()> {
        template.add_resource(self.logical_id.clone(), self.to_resource()?)
    }
}
