//! Policy Assembler
//!
//! Builds the least-privilege statements of the pipeline's build identity.
//! Statements come out in a fixed order, one per concern, and are never
//! merged even when their resource patterns coincide.

use crate::statement::{BucketRef, Concern, PolicyStatement, ResourcePattern};
use blueprints_core::arn::{self, Locator, STACK_NAME};
use blueprints_core::context::{self, SynthContext};
use blueprints_core::{Error, Result, StageSet};

/// Namespaces the assembler grants access to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyNaming {
    /// Root of the parameter namespace, e.g. `/all`
    pub parameter_root: String,
    /// Application namespace the build may write, e.g. `classesAPI`
    pub app_namespace: String,
    /// Namespaces under the root the build may read
    pub readable_parameter_prefixes: Vec<String>,
    /// Secret name prefix the build may read
    pub secret_prefix: String,
    /// Name of the deployment tool's bootstrap stack
    pub bootstrap_stack: String,
    /// Bucket name pattern of the bootstrap staging bucket
    pub staging_bucket_pattern: String,
}

impl Default for PolicyNaming {
    fn default() -> Self {
        Self::from_context(&SynthContext::default())
    }
}

impl PolicyNaming {
    /// Naming derived from the synthesis context
    #[must_use]
    pub fn from_context(ctx: &SynthContext) -> Self {
        Self {
            parameter_root: ctx.parameter_root.clone(),
            app_namespace: ctx.application.clone(),
            readable_parameter_prefixes: vec![
                ctx.application.clone(),
                "sentry".to_string(),
                "github".to_string(),
            ],
            secret_prefix: ctx.app_namespace(),
            bootstrap_stack: "CDKToolkit".to_string(),
            staging_bucket_pattern: "cdktoolkit-stagingbucket-*".to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("parameter root", self.parameter_root.as_str()),
            ("application namespace", self.app_namespace.as_str()),
            ("secret prefix", self.secret_prefix.as_str()),
            ("bootstrap stack", self.bootstrap_stack.as_str()),
            ("staging bucket pattern", self.staging_bucket_pattern.as_str()),
        ];
        let readable = self
            .readable_parameter_prefixes
            .iter()
            .map(|p| ("readable parameter prefix", p.as_str()));
        context::validate_parameter_root(&self.parameter_root)?;

        for (field, value) in fields.into_iter().chain(readable) {
            if value.trim().is_empty() {
                return Err(Error::invalid_config(
                    "policy naming",
                    format!("{field} must not be empty"),
                ));
            }
            if arn::needs_substitution(value) {
                return Err(Error::malformed(
                    value,
                    format!("{field} must not contain placeholders"),
                ));
            }
        }
        if self.readable_parameter_prefixes.is_empty() {
            return Err(Error::invalid_config(
                "policy naming",
                "at least one readable parameter prefix is required",
            ));
        }
        Ok(())
    }
}

/// Assembles the build identity's permission statements.
#[derive(Debug, Clone)]
pub struct PolicyAssembler {
    role_logical_id: String,
    stages: StageSet,
    bucket: BucketRef,
    service_stack_prefix: String,
    naming: PolicyNaming,
    region: Locator,
    account: Locator,
}

impl PolicyAssembler {
    /// Create an assembler for the role `role_logical_id`.
    ///
    /// # Errors
    ///
    /// Fails when the service stack prefix or a namespace is blank or carries
    /// placeholders, or when the parameter root is not an absolute path.
    pub fn new(
        role_logical_id: impl Into<String>,
        stages: StageSet,
        bucket: BucketRef,
        ctx: &SynthContext,
    ) -> Result<Self> {
        Self::with_naming(role_logical_id, stages, bucket, ctx, PolicyNaming::from_context(ctx))
    }

    /// Create an assembler with explicit namespaces.
    ///
    /// # Errors
    ///
    /// See [`PolicyAssembler::new`].
    pub fn with_naming(
        role_logical_id: impl Into<String>,
        stages: StageSet,
        bucket: BucketRef,
        ctx: &SynthContext,
        naming: PolicyNaming,
    ) -> Result<Self> {
        let role_logical_id = role_logical_id.into();
        blueprints_core::template::validate_logical_id(&role_logical_id)?;
        ctx.validate()?;
        blueprints_core::error::require(
            "policy assembler",
            "service_stack_prefix",
            &ctx.service_stack_prefix,
        )?;
        if arn::needs_substitution(&ctx.service_stack_prefix) {
            return Err(Error::malformed(
                ctx.service_stack_prefix.clone(),
                "service stack prefix must not contain placeholders",
            ));
        }
        naming.validate()?;

        Ok(Self {
            role_logical_id,
            stages,
            bucket,
            service_stack_prefix: ctx.service_stack_prefix.clone(),
            naming,
            region: ctx.region_locator(),
            account: ctx.account_locator(),
        })
    }

    /// Stages covered by the assembled statements
    #[must_use]
    pub fn stages(&self) -> &StageSet {
        &self.stages
    }

    /// Service stack names, one per stage
    #[must_use]
    pub fn service_stacks(&self) -> Vec<String> {
        self.stages
            .iter()
            .map(|stage| format!("{}-{stage}", self.service_stack_prefix))
            .collect()
    }

    /// Produce the complete, ordered statement list.
    #[must_use]
    pub fn assemble(&self) -> Vec<PolicyStatement> {
        let stacks = self.service_stacks();
        let naming = &self.naming;

        let statements = vec![
            PolicyStatement::new(
                Concern::SelfIntrospection,
                &["iam:GetRolePolicy"],
                vec![ResourcePattern::arn_of(self.role_logical_id.clone())],
            ),
            PolicyStatement::new(
                Concern::IamRoles,
                &[
                    "iam:GetRole",
                    "iam:GetRolePolicy",
                    "iam:CreateRole",
                    "iam:DeleteRole",
                    "iam:DeleteRolePolicy",
                    "iam:AttachRolePolicy",
                    "iam:DetachRolePolicy",
                    "iam:PutRolePolicy",
                    "iam:PassRole",
                    "iam:TagRole",
                ],
                stacks
                    .iter()
                    .map(|stack| self.pattern("iam", &Locator::Omitted, &["role/", stack.as_str(), "*"]))
                    .collect(),
            ),
            PolicyStatement::new(
                Concern::AccountWideRead,
                &["cloudformation:ListExports"],
                vec![ResourcePattern::any()],
            ),
            PolicyStatement::new(
                Concern::LogStreams,
                &["logs:CreateLogGroup", "logs:CreateLogStream"],
                vec![self.regional("logs", &["log-group:/aws/codebuild/", STACK_NAME, "-*"])],
            ),
            PolicyStatement::new(
                Concern::LogEvents,
                &["logs:PutLogEvents"],
                vec![self.regional(
                    "logs",
                    &["log-group:/aws/codebuild/", STACK_NAME, "-*:log-stream:*"],
                )],
            ),
            PolicyStatement::new(
                Concern::StorageBuckets,
                &[
                    "s3:ListBucket",
                    "s3:ListBucketVersions",
                    "s3:GetBucketLocation",
                    "s3:GetBucketPolicy",
                ],
                vec![self.bucket.bucket_pattern(), self.staging(&[])],
            ),
            PolicyStatement::new(
                Concern::StorageObjects,
                &["s3:GetObject", "s3:PutObject"],
                vec![self.bucket.objects_pattern(), self.staging(&["/*"])],
            ),
            PolicyStatement::new(
                Concern::ComputeFunctions,
                &["lambda:*"],
                stacks
                    .iter()
                    .map(|stack| self.regional("lambda", &["function:", stack.as_str(), "*"]))
                    .collect(),
            ),
            PolicyStatement::new(
                Concern::DeploymentLifecycle,
                &[
                    "cloudformation:DescribeStacks",
                    "cloudformation:DescribeStackEvents",
                    "cloudformation:DescribeChangeSet",
                    "cloudformation:CreateChangeSet",
                    "cloudformation:ExecuteChangeSet",
                    "cloudformation:DeleteChangeSet",
                    "cloudformation:DeleteStack",
                    "cloudformation:GetTemplate",
                ],
                stacks
                    .iter()
                    .map(|stack| self.regional("cloudformation", &["stack/", stack.as_str(), "/*"]))
                    .collect(),
            ),
            PolicyStatement::new(
                Concern::BootstrapStatus,
                &["cloudformation:DescribeStacks"],
                vec![self.regional(
                    "cloudformation",
                    &["stack/", naming.bootstrap_stack.as_str(), "/*"],
                )],
            ),
            PolicyStatement::new(
                Concern::RoutingAccount,
                &["apigateway:PATCH"],
                vec![self.routing(&["/account"])],
            ),
            PolicyStatement::new(
                Concern::RoutingCreate,
                &["apigateway:POST"],
                vec![self.routing(&["/restapis"]), self.routing(&["/domainnames"])],
            ),
            PolicyStatement::new(
                Concern::RoutingInstances,
                &["apigateway:*"],
                vec![self.routing(&["/restapis/*"])],
            ),
            PolicyStatement::new(
                Concern::ConfigRead,
                &[
                    "ssm:GetParametersByPath",
                    "ssm:GetParameter",
                    "ssm:GetParameters",
                ],
                naming
                    .readable_parameter_prefixes
                    .iter()
                    .map(|prefix| self.parameters(prefix))
                    .collect(),
            ),
            PolicyStatement::new(
                Concern::SecretRead,
                &[
                    "secretsmanager:GetSecretValue",
                    "secretsmanager:DescribeSecret",
                    "secretsmanager:ListSecretVersionIds",
                ],
                vec![self.regional("secretsmanager", &["secret:", naming.secret_prefix.as_str(), "*"])],
            ),
            PolicyStatement::new(
                Concern::ConfigWrite,
                &[
                    "ssm:PutParameter",
                    "ssm:DeleteParameter",
                    "ssm:AddTagsToResource",
                    "ssm:RemoveTagsFromResource",
                ],
                vec![self.parameters(&naming.app_namespace)],
            ),
        ];

        for statement in &statements {
            tracing::debug!(
                sid = %statement.sid,
                actions = statement.actions.len(),
                resources = statement.resources.len(),
                "Assembled statement"
            );
        }
        statements
    }

    fn pattern(&self, service: &str, region: &Locator, fragments: &[&str]) -> ResourcePattern {
        ResourcePattern::templated(arn::arn(service, region, &self.account, fragments))
    }

    fn regional(&self, service: &str, fragments: &[&str]) -> ResourcePattern {
        self.pattern(service, &self.region, fragments)
    }

    fn routing(&self, fragments: &[&str]) -> ResourcePattern {
        ResourcePattern::templated(arn::arn(
            "apigateway",
            &self.region,
            &Locator::Omitted,
            fragments,
        ))
    }

    fn staging(&self, suffix: &[&str]) -> ResourcePattern {
        let mut fragments = vec![self.naming.staging_bucket_pattern.as_str()];
        fragments.extend_from_slice(suffix);
        ResourcePattern::templated(arn::arn(
            "s3",
            &Locator::Omitted,
            &Locator::Omitted,
            &fragments,
        ))
    }

    fn parameters(&self, namespace: &str) -> ResourcePattern {
        self.regional(
            "ssm",
            &["parameter", self.naming.parameter_root.as_str(), "/", namespace, "/*"],
        )
    }
}
