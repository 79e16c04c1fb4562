//! Role Definition
//!
//! Wraps permission statements into an identity a service principal may
//! assume. A role emits an `AWS::IAM::Role` and, when it carries
//! statements, an `AWS::IAM::Policy` attached to it.

use crate::policy::PolicyAssembler;
use crate::statement::{BucketRef, Concern, PolicyStatement, ResourcePattern};
use blueprints_core::template::validate_logical_id;
use blueprints_core::{Error, Resource, Result, Template, intrinsic};
use serde_json::{Value, json};
use std::collections::HashSet;

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// Service allowed to assume a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicePrincipal {
    /// Build projects
    CodeBuild,
    /// Pipelines
    CodePipeline,
    /// Compute functions
    Lambda,
    /// Routing layer (account-level logging)
    ApiGateway,
}

impl ServicePrincipal {
    /// Principal service name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CodeBuild => "codebuild.amazonaws.com",
            Self::CodePipeline => "codepipeline.amazonaws.com",
            Self::Lambda => "lambda.amazonaws.com",
            Self::ApiGateway => "apigateway.amazonaws.com",
        }
    }
}

/// An assumable identity carrying a fixed permission set.
#[derive(Debug, Clone)]
pub struct Role {
    logical_id: String,
    principal: ServicePrincipal,
    statements: Vec<PolicyStatement>,
    managed_policies: Vec<String>,
}

impl Role {
    /// Create a role without statements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLogicalId`] for an unusable logical id.
    pub fn new(logical_id: impl Into<String>, principal: ServicePrincipal) -> Result<Self> {
        let logical_id = logical_id.into();
        validate_logical_id(&logical_id)?;
        Ok(Self {
            logical_id,
            principal,
            statements: Vec::new(),
            managed_policies: Vec::new(),
        })
    }

    /// The pipeline's build identity, carrying exactly the assembled
    /// statements.
    ///
    /// # Errors
    ///
    /// Fails if the logical id is invalid.
    pub fn build_role(logical_id: impl Into<String>, assembler: &PolicyAssembler) -> Result<Self> {
        let mut role = Self::new(logical_id, ServicePrincipal::CodeBuild)?;
        role.statements = assembler.assemble();
        tracing::debug!(
            role = %role.logical_id,
            statements = role.statements.len(),
            stages = assembler.stages().len(),
            "Build role assembled"
        );
        Ok(role)
    }

    /// The pipeline engine's identity: artifact bucket access, starting and
    /// inspecting the given build projects, publishing to the given topics.
    ///
    /// # Errors
    ///
    /// Fails if the logical id is invalid or no build project is given.
    pub fn pipeline_role(
        logical_id: impl Into<String>,
        bucket: &BucketRef,
        build_projects: &[&str],
        topics: &[&str],
    ) -> Result<Self> {
        if build_projects.is_empty() {
            return Err(Error::invalid_config(
                "pipeline role",
                "at least one build project is required",
            ));
        }
        let mut role = Self::new(logical_id, ServicePrincipal::CodePipeline)?;
        role.statements.push(PolicyStatement::new(
            Concern::StorageBuckets,
            &["s3:GetBucketLocation", "s3:ListBucket"],
            vec![bucket.bucket_pattern()],
        ));
        role.statements.push(PolicyStatement::new(
            Concern::StorageObjects,
            &["s3:GetObject", "s3:GetObjectVersion", "s3:PutObject"],
            vec![bucket.objects_pattern()],
        ));
        role.statements.push(PolicyStatement::new(
            Concern::BuildExecution,
            &[
                "codebuild:StartBuild",
                "codebuild:BatchGetBuilds",
                "codebuild:StopBuild",
            ],
            build_projects
                .iter()
                .map(|id| ResourcePattern::arn_of(*id))
                .collect(),
        ));
        if !topics.is_empty() {
            role.statements.push(PolicyStatement::new(
                Concern::Notification,
                &["sns:Publish"],
                topics
                    .iter()
                    .map(|id| ResourcePattern::Reference((*id).to_string()))
                    .collect(),
            ));
        }
        Ok(role)
    }

    /// Add a statement
    #[must_use]
    pub fn with_statement(mut self, statement: PolicyStatement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Attach an AWS managed policy by name, e.g.
    /// `service-role/AWSLambdaBasicExecutionRole`
    #[must_use]
    pub fn with_managed_policy(mut self, name: impl Into<String>) -> Self {
        self.managed_policies.push(name.into());
        self
    }

    /// Logical id of the role resource
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Logical id of the attached inline policy resource
    #[must_use]
    pub fn policy_logical_id(&self) -> String {
        format!("{}DefaultPolicy", self.logical_id)
    }

    /// Assuming principal
    #[must_use]
    pub const fn principal(&self) -> ServicePrincipal {
        self.principal
    }

    /// Statements in emission order
    #[must_use]
    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statements
    }

    /// `Fn::GetAtt` of the role ARN
    #[must_use]
    pub fn arn(&self) -> Value {
        intrinsic::get_att(&self.logical_id, "Arn")
    }

    /// Check every statement and that statement ids are unique.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every violation.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();
        let mut sids = HashSet::new();
        for statement in &self.statements {
            if !sids.insert(statement.sid.as_str()) {
                violations.push(format!("statement id '{}' is used twice", statement.sid));
            }
            if let Err(Error::Validation {
                violations: inner, ..
            }) = statement.validate()
            {
                violations.extend(inner.into_iter().map(|v| format!("{}: {v}", statement.sid)));
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                component: format!("role {}", self.logical_id),
                violations,
            })
        }
    }

    /// Role and policy resources keyed by logical id.
    ///
    /// # Errors
    ///
    /// Fails validation before anything is produced.
    pub fn resources(&self) -> Result<Vec<(String, Resource)>> {
        self.validate()?;

        let mut properties = json!({
            "AssumeRolePolicyDocument": {
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": self.principal.as_str() },
                    "Action": "sts:AssumeRole"
                }]
            }
        });
        if !self.managed_policies.is_empty() {
            properties["ManagedPolicyArns"] = Value::Array(
                self.managed_policies
                    .iter()
                    .map(|name| intrinsic::sub(&format!("arn:${{AWS::Partition}}:iam::aws:policy/{name}")))
                    .collect(),
            );
        }

        let mut resources = vec![(
            self.logical_id.clone(),
            Resource::new("AWS::IAM::Role", properties),
        )];

        if !self.statements.is_empty() {
            resources.push((
                self.policy_logical_id(),
                Resource::new(
                    "AWS::IAM::Policy",
                    json!({
                        "PolicyName": self.policy_logical_id(),
                        "PolicyDocument": {
                            "Version": POLICY_VERSION,
                            "Statement": self.statements.iter().map(PolicyStatement::to_value).collect::<Vec<_>>()
                        },
                        "Roles": [intrinsic::reference(&self.logical_id)]
                    }),
                ),
            ));
        }
        Ok(resources)
    }

    /// Add the role's resources to a template.
    ///
    /// # Errors
    ///
    /// Fails validation or on a logical id collision.
    pub fn add_to(&self, template: &mut Template) -> Result<()> {
        template.extend_resources(self.resources()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprints_core::{StageSet, SynthContext};

    #[test]
    fn test_role_emits_trust_policy() {
        let role = Role::new("CodePipelineRole", ServicePrincipal::CodePipeline).unwrap();
        let resources = role.resources().unwrap();
        assert_eq!(resources.len(), 1);
        let (id, resource) = &resources[0];
        assert_eq!(id, "CodePipelineRole");
        assert_eq!(
            resource.properties["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            "codepipeline.amazonaws.com"
        );
    }

    #[test]
    fn test_build_role_carries_exactly_assembled_statements() {
        let assembler = PolicyAssembler::new(
            "CodeBuildTrustRole",
            StageSet::default(),
            BucketRef::managed("ArtifactBucket"),
            &SynthContext::default(),
        )
        .unwrap();
        let role = Role::build_role("CodeBuildTrustRole", &assembler).unwrap();
        assert_eq!(role.statements(), assembler.assemble().as_slice());

        let resources = role.resources().unwrap();
        let (policy_id, policy) = &resources[1];
        assert_eq!(policy_id, "CodeBuildTrustRoleDefaultPolicy");
        assert_eq!(policy.resource_type, "AWS::IAM::Policy");
        assert_eq!(
            policy.properties["PolicyDocument"]["Statement"]
                .as_array()
                .unwrap()
                .len(),
            role.statements().len()
        );
        assert_eq!(
            policy.properties["Roles"][0],
            json!({ "Ref": "CodeBuildTrustRole" })
        );
    }

    #[test]
    fn test_pipeline_role_grants() {
        let role = Role::pipeline_role(
            "CodePipelineRole",
            &BucketRef::managed("ArtifactBucket"),
            &["DeployTestProject", "SmokeTestProject"],
            &["PipelineApprovalTopic"],
        )
        .unwrap();
        let concerns: Vec<_> = role.statements().iter().map(|s| s.concern).collect();
        assert_eq!(
            concerns,
            vec![
                Concern::StorageBuckets,
                Concern::StorageObjects,
                Concern::BuildExecution,
                Concern::Notification
            ]
        );
        assert!(role.statements()[2].covers("${SmokeTestProject.Arn}"));
        assert!(role.statements()[3].covers("${PipelineApprovalTopic}"));
        role.validate().unwrap();
    }

    #[test]
    fn test_pipeline_role_requires_projects() {
        let result = Role::pipeline_role(
            "CodePipelineRole",
            &BucketRef::managed("ArtifactBucket"),
            &[],
            &[],
        );
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_duplicate_sids_rejected() {
        let statement = PolicyStatement::new(
            Concern::Notification,
            &["sns:Publish"],
            vec![ResourcePattern::Reference("Topic".to_string())],
        );
        let role = Role::new("Role", ServicePrincipal::Lambda)
            .unwrap()
            .with_statement(statement.clone())
            .with_statement(statement);
        let err = role.resources().unwrap_err();
        assert!(err.to_string().contains("used twice"));
    }

    #[test]
    fn test_managed_policy_arns() {
        let role = Role::new("ServiceRole", ServicePrincipal::Lambda)
            .unwrap()
            .with_managed_policy("service-role/AWSLambdaBasicExecutionRole");
        let resources = role.resources().unwrap();
        assert_eq!(
            resources[0].1.properties["ManagedPolicyArns"][0],
            json!({
                "Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"
            })
        );
    }

    #[test]
    fn test_invalid_logical_id() {
        assert!(Role::new("Code-Build", ServicePrincipal::CodeBuild).is_err());
    }
}
