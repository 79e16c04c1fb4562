//! Pipeline Emitter
//!
//! Turns a validated [`Pipeline`] into an `AWS::CodePipeline::Pipeline`
//! resource plus one `AWS::CodePipeline::Webhook` per webhook-triggered
//! source.
//!
//! Stages keep their declaration order. Actions inside a stage are emitted
//! sorted by run-order, so an approval declared first still runs last.

use crate::schema::{Action, ActionKind, GitHubSource, Pipeline, SourceTrigger};
use crate::validation::PipelineValidator;
use blueprints_core::{Error, Resource, Result, intrinsic};
use serde_json::{Map, Value, json};

/// Secret header used to authenticate webhook deliveries
pub const WEBHOOK_AUTHENTICATION: &str = "GITHUB_HMAC";

/// Emits pipeline resources.
#[derive(Debug, Clone, Default)]
pub struct PipelineEmitter {
    role_policy: Option<String>,
}

impl PipelineEmitter {
    /// Create an emitter
    #[must_use]
    pub const fn new() -> Self {
        Self { role_policy: None }
    }

    /// Make the pipeline depend on the pipeline role's policy resource
    #[must_use]
    pub fn with_role_policy(mut self, policy_logical_id: impl Into<String>) -> Self {
        self.role_policy = Some(policy_logical_id.into());
        self
    }

    /// Validate and emit the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every structural violation.
    pub fn emit(&self, pipeline: &Pipeline) -> Result<Vec<(String, Resource)>> {
        PipelineValidator::new(pipeline)
            .validate()
            .map_err(|errors| Error::Validation {
                component: format!("pipeline {}", pipeline.logical_id),
                violations: errors.iter().map(ToString::to_string).collect(),
            })?;

        let stages: Vec<Value> = pipeline
            .stages
            .iter()
            .map(|stage| {
                json!({
                    "Name": stage.name,
                    "Actions": stage
                        .ordered_actions()
                        .into_iter()
                        .map(emit_action)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut resource = Resource::new(
            "AWS::CodePipeline::Pipeline",
            json!({
                "RoleArn": intrinsic::get_att(&pipeline.role, "Arn"),
                "ArtifactStore": {
                    "Type": "S3",
                    "Location": intrinsic::reference(&pipeline.artifact_bucket)
                },
                "RestartExecutionOnUpdate": false,
                "Stages": stages
            }),
        )
        .depends_on(pipeline.role.clone());
        if let Some(policy) = &self.role_policy {
            resource = resource.depends_on(policy.clone());
        }

        let mut resources = vec![(pipeline.logical_id.clone(), resource)];

        for (_, action) in pipeline.actions() {
            if let ActionKind::GitHubSource(source) = &action.kind
                && source.trigger == SourceTrigger::Webhook
            {
                resources.push((
                    webhook_logical_id(&pipeline.logical_id, &action.name),
                    emit_webhook(pipeline, action, source),
                ));
            }
        }

        tracing::debug!(
            pipeline = %pipeline.logical_id,
            stages = pipeline.stages.len(),
            resources = resources.len(),
            "Pipeline emitted"
        );
        Ok(resources)
    }
}

/// `<Pipeline><Action>Webhook`, non-alphanumeric characters dropped
#[must_use]
pub fn webhook_logical_id(pipeline: &str, action: &str) -> String {
    let action: String = action.chars().filter(char::is_ascii_alphanumeric).collect();
    format!("{pipeline}{action}Webhook")
}

fn action_type(category: &str, owner: &str, provider: &str) -> Value {
    json!({
        "Category": category,
        "Owner": owner,
        "Provider": provider,
        "Version": "1"
    })
}

fn artifacts(list: &[crate::schema::Artifact]) -> Value {
    Value::Array(
        list.iter()
            .map(|artifact| json!({ "Name": artifact.name() }))
            .collect(),
    )
}

fn emit_action(action: &Action) -> Value {
    let (type_id, configuration) = match &action.kind {
        ActionKind::GitHubSource(source) => (
            action_type("Source", "ThirdParty", "GitHub"),
            json!({
                "Owner": source.owner,
                "Repo": source.repo,
                "Branch": source.branch,
                "OAuthToken": source.oauth_token,
                "PollForSourceChanges": false
            }),
        ),
        ActionKind::CodeBuild(build) => {
            let mut configuration = Map::new();
            configuration.insert("ProjectName".into(), intrinsic::reference(&build.project));
            if action.inputs.len() > 1
                && let Some(primary) = action.inputs.first()
            {
                configuration.insert("PrimarySource".into(), json!(primary.name()));
            }
            if !build.environment.is_empty() {
                let variables: Vec<Value> = build
                    .environment
                    .iter()
                    .map(|(name, value)| json!({ "name": name, "type": "PLAINTEXT", "value": value }))
                    .collect();
                configuration.insert(
                    "EnvironmentVariables".into(),
                    Value::String(Value::Array(variables).to_string()),
                );
            }
            (
                action_type("Build", "AWS", "CodeBuild"),
                Value::Object(configuration),
            )
        }
        ActionKind::ManualApproval(approval) => {
            let mut configuration = Map::new();
            if let Some(topic) = &approval.topic {
                configuration.insert("NotificationArn".into(), intrinsic::reference(topic));
            }
            if let Some(info) = &approval.additional_information {
                configuration.insert("CustomData".into(), json!(info));
            }
            (
                action_type("Approval", "AWS", "Manual"),
                Value::Object(configuration),
            )
        }
    };

    let mut emitted = json!({
        "Name": action.name,
        "ActionTypeId": type_id,
        "Configuration": configuration,
        "RunOrder": action.run_order
    });
    if !action.inputs.is_empty() {
        emitted["InputArtifacts"] = artifacts(&action.inputs);
    }
    if !action.outputs.is_empty() {
        emitted["OutputArtifacts"] = artifacts(&action.outputs);
    }
    if let Some(namespace) = &action.namespace {
        emitted["Namespace"] = json!(namespace);
    }
    emitted
}

fn emit_webhook(pipeline: &Pipeline, action: &Action, source: &GitHubSource) -> Resource {
    Resource::new(
        "AWS::CodePipeline::Webhook",
        json!({
            "Authentication": WEBHOOK_AUTHENTICATION,
            "AuthenticationConfiguration": { "SecretToken": source.oauth_token },
            "Filters": [{
                "JsonPath": "$.ref",
                "MatchEquals": format!("refs/heads/{}", source.branch)
            }],
            "TargetAction": action.name,
            "TargetPipeline": intrinsic::reference(&pipeline.logical_id),
            "TargetPipelineVersion": 1,
            "RegisterWithThirdParty": true
        }),
    )
}
