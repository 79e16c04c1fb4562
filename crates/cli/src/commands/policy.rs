//! `blueprints policy`
//!
//! Prints the build role's permission document for review, without
//! constructing any stack.

use crate::commands::json_envelope;
use crate::config::BlueprintsConfig;
use crate::errors::CliError;
use blueprints_core::StageSet;
use blueprints_iam::role::POLICY_VERSION;
use blueprints_iam::{PolicyAssembler, PolicyStatement, Role};
use blueprints_pipeline::ArtifactBucket;
use blueprints_pipeline::stack::ids;
use serde_json::json;

/// Execute the policy command.
///
/// `stages` replaces the configured stage set when non-empty.
///
/// # Errors
///
/// Fails on an invalid stage set, a malformed naming context or an invalid
/// statement.
pub fn execute_policy(
    config: &BlueprintsConfig,
    overrides: &[(String, String)],
    stages: &[String],
    json_output: bool,
) -> Result<String, CliError> {
    let stages = if stages.is_empty() {
        config.app.stages.clone()
    } else {
        StageSet::new(stages.iter().map(String::as_str))?
    };

    let ctx = config.app.context(overrides)?;
    let bucket = ArtifactBucket::new(ids::ARTIFACT_BUCKET)?;
    let assembler = PolicyAssembler::new(
        ids::BUILD_ROLE,
        stages,
        bucket.bucket_ref(),
        &ctx,
    )?;
    let role = Role::build_role(ids::BUILD_ROLE, &assembler)?;
    role.validate()?;
    tracing::debug!(statements = role.statements().len(), "Assembled build role policy");

    let document = json!({
        "Version": POLICY_VERSION,
        "Statement": role.statements().iter().map(PolicyStatement::to_value).collect::<Vec<_>>(),
    });

    if json_output {
        return json_envelope(document);
    }
    let mut out = serde_json::to_string_pretty(&document).map_err(blueprints_core::Error::serialization)?;
    out.push('\n');
    Ok(out)
}
