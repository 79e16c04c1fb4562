//! `blueprints validate`

use crate::commands::json_envelope;
use crate::config::BlueprintsConfig;
use crate::errors::CliError;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidatedStack {
    name: String,
    resource_count: usize,
}

/// Execute the validate command: construct and synthesize every stack,
/// writing nothing.
///
/// # Errors
///
/// Fails on the first invalid stack.
pub fn execute_validate(
    config: &BlueprintsConfig,
    overrides: &[(String, String)],
    json_output: bool,
) -> Result<String, CliError> {
    let registry = config.registry(overrides)?;
    let stacks: Vec<_> = registry
        .synthesize_all()?
        .into_iter()
        .map(|stack| ValidatedStack {
            resource_count: stack.template.resources.len(),
            name: stack.name,
        })
        .collect();

    if json_output {
        return json_envelope(&stacks);
    }

    let mut out = String::new();
    for stack in &stacks {
        let _ = writeln!(out, "ok  {} ({} resources)", stack.name, stack.resource_count);
    }
    let _ = writeln!(out, "{} stack(s) valid", stacks.len());
    Ok(out)
}
