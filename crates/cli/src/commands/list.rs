//! `blueprints list`

use crate::commands::json_envelope;
use crate::config::BlueprintsConfig;
use crate::errors::CliError;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Serialize)]
struct StackInfo<'a> {
    name: &'a str,
    description: &'static str,
}

/// Execute the list command.
///
/// # Errors
///
/// Fails when a configured stack cannot be constructed.
pub fn execute_list(
    config: &BlueprintsConfig,
    overrides: &[(String, String)],
    json_output: bool,
) -> Result<String, CliError> {
    let registry = config.registry(overrides)?;
    let stacks: Vec<_> = registry
        .names()
        .into_iter()
        .filter_map(|name| {
            registry.get(name).map(|stack| StackInfo {
                name,
                description: stack.description(),
            })
        })
        .collect();

    if json_output {
        return json_envelope(&stacks);
    }

    let width = stacks.iter().map(|s| s.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for stack in &stacks {
        let _ = writeln!(out, "{:width$}  {}", stack.name, stack.description);
    }
    Ok(out)
}
