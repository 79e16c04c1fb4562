//! `blueprints synth`

use crate::commands::json_envelope;
use crate::config::BlueprintsConfig;
use crate::errors::CliError;
use blueprints_core::assembly::{CloudAssembly, OutputFormat};
use std::fmt::Write;
use std::path::Path;

/// Execute the synth command.
///
/// Synthesizes one stack, or every stack when `stack` is `None`, and writes
/// the templates plus `manifest.json` into `out_dir`. Nothing is written
/// when any stack fails.
///
/// # Errors
///
/// Fails on an unknown stack name, an invalid stack or an I/O error.
pub fn execute_synth(
    config: &BlueprintsConfig,
    overrides: &[(String, String)],
    stack: Option<&str>,
    out_dir: &Path,
    format: OutputFormat,
    json_output: bool,
) -> Result<String, CliError> {
    let registry = config.registry(overrides)?;
    let stacks = match stack {
        Some(name) => vec![registry.synthesize(name)?],
        None => registry.synthesize_all()?,
    };

    let written = CloudAssembly::new(out_dir, format).write(&stacks)?;
    tracing::info!(
        stacks = stacks.len(),
        files = written.len(),
        out_dir = %out_dir.display(),
        "Synthesis complete"
    );

    if json_output {
        let files: Vec<_> = written.iter().map(|p| p.display().to_string()).collect();
        return json_envelope(serde_json::json!({
            "stacks": stacks.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "files": files,
        }));
    }

    let mut out = String::new();
    for path in &written {
        let _ = writeln!(out, "{}", path.display());
    }
    Ok(out)
}
