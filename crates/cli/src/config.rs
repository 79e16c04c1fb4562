//! `blueprints.toml` loading
//!
//! ```toml
//! [app]
//! stages = ["test", "prod"]
//! service_stack_prefix = "classesAPI"
//!
//! [pipeline]
//! git_owner = "ndlib"
//! # ...
//!
//! [service]
//! stage = "test"
//! lambda_code_path = "../src"
//! # ...
//! ```
//!
//! `--context key=value` pairs override configured values before any stack
//! is built, so a deploy job can inject the stage and release version.
//! `serviceStackName` replaces `[app] service_stack_prefix` for every
//! stack; the other keys replace fields of the `[service]` table.

use crate::errors::CliError;
use blueprints_core::context::{
    DEFAULT_APPLICATION, DEFAULT_PARAMETER_ROOT, DEFAULT_SERVICE_STACK_PREFIX,
};
use blueprints_core::{StackRegistry, StageSet, SynthContext};
use blueprints_pipeline::{PipelineStack, PipelineStackConfig};
use blueprints_service::{ServiceStack, ServiceStackConfig};
use serde::Deserialize;
use std::path::Path;

/// Context key overriding the service stack prefix
pub const STACK_PREFIX_KEY: &str = "serviceStackName";

/// Context keys that set a `[service]` field, and the field each one sets
pub const SERVICE_CONTEXT_KEYS: [(&str, &str); 3] = [
    ("stage", "stage"),
    ("sentryVersion", "sentry_version"),
    ("lambdaCodePath", "lambda_code_path"),
];

/// `[app]` table: the stage set and the naming context.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Stages covered by the build role
    pub stages: StageSet,
    /// Prefix of every service stack name
    pub service_stack_prefix: String,
    /// Application namespace under the parameter root
    pub application: String,
    /// Root of the remote configuration namespace
    pub parameter_root: String,
    /// Fixed account id
    pub account: Option<String>,
    /// Fixed region
    pub region: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stages: StageSet::default(),
            service_stack_prefix: DEFAULT_SERVICE_STACK_PREFIX.to_string(),
            application: DEFAULT_APPLICATION.to_string(),
            parameter_root: DEFAULT_PARAMETER_ROOT.to_string(),
            account: None,
            region: None,
        }
    }
}

impl AppConfig {
    /// Naming context with the context overrides applied.
    ///
    /// # Errors
    ///
    /// Fails when the resulting context is malformed.
    pub fn context(&self, overrides: &[(String, String)]) -> Result<SynthContext, CliError> {
        let prefix = overrides
            .iter()
            .rev()
            .find(|(key, _)| key == STACK_PREFIX_KEY)
            .map_or(&self.service_stack_prefix, |(_, value)| value);
        let ctx = SynthContext {
            service_stack_prefix: prefix.clone(),
            application: self.application.clone(),
            parameter_root: self.parameter_root.clone(),
            account: self.account.clone(),
            region: self.region.clone(),
        };
        ctx.validate()?;
        Ok(ctx)
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlueprintsConfig {
    /// `[app]`
    #[serde(default)]
    pub app: AppConfig,
    /// `[pipeline]`, no pipeline stack when absent
    #[serde(default)]
    pub pipeline: Option<PipelineStackConfig>,
    /// `[service]`, kept raw until context overrides are applied
    #[serde(default)]
    pub service: Option<toml::Table>,
}

/// Parse one `--context key=value` argument.
///
/// # Errors
///
/// Fails without `=` or on an unknown key.
pub fn parse_context(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let known = || {
        std::iter::once(STACK_PREFIX_KEY).chain(SERVICE_CONTEXT_KEYS.iter().map(|(name, _)| *name))
    };
    if !known().any(|name| name == key) {
        let known: Vec<_> = known().collect();
        return Err(format!(
            "unknown context key '{key}' (expected one of: {})",
            known.join(", ")
        ));
    }
    Ok((key.to_string(), value.to_string()))
}

impl BlueprintsConfig {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or is not valid configuration.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CliError::config_with_help(
                format!("cannot read {}: {e}", path.display()),
                "Create blueprints.toml or pass --config <path>",
            )
        })?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Self::parse(&raw)
    }

    /// Parse configuration text.
    ///
    /// # Errors
    ///
    /// Fails on invalid TOML or unknown tables.
    pub fn parse(raw: &str) -> Result<Self, CliError> {
        toml::from_str(raw).map_err(|e| CliError::config(e.to_string()))
    }

    /// Service configuration with the context overrides applied, if any
    /// service stack is configured.
    ///
    /// # Errors
    ///
    /// Fails when the merged table is not a valid service configuration.
    pub fn service_config(
        &self,
        overrides: &[(String, String)],
    ) -> Result<Option<ServiceStackConfig>, CliError> {
        let Some(table) = &self.service else {
            if !overrides.is_empty() {
                tracing::warn!("--context given but no [service] table is configured");
            }
            return Ok(None);
        };

        let mut table = table.clone();
        for (key, value) in overrides {
            if let Some((_, field)) = SERVICE_CONTEXT_KEYS
                .iter()
                .find(|(name, _)| *name == key.as_str())
            {
                tracing::debug!(key = %key, field = %field, "Applying context override");
                table.insert((*field).to_string(), toml::Value::String(value.clone()));
            }
        }
        let config = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| CliError::config(format!("[service]: {e}")))?;
        Ok(Some(config))
    }

    /// Construct every configured stack.
    ///
    /// # Errors
    ///
    /// Fails on a malformed naming context, on the first invalid stack
    /// configuration, or when nothing is configured.
    pub fn registry(&self, overrides: &[(String, String)]) -> Result<StackRegistry, CliError> {
        let stages = self.app.stages.clone();
        let ctx = self.app.context(overrides)?;
        let mut registry = StackRegistry::new();

        if let Some(pipeline) = &self.pipeline {
            registry.register(PipelineStack::new(pipeline, stages, &ctx)?);
        }
        if let Some(service) = self.service_config(overrides)? {
            registry.register(ServiceStack::new(&service, &ctx)?);
        }

        if registry.is_empty() {
            return Err(CliError::config_with_help(
                "no stacks configured",
                "Add a [pipeline] or [service] table",
            ));
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[app]
stages = ["test", "prod"]
region = "us-east-1"

[pipeline]
git_owner = "ndlib"
git_token_path = "/all/github/ndlib-git"
service_repository = "classes-api"
service_branch = "main"
blueprints_repository = "classes-api-blueprints"
blueprints_branch = "main"
email_receivers = "wse@nd.edu"
contact = "wse@nd.edu"
owner = "WSE"
sentry_token_path = "/all/sentry/token"
sentry_org = "ndlib"
sentry_project = "classes-api"

[service]
stage = "test"
lambda_code_path = "../src"
sentry_project = "classes-api"
sentry_version = "local"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = BlueprintsConfig::parse(CONFIG).unwrap();
        assert_eq!(config.app.stages.len(), 2);
        let ctx = config.app.context(&[]).unwrap();
        assert_eq!(ctx.region.as_deref(), Some("us-east-1"));
        assert_eq!(ctx.service_stack_prefix, "classesAPI");
        assert!(config.pipeline.is_some());

        let registry = config.registry(&[]).unwrap();
        assert_eq!(registry.names(), vec!["classesAPI-pipeline", "classesAPI-test"]);
    }

    #[test]
    fn test_context_overrides_service_table() {
        let config = BlueprintsConfig::parse(CONFIG).unwrap();
        let overrides = vec![
            ("stage".to_string(), "prod".to_string()),
            ("sentryVersion".to_string(), "abc123".to_string()),
            ("serviceStackName".to_string(), "coursesAPI".to_string()),
        ];
        let service = config.service_config(&overrides).unwrap().unwrap();
        assert_eq!(service.stage.as_str(), "prod");
        assert_eq!(service.sentry_version, "abc123");
        assert_eq!(service.stack_name, None);

        let registry = config.registry(&overrides).unwrap();
        assert_eq!(registry.names(), vec!["coursesAPI-pipeline", "coursesAPI-prod"]);
    }

    #[test]
    fn test_stack_name_context_is_a_prefix() {
        let config = BlueprintsConfig::parse(CONFIG).unwrap();
        let overrides = vec![("serviceStackName".to_string(), "classesAPI".to_string())];
        let registry = config.registry(&overrides).unwrap();
        assert_eq!(registry.names(), vec!["classesAPI-pipeline", "classesAPI-test"]);
    }

    #[test]
    fn test_misspelled_app_key_is_rejected() {
        let err = BlueprintsConfig::parse("[app]\nservice_stack_prefx = \"coursesAPI\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("service_stack_prefx"));
    }

    #[test]
    fn test_relative_parameter_root_is_rejected() {
        let config = CONFIG.replace("[app]\n", "[app]\nparameter_root = \"all\"\n");
        let config = BlueprintsConfig::parse(&config).unwrap();
        assert!(matches!(
            config.registry(&[]),
            Err(CliError::Synth(blueprints_core::Error::InvalidConfig { .. }))
        ));
    }

    #[test]
    fn test_parse_context() {
        assert_eq!(
            parse_context("lambdaCodePath=../../src").unwrap(),
            ("lambdaCodePath".to_string(), "../../src".to_string())
        );
        assert_eq!(
            parse_context("serviceStackName=coursesAPI").unwrap(),
            ("serviceStackName".to_string(), "coursesAPI".to_string())
        );
        assert!(parse_context("stage").is_err());
        assert!(parse_context("region=us-east-1").unwrap_err().contains("unknown context key"));
    }

    #[test]
    fn test_invalid_stage_in_override() {
        let config = BlueprintsConfig::parse(CONFIG).unwrap();
        let overrides = vec![("stage".to_string(), "Prod!".to_string())];
        assert!(config.service_config(&overrides).is_err());
    }

    #[test]
    fn test_pipeline_stage_must_be_covered() {
        let config = CONFIG.replace(r#"stages = ["test", "prod"]"#, r#"stages = ["test"]"#);
        let config = BlueprintsConfig::parse(&config).unwrap();
        let err = config.registry(&[]).unwrap_err();
        assert!(matches!(
            err,
            CliError::Synth(blueprints_core::Error::UncoveredStage { .. })
        ));
    }

    #[test]
    fn test_empty_config_has_no_stacks() {
        let config = BlueprintsConfig::parse("").unwrap();
        assert_eq!(config.app.stages, StageSet::default());
        assert!(matches!(config.registry(&[]), Err(CliError::Config { .. })));
    }

    #[test]
    fn test_invalid_stage_set_is_rejected() {
        assert!(BlueprintsConfig::parse("[app]\nstages = [\"test\", \"test\"]\n").is_err());
        assert!(BlueprintsConfig::parse("[app]\nstages = []\n").is_err());
    }

    #[test]
    fn test_unknown_table_is_rejected() {
        assert!(BlueprintsConfig::parse("[frontend]\nname = \"x\"\n").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BlueprintsConfig::load(&dir.path().join("blueprints.toml")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
