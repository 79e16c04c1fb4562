//! Service stack
//!
//! One `GET /courses` route in front of the passthrough function, guarded by
//! the stage's JWT authorizer.

use crate::api::{
    CorsOptions, DeployOptions, LoggingLevel, PassthroughBehavior, RestApi, Route, TokenAuthorizer,
};
use crate::function::{ComputeFunction, EnvironmentValue, FunctionProps};
use blueprints_core::arn;
use blueprints_core::error::require;
use blueprints_core::{Result, StackDefinition, StageName, SynthContext, Template};
use serde::Deserialize;

/// Entry point of the passthrough function
pub const HANDLER: &str = "passthrough.handler";
/// Runtime of the passthrough function
pub const RUNTIME: &str = "nodejs12.x";
/// Memory of the passthrough function, in MB
pub const MEMORY_SIZE: u32 = 128;
/// Timeout of the passthrough function, in seconds
pub const TIMEOUT: u32 = 30;
/// Log retention of the passthrough function, in days
pub const LOG_RETENTION_DAYS: u32 = 7;
/// How long authorizer decisions are cached, in seconds
pub const AUTHORIZER_CACHE_TTL: u32 = 300;
/// Header carrying the bearer token
pub const AUTHORIZATION_HEADER: &str = "Authorization";
/// Route served by the function
pub const COURSES_PATH: &str = "courses";
/// Description of the REST API
pub const API_DESCRIPTION: &str = "Get course infromation for a user";

/// `[service]` configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ServiceStackConfig {
    /// Stage this stack serves
    pub stage: StageName,
    /// Stack name, `<prefix>-<stage>` when unset
    #[serde(default)]
    pub stack_name: Option<String>,
    /// Local directory holding the function code
    pub lambda_code_path: String,
    /// Sentry project
    pub sentry_project: String,
    /// Release version, usually the deployed commit
    pub sentry_version: String,
}

impl ServiceStackConfig {
    fn validate(&self) -> Result<()> {
        const COMPONENT: &str = "service";
        require(COMPONENT, "lambda_code_path", &self.lambda_code_path)?;
        require(COMPONENT, "sentry_project", &self.sentry_project)?;
        require(COMPONENT, "sentry_version", &self.sentry_version)?;
        if let Some(name) = &self.stack_name {
            require(COMPONENT, "stack_name", name)?;
        }
        Ok(())
    }
}

/// The classes API service stack for one stage.
#[derive(Debug, Clone)]
pub struct ServiceStack {
    stack_name: String,
    stage: StageName,
    function: ComputeFunction,
    api: RestApi,
}

impl ServiceStack {
    /// Assemble and validate the stack.
    ///
    /// # Errors
    ///
    /// Fails on the first blank or invalid configuration value.
    pub fn new(config: &ServiceStackConfig, ctx: &SynthContext) -> Result<Self> {
        config.validate()?;
        ctx.validate()?;
        let stage = config.stage.clone();
        let stack_name = config
            .stack_name
            .clone()
            .unwrap_or_else(|| ctx.service_stack_name(&stage));

        let secret = ctx.app_namespace();
        let function = ComputeFunction::new(
            "PassthroughFunction",
            FunctionProps {
                function_name: format!("{stack_name}-courses"),
                code_path: config.lambda_code_path.clone(),
                handler: HANDLER.to_string(),
                runtime: RUNTIME.to_string(),
                memory_size: MEMORY_SIZE,
                timeout: TIMEOUT,
                log_retention_days: LOG_RETENTION_DAYS,
            },
        )?
        .with_env(
            "SENTRY_DSN",
            EnvironmentValue::Parameter(ctx.stage_parameter(&stage, "sentry_dsn")),
        )
        .with_env("SENTRY_ENVIRONMENT", EnvironmentValue::Literal(stage.to_string()))
        .with_env(
            "SENTRY_RELEASE",
            EnvironmentValue::Literal(format!("{}@{}", config.sentry_project, config.sentry_version)),
        )
        .with_env(
            "API_URL",
            EnvironmentValue::Parameter(ctx.stage_parameter(&stage, "api_url")),
        )
        .with_env(
            "RESERVES_URL",
            EnvironmentValue::Parameter(ctx.stage_parameter(&stage, "reserves_url")),
        )
        .with_env(
            "API_KEY",
            EnvironmentValue::Secret {
                id: secret.clone(),
                field: "api_key".to_string(),
            },
        )
        .with_env(
            "RESERVES_KEY",
            EnvironmentValue::Secret {
                id: secret,
                field: "reserves_key".to_string(),
            },
        );

        let authorizer_function = format!("lambda-auth-{stage}");
        let authorizer_arn = arn::arn(
            "lambda",
            &ctx.region_locator(),
            &ctx.account_locator(),
            &["function:", authorizer_function.as_str()],
        );
        let authorizer = TokenAuthorizer::new(
            "JwtAuthorizer",
            "jwt",
            authorizer_arn,
            AUTHORIZATION_HEADER,
            AUTHORIZER_CACHE_TTL,
        )?;

        let api = RestApi::new(
            "ApiGateway",
            stack_name.clone(),
            API_DESCRIPTION,
            DeployOptions {
                stage_name: stage.to_string(),
                metrics_enabled: true,
                logging_level: LoggingLevel::Error,
            },
        )?
        .with_cors(CorsOptions::allow_all())?
        .with_authorizer(authorizer)
        .with_request_validator()
        .with_endpoint_export(format!("{stack_name}-api-url"))
        .add_route(Route {
            path_part: COURSES_PATH.to_string(),
            method: "GET".to_string(),
            function: function.logical_id().to_string(),
            passthrough: PassthroughBehavior::WhenNoMatch,
        })?;

        Ok(Self {
            stack_name,
            stage,
            function,
            api,
        })
    }

    /// Stage this stack serves
    #[must_use]
    pub const fn stage(&self) -> &StageName {
        &self.stage
    }

    /// The passthrough function
    #[must_use]
    pub const fn function(&self) -> &ComputeFunction {
        &self.function
    }

    /// The routed API
    #[must_use]
    pub const fn api(&self) -> &RestApi {
        &self.api
    }
}

impl StackDefinition for ServiceStack {
    fn stack_name(&self) -> &str {
        &self.stack_name
    }

    fn description(&self) -> &'static str {
        "Classes API service: passthrough function behind a token-authorized REST API"
    }

    fn synthesize(&self) -> Result<Template> {
        let mut template = Template::new(self.description());
        self.function.add_to(&mut template)?;
        self.api.add_to(&mut template)?;
        tracing::info!(
            stack = %self.stack_name,
            stage = %self.stage,
            resources = template.resources.len(),
            "Synthesized service stack"
        );
        Ok(template)
    }
}
