//! Compute function
//!
//! A function packaged from a local asset directory. The asset's bucket and
//! key are template parameters filled in by the deployment tool after it
//! uploads the directory; the path is recorded in the resource metadata.

use blueprints_core::error::require;
use blueprints_core::template::validate_logical_id;
use blueprints_core::{Error, Parameter, Resource, Result, Template, intrinsic};
use blueprints_iam::{Role, ServicePrincipal};
use indexmap::IndexMap;
use serde_json::{Map, Value, json};

/// Managed policy letting a function write its own logs
pub const BASIC_EXECUTION_POLICY: &str = "service-role/AWSLambdaBasicExecutionRole";

/// Retention periods accepted by the log service, in days
pub const RETENTION_DAYS: [u32; 22] = [
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557,
    2922, 3288, 3653,
];

/// Where an environment value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentValue {
    /// The value itself
    Literal(String),
    /// A parameter store path, resolved at deploy time through a template
    /// parameter
    Parameter(String),
    /// A JSON field of a secret, resolved at deploy time
    Secret {
        /// Secret id or path
        id: String,
        /// Field inside the secret
        field: String,
    },
}

impl EnvironmentValue {
    fn resolve(&self, template: &mut Template) -> Result<Value> {
        match self {
            Self::Literal(value) => Ok(Value::String(value.clone())),
            Self::Parameter(path) => template.ssm_parameter(path),
            Self::Secret { id, field } => Ok(Value::String(
                intrinsic::secrets_manager_reference(id, field),
            )),
        }
    }
}

/// Function settings.
#[derive(Debug, Clone)]
pub struct FunctionProps {
    /// Deployed function name
    pub function_name: String,
    /// Local directory holding the code
    pub code_path: String,
    /// `<file>.<export>` entry point
    pub handler: String,
    /// Runtime identifier
    pub runtime: String,
    /// Memory in MB
    pub memory_size: u32,
    /// Timeout in seconds
    pub timeout: u32,
    /// Log retention in days
    pub log_retention_days: u32,
}

/// A function, its execution role and its log group.
#[derive(Debug, Clone)]
pub struct ComputeFunction {
    logical_id: String,
    props: FunctionProps,
    role: Role,
    environment: IndexMap<String, EnvironmentValue>,
}

impl ComputeFunction {
    /// Create a function.
    ///
    /// # Errors
    ///
    /// Fails on an invalid logical id, a blank field, memory outside
    /// 128..=10240 MB, a timeout outside 1..=900 s or an unsupported
    /// retention period.
    pub fn new(logical_id: impl Into<String>, props: FunctionProps) -> Result<Self> {
        const COMPONENT: &str = "function";
        let logical_id = logical_id.into();
        validate_logical_id(&logical_id)?;
        require(COMPONENT, "function_name", &props.function_name)?;
        require(COMPONENT, "code_path", &props.code_path)?;
        require(COMPONENT, "handler", &props.handler)?;
        require(COMPONENT, "runtime", &props.runtime)?;
        if !(128..=10_240).contains(&props.memory_size) {
            return Err(Error::invalid_config(
                COMPONENT,
                format!("memory_size {} MB is outside 128..=10240", props.memory_size),
            ));
        }
        if !(1..=900).contains(&props.timeout) {
            return Err(Error::invalid_config(
                COMPONENT,
                format!("timeout {} s is outside 1..=900", props.timeout),
            ));
        }
        if !RETENTION_DAYS.contains(&props.log_retention_days) {
            return Err(Error::invalid_config(
                COMPONENT,
                format!(
                    "log retention of {} days is not supported",
                    props.log_retention_days
                ),
            ));
        }

        let role = Role::new(format!("{logical_id}ServiceRole"), ServicePrincipal::Lambda)?
            .with_managed_policy(BASIC_EXECUTION_POLICY);
        Ok(Self {
            logical_id,
            props,
            role,
            environment: IndexMap::new(),
        })
    }

    /// Add an environment variable; a later value replaces an earlier one
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: EnvironmentValue) -> Self {
        self.environment.insert(name.into(), value);
        self
    }

    /// Logical id of the function resource
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Function settings
    #[must_use]
    pub const fn props(&self) -> &FunctionProps {
        &self.props
    }

    /// Environment in insertion order
    #[must_use]
    pub const fn environment(&self) -> &IndexMap<String, EnvironmentValue> {
        &self.environment
    }

    /// `Fn::GetAtt` of the function ARN
    #[must_use]
    pub fn arn(&self) -> Value {
        intrinsic::get_att(&self.logical_id, "Arn")
    }

    /// Logical id of the asset bucket parameter
    #[must_use]
    pub fn code_bucket_parameter(&self) -> String {
        format!("{}CodeS3Bucket", self.logical_id)
    }

    /// Logical id of the asset key parameter
    #[must_use]
    pub fn code_key_parameter(&self) -> String {
        format!("{}CodeS3Key", self.logical_id)
    }

    /// Add the role, function, log group and asset parameters.
    ///
    /// Parameter store values become template parameters.
    ///
    /// # Errors
    ///
    /// Fails on a logical id collision.
    pub fn add_to(&self, template: &mut Template) -> Result<()> {
        template.add_parameter(
            self.code_bucket_parameter(),
            Parameter::string(format!("Bucket holding the code asset of {}", self.logical_id)),
        )?;
        template.add_parameter(
            self.code_key_parameter(),
            Parameter::string(format!("Object key of the code asset of {}", self.logical_id)),
        )?;
        self.role.add_to(template)?;

        let mut variables = Map::new();
        for (name, value) in &self.environment {
            variables.insert(name.clone(), value.resolve(template)?);
        }

        let mut properties = json!({
            "FunctionName": self.props.function_name,
            "Code": {
                "S3Bucket": intrinsic::reference(&self.code_bucket_parameter()),
                "S3Key": intrinsic::reference(&self.code_key_parameter())
            },
            "Handler": self.props.handler,
            "Runtime": self.props.runtime,
            "MemorySize": self.props.memory_size,
            "Timeout": self.props.timeout,
            "Role": self.role.arn()
        });
        if !variables.is_empty() {
            properties["Environment"] = json!({ "Variables": variables });
        }

        let function = Resource::new("AWS::Lambda::Function", properties)
            .depends_on(self.role.logical_id())
            .with_metadata(json!({
                "aws:asset:path": self.props.code_path,
                "aws:asset:property": "Code"
            }));
        template.add_resource(self.logical_id.clone(), function)?;

        template.add_resource(
            format!("{}LogGroup", self.logical_id),
            Resource::new(
                "AWS::Logs::LogGroup",
                json!({
                    "LogGroupName": format!("/aws/lambda/{}", self.props.function_name),
                    "RetentionInDays": self.props.log_retention_days
                }),
            ),
        )?;

        tracing::debug!(
            function = %self.props.function_name,
            variables = self.environment.len(),
            "Function added"
        );
        Ok(())
    }
}
