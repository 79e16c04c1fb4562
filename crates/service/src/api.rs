//! Routed REST API
//!
//! A REST API with a token authorizer, CORS preflight methods, lambda proxy
//! routes, a deployment stage and an exported endpoint.
//!
//! The authorizer and the required request parameters are the API's default
//! method options: every route inherits them. Preflight `OPTIONS` methods
//! never require authorization.

use blueprints_core::template::{Export, Output, logical_id_from, validate_logical_id};
use blueprints_core::{Error, Resource, Result, Template, intrinsic};
use blueprints_iam::{Role, ServicePrincipal};
use serde_json::{Map, Value, json};

/// Managed policy letting the routing layer write execution logs
pub const CLOUDWATCH_POLICY: &str = "service-role/AmazonAPIGatewayPushToCloudWatchLogs";

/// Headers allowed by preflight responses
pub const CORS_ALLOW_HEADERS: &[&str] = &[
    "Content-Type",
    "X-Amz-Date",
    "Authorization",
    "X-Api-Key",
    "X-Amz-Security-Token",
    "X-Amz-User-Agent",
];

/// Methods allowed by preflight responses
pub const CORS_ALLOW_METHODS: &[&str] = &["OPTIONS", "GET", "PUT", "POST", "DELETE", "PATCH", "HEAD"];

fn integration_uri(function_arn: &str) -> Value {
    intrinsic::sub(&format!(
        "arn:${{AWS::Partition}}:apigateway:${{AWS::Region}}:lambda:path/2015-03-31/functions/{function_arn}/invocations"
    ))
}

/// Execution log level of the deployment stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingLevel {
    /// No execution logs
    Off,
    /// Errors only
    Error,
    /// Errors and informational events
    Info,
}

impl LoggingLevel {
    /// Template value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Error => "ERROR",
            Self::Info => "INFO",
        }
    }
}

/// How request bodies without a matching template are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughBehavior {
    /// Pass through when no template matches the content type
    WhenNoMatch,
    /// Pass through only when no templates are defined
    WhenNoTemplates,
    /// Reject unmatched content types
    Never,
}

impl PassthroughBehavior {
    /// Template value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WhenNoMatch => "WHEN_NO_MATCH",
            Self::WhenNoTemplates => "WHEN_NO_TEMPLATES",
            Self::Never => "NEVER",
        }
    }
}

/// Deployment stage settings.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Stage name, also the endpoint's path prefix
    pub stage_name: String,
    /// Per-method metrics
    pub metrics_enabled: bool,
    /// Execution log level
    pub logging_level: LoggingLevel,
}

/// CORS preflight settings.
#[derive(Debug, Clone)]
pub struct CorsOptions {
    /// Allowed origins; `*` allows any
    pub allow_origins: Vec<String>,
    /// Whether credentials may be sent
    pub allow_credentials: bool,
    /// Preflight status code
    pub status_code: u16,
}

impl CorsOptions {
    /// Any origin, no credentials, status 200
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_credentials: false,
            status_code: 200,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.allow_origins.is_empty() {
            return Err(Error::invalid_config("cors", "allow_origins must not be empty"));
        }
        if self.allow_origins.len() > 1 && self.allow_origins.iter().any(|o| o == "*") {
            return Err(Error::invalid_config(
                "cors",
                "'*' cannot be combined with other origins",
            ));
        }
        if self.allow_credentials && self.allow_origins.iter().any(|o| o == "*") {
            return Err(Error::invalid_config(
                "cors",
                "credentials cannot be allowed for any origin",
            ));
        }
        if !(200..=299).contains(&self.status_code) {
            return Err(Error::invalid_config(
                "cors",
                format!("status_code {} is not a success status", self.status_code),
            ));
        }
        Ok(())
    }

    fn method(&self, api: &str, resource_id: Value) -> Resource {
        let quoted = |value: String| format!("'{value}'");
        let mut headers = Map::new();
        headers.insert(
            "method.response.header.Access-Control-Allow-Headers".into(),
            json!(quoted(CORS_ALLOW_HEADERS.join(","))),
        );
        headers.insert(
            "method.response.header.Access-Control-Allow-Origin".into(),
            json!(quoted(self.allow_origins[0].clone())),
        );
        if self.allow_origins.len() > 1 {
            headers.insert("method.response.header.Vary".into(), json!("'Origin'"));
        }
        headers.insert(
            "method.response.header.Access-Control-Allow-Methods".into(),
            json!(quoted(CORS_ALLOW_METHODS.join(","))),
        );
        if self.allow_credentials {
            headers.insert(
                "method.response.header.Access-Control-Allow-Credentials".into(),
                json!("'true'"),
            );
        }

        let mut integration_response = json!({
            "StatusCode": self.status_code.to_string(),
            "ResponseParameters": headers
        });
        if self.allow_origins.len() > 1 {
            let condition = self
                .allow_origins
                .iter()
                .map(|origin| format!("$origin.matches(\"{origin}\")"))
                .collect::<Vec<_>>()
                .join(" || ");
            integration_response["ResponseTemplates"] = json!({
                "application/json": format!(
                    "#set($origin = $input.params().header.get(\"Origin\"))\n\
                     #if($origin == \"\") #set($origin = $input.params().header.get(\"origin\")) #end\n\
                     #if({condition})\n  #set($context.responseOverride.header.Access-Control-Allow-Origin = $origin)\n#end"
                )
            });
        }

        let method_headers: Map<String, Value> = headers.keys().map(|k| (k.clone(), json!(true))).collect();

        Resource::new(
            "AWS::ApiGateway::Method",
            json!({
                "HttpMethod": "OPTIONS",
                "ResourceId": resource_id,
                "RestApiId": intrinsic::reference(api),
                "AuthorizationType": "NONE",
                "Integration": {
                    "Type": "MOCK",
                    "RequestTemplates": {
                        "application/json": format!("{{ statusCode: {} }}", self.status_code)
                    },
                    "IntegrationResponses": [integration_response]
                },
                "MethodResponses": [{
                    "StatusCode": self.status_code.to_string(),
                    "ResponseParameters": method_headers
                }]
            }),
        )
    }
}

/// A token authorizer backed by an external function.
#[derive(Debug, Clone)]
pub struct TokenAuthorizer {
    logical_id: String,
    name: String,
    function_arn: String,
    identity_source: String,
    results_cache_ttl: u32,
}

impl TokenAuthorizer {
    /// Create an authorizer reading the token from `header`.
    ///
    /// `function_arn` may contain `${AWS::...}` placeholders.
    ///
    /// # Errors
    ///
    /// Fails on an invalid logical id, a blank name or a cache TTL above
    /// 3600 seconds.
    pub fn new(
        logical_id: impl Into<String>,
        name: impl Into<String>,
        function_arn: impl Into<String>,
        header: &str,
        results_cache_ttl: u32,
    ) -> Result<Self> {
        let logical_id = logical_id.into();
        let name = name.into();
        let function_arn = function_arn.into();
        validate_logical_id(&logical_id)?;
        blueprints_core::error::require("token authorizer", "name", &name)?;
        blueprints_core::error::require("token authorizer", "header", header)?;
        blueprints_core::arn::validate_substitution(&function_arn)?;
        if results_cache_ttl > 3600 {
            return Err(Error::invalid_config(
                "token authorizer",
                format!("results cache TTL {results_cache_ttl} s exceeds 3600"),
            ));
        }
        Ok(Self {
            logical_id,
            name,
            function_arn,
            identity_source: format!("method.request.header.{header}"),
            results_cache_ttl,
        })
    }

    /// Logical id of the authorizer resource
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Request parameter carrying the token
    #[must_use]
    pub fn identity_source(&self) -> &str {
        &self.identity_source
    }

    fn resources(&self, api: &str) -> Vec<(String, Resource)> {
        vec![
            (
                self.logical_id.clone(),
                Resource::new(
                    "AWS::ApiGateway::Authorizer",
                    json!({
                        "Name": self.name,
                        "RestApiId": intrinsic::reference(api),
                        "Type": "TOKEN",
                        "AuthorizerUri": integration_uri(&self.function_arn),
                        "IdentitySource": self.identity_source,
                        "AuthorizerResultTtlInSeconds": self.results_cache_ttl
                    }),
                ),
            ),
            (
                format!("{}Permission", self.logical_id),
                Resource::new(
                    "AWS::Lambda::Permission",
                    json!({
                        "Action": "lambda:InvokeFunction",
                        "FunctionName": intrinsic::string_or_sub(&self.function_arn),
                        "Principal": "apigateway.amazonaws.com",
                        "SourceArn": intrinsic::sub(&format!(
                            "arn:${{AWS::Partition}}:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{api}}}/authorizers/${{{}}}",
                            self.logical_id
                        ))
                    }),
                ),
            ),
        ]
    }
}

/// A lambda proxy route: one method on one top-level resource.
#[derive(Debug, Clone)]
pub struct Route {
    /// Path segment under the root, e.g. `courses`
    pub path_part: String,
    /// HTTP method, e.g. `GET`
    pub method: String,
    /// Logical id of the function handling the route
    pub function: String,
    /// Body passthrough
    pub passthrough: PassthroughBehavior,
}

impl Route {
    fn validate(&self) -> Result<()> {
        const COMPONENT: &str = "route";
        blueprints_core::error::require(COMPONENT, "path_part", &self.path_part)?;
        if !self
            .path_part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(Error::invalid_config(
                COMPONENT,
                format!("path part '{}' must be a single plain segment", self.path_part),
            ));
        }
        if !matches!(
            self.method.as_str(),
            "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" | "ANY"
        ) {
            return Err(Error::invalid_config(
                COMPONENT,
                format!("unsupported method '{}'", self.method),
            ));
        }
        validate_logical_id(&self.function)
    }
}

/// A REST API.
#[derive(Debug, Clone)]
pub struct RestApi {
    logical_id: String,
    name: String,
    description: String,
    deploy: DeployOptions,
    cors: Option<CorsOptions>,
    authorizer: Option<TokenAuthorizer>,
    required_parameters: Vec<String>,
    request_validator: bool,
    endpoint_export: Option<String>,
    routes: Vec<Route>,
}

impl RestApi {
    /// Create an API without routes.
    ///
    /// # Errors
    ///
    /// Fails on an invalid logical id or a blank name or stage.
    pub fn new(
        logical_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        deploy: DeployOptions,
    ) -> Result<Self> {
        let logical_id = logical_id.into();
        let name = name.into();
        validate_logical_id(&logical_id)?;
        blueprints_core::error::require("rest api", "name", &name)?;
        blueprints_core::error::require("rest api", "stage_name", &deploy.stage_name)?;
        Ok(Self {
            logical_id,
            name,
            description: description.into(),
            deploy,
            cors: None,
            authorizer: None,
            required_parameters: Vec::new(),
            request_validator: false,
            endpoint_export: None,
            routes: Vec::new(),
        })
    }

    /// Answer preflight requests on every resource.
    ///
    /// # Errors
    ///
    /// Fails on inconsistent CORS settings.
    pub fn with_cors(mut self, cors: CorsOptions) -> Result<Self> {
        cors.validate()?;
        self.cors = Some(cors);
        Ok(self)
    }

    /// Guard every route with a token authorizer whose header is required
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: TokenAuthorizer) -> Self {
        let parameter = authorizer.identity_source.clone();
        if !self.required_parameters.contains(&parameter) {
            self.required_parameters.push(parameter);
        }
        self.authorizer = Some(authorizer);
        self
    }

    /// Validate required request parameters before integration
    #[must_use]
    pub const fn with_request_validator(mut self) -> Self {
        self.request_validator = true;
        self
    }

    /// Export the endpoint URL under `name`
    #[must_use]
    pub fn with_endpoint_export(mut self, name: impl Into<String>) -> Self {
        self.endpoint_export = Some(name.into());
        self
    }

    /// Add a route.
    ///
    /// # Errors
    ///
    /// Fails on an invalid route or one already declared.
    pub fn add_route(mut self, route: Route) -> Result<Self> {
        route.validate()?;
        if self
            .routes
            .iter()
            .any(|r| r.path_part == route.path_part && r.method == route.method)
        {
            return Err(Error::invalid_config(
                "route",
                format!("{} /{} is declared twice", route.method, route.path_part),
            ));
        }
        self.routes.push(route);
        Ok(self)
    }

    /// Logical id of the API resource
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Routes in declaration order
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Request parameters every route requires
    #[must_use]
    pub fn required_parameters(&self) -> &[String] {
        &self.required_parameters
    }

    fn resource_logical_id(&self, path_part: &str) -> String {
        format!("{}{}", self.logical_id, logical_id_from(path_part))
    }

    fn validator_logical_id(&self) -> String {
        format!("{}RequestValidator", self.logical_id)
    }

    fn stage_logical_id(&self) -> String {
        format!("{}DeploymentStage", self.logical_id)
    }

    fn route_method(&self, route: &Route, resource_id: &str) -> Resource {
        let mut properties = json!({
            "HttpMethod": route.method,
            "ResourceId": intrinsic::reference(resource_id),
            "RestApiId": intrinsic::reference(&self.logical_id),
            "AuthorizationType": "NONE",
            "Integration": {
                "Type": "AWS_PROXY",
                "IntegrationHttpMethod": "POST",
                "PassthroughBehavior": route.passthrough.as_str(),
                "Uri": integration_uri(&format!("${{{}.Arn}}", route.function))
            }
        });
        if let Some(authorizer) = &self.authorizer {
            properties["AuthorizationType"] = json!("CUSTOM");
            properties["AuthorizerId"] = intrinsic::reference(&authorizer.logical_id);
        }
        if !self.required_parameters.is_empty() {
            let parameters: Map<String, Value> = self
                .required_parameters
                .iter()
                .map(|p| (p.clone(), json!(true)))
                .collect();
            properties["RequestParameters"] = Value::Object(parameters);
        }
        if self.request_validator {
            properties["RequestValidatorId"] = intrinsic::reference(&self.validator_logical_id());
        }
        Resource::new("AWS::ApiGateway::Method", properties)
    }

    /// Add every API resource and the endpoint output.
    ///
    /// # Errors
    ///
    /// Fails when no route is declared or on a logical id collision.
    pub fn add_to(&self, template: &mut Template) -> Result<()> {
        if self.routes.is_empty() {
            return Err(Error::invalid_config(
                "rest api",
                format!("{} declares no routes", self.logical_id),
            ));
        }
        let api = self.logical_id.as_str();

        template.add_resource(
            api,
            Resource::new(
                "AWS::ApiGateway::RestApi",
                json!({ "Name": self.name, "Description": self.description }),
            ),
        )?;

        let logging_role = Role::new(format!("{api}CloudWatchRole"), ServicePrincipal::ApiGateway)?
            .with_managed_policy(CLOUDWATCH_POLICY);
        logging_role.add_to(template)?;
        let account = format!("{api}Account");
        template.add_resource(
            account.clone(),
            Resource::new(
                "AWS::ApiGateway::Account",
                json!({ "CloudWatchRoleArn": logging_role.arn() }),
            )
            .depends_on(api),
        )?;

        if self.request_validator {
            template.add_resource(
                self.validator_logical_id(),
                Resource::new(
                    "AWS::ApiGateway::RequestValidator",
                    json!({
                        "RestApiId": intrinsic::reference(api),
                        "ValidateRequestParameters": true
                    }),
                ),
            )?;
        }

        if let Some(authorizer) = &self.authorizer {
            template.extend_resources(authorizer.resources(api))?;
        }

        let mut methods = Vec::new();
        if let Some(cors) = &self.cors {
            let id = format!("{api}OPTIONS");
            template.add_resource(id.clone(), cors.method(api, intrinsic::get_att(api, "RootResourceId")))?;
            methods.push(id);
        }

        for route in &self.routes {
            let resource_id = self.resource_logical_id(&route.path_part);
            if template.resource(&resource_id).is_none() {
                template.add_resource(
                    resource_id.clone(),
                    Resource::new(
                        "AWS::ApiGateway::Resource",
                        json!({
                            "ParentId": intrinsic::get_att(api, "RootResourceId"),
                            "PathPart": route.path_part,
                            "RestApiId": intrinsic::reference(api)
                        }),
                    ),
                )?;
                if let Some(cors) = &self.cors {
                    let id = format!("{resource_id}OPTIONS");
                    template.add_resource(id.clone(), cors.method(api, intrinsic::reference(&resource_id)))?;
                    methods.push(id);
                }
            }

            let method_id = format!("{resource_id}{}", route.method);
            template.add_resource(method_id.clone(), self.route_method(route, &resource_id))?;
            template.add_resource(
                format!("{method_id}Permission"),
                Resource::new(
                    "AWS::Lambda::Permission",
                    json!({
                        "Action": "lambda:InvokeFunction",
                        "FunctionName": intrinsic::get_att(&route.function, "Arn"),
                        "Principal": "apigateway.amazonaws.com",
                        "SourceArn": intrinsic::sub(&format!(
                            "arn:${{AWS::Partition}}:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{api}}}/*/{}/{}",
                            route.method, route.path_part
                        ))
                    }),
                ),
            )?;
            methods.push(method_id);
        }

        let deployment = format!("{api}Deployment");
        let mut deployment_resource = Resource::new(
            "AWS::ApiGateway::Deployment",
            json!({
                "RestApiId": intrinsic::reference(api),
                "Description": format!("Deployment of {}", self.name)
            }),
        );
        for method in methods {
            deployment_resource = deployment_resource.depends_on(method);
        }
        template.add_resource(deployment.clone(), deployment_resource)?;

        let stage = self.stage_logical_id();
        template.add_resource(
            stage.clone(),
            Resource::new(
                "AWS::ApiGateway::Stage",
                json!({
                    "RestApiId": intrinsic::reference(api),
                    "DeploymentId": intrinsic::reference(&deployment),
                    "StageName": self.deploy.stage_name,
                    "MethodSettings": [{
                        "ResourcePath": "/*",
                        "HttpMethod": "*",
                        "MetricsEnabled": self.deploy.metrics_enabled,
                        "LoggingLevel": self.deploy.logging_level.as_str(),
                        "DataTraceEnabled": false
                    }]
                }),
            )
            .depends_on(account),
        )?;

        template.add_output(
            format!("{api}Endpoint"),
            Output {
                value: intrinsic::join(
                    "",
                    vec![
                        json!("https://"),
                        intrinsic::reference(api),
                        json!(".execute-api."),
                        intrinsic::reference("AWS::Region"),
                        json!("."),
                        intrinsic::reference("AWS::URLSuffix"),
                        json!("/"),
                        intrinsic::reference(&stage),
                        json!("/"),
                    ],
                ),
                description: Some(format!("Endpoint of {}", self.name)),
                export: self
                    .endpoint_export
                    .as_ref()
                    .map(|name| Export { name: json!(name) }),
            },
        )?;

        tracing::debug!(
            api = %self.name,
            routes = self.routes.len(),
            "REST API added"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploy() -> DeployOptions {
        DeployOptions {
            stage_name: "test".to_string(),
            metrics_enabled: true,
            logging_level: LoggingLevel::Error,
        }
    }

    fn route() -> Route {
        Route {
            path_part: "courses".to_string(),
            method: "GET".to_string(),
            function: "PassthroughFunction".to_string(),
            passthrough: PassthroughBehavior::WhenNoMatch,
        }
    }

    fn authorizer() -> TokenAuthorizer {
        TokenAuthorizer::new(
            "JwtAuthorizer",
            "jwt",
            "arn:aws:lambda:${AWS::Region}:${AWS::AccountId}:function:lambda-auth-test",
            "Authorization",
            300,
        )
        .unwrap()
    }

    fn api() -> RestApi {
        RestApi::new("ApiGateway", "classesAPI-test", "Courses", deploy())
            .unwrap()
            .with_cors(CorsOptions::allow_all())
            .unwrap()
            .with_authorizer(authorizer())
            .with_request_validator()
            .with_endpoint_export("classesAPI-test-api-url")
            .add_route(route())
            .unwrap()
    }

    fn synthesize(api: &RestApi) -> Template {
        let mut template = Template::new("test");
        api.add_to(&mut template).unwrap();
        template
    }

    #[test]
    fn test_route_method_inherits_authorization() {
        let template = synthesize(&api());
        let method = template.resource("ApiGatewayCoursesGET").unwrap();
        assert_eq!(method.properties["AuthorizationType"], "CUSTOM");
        assert_eq!(method.properties["AuthorizerId"], json!({ "Ref": "JwtAuthorizer" }));
        assert_eq!(
            method.properties["RequestParameters"],
            json!({ "method.request.header.Authorization": true })
        );
        assert_eq!(
            method.properties["RequestValidatorId"],
            json!({ "Ref": "ApiGatewayRequestValidator" })
        );
        assert_eq!(method.properties["Integration"]["Type"], "AWS_PROXY");
        assert_eq!(method.properties["Integration"]["PassthroughBehavior"], "WHEN_NO_MATCH");
    }

    #[test]
    fn test_authorizer_resource() {
        let template = synthesize(&api());
        let authorizer = template.resource("JwtAuthorizer").unwrap();
        assert_eq!(authorizer.properties["Type"], "TOKEN");
        assert_eq!(authorizer.properties["Name"], "jwt");
        assert_eq!(authorizer.properties["AuthorizerResultTtlInSeconds"], 300);
        assert_eq!(
            authorizer.properties["IdentitySource"],
            "method.request.header.Authorization"
        );
        let permission = template.resource("JwtAuthorizerPermission").unwrap();
        assert_eq!(permission.properties["Principal"], "apigateway.amazonaws.com");
    }

    #[test]
    fn test_preflight_is_open_and_unauthorized() {
        let template = synthesize(&api());
        for id in ["ApiGatewayOPTIONS", "ApiGatewayCoursesOPTIONS"] {
            let method = template.resource(id).unwrap();
            assert_eq!(method.properties["AuthorizationType"], "NONE");
            assert!(method.properties.get("RequestParameters").is_none());
            let response = &method.properties["Integration"]["IntegrationResponses"][0];
            assert_eq!(response["StatusCode"], "200");
            assert_eq!(
                response["ResponseParameters"]["method.response.header.Access-Control-Allow-Origin"],
                "'*'"
            );
            assert!(
                response["ResponseParameters"]
                    .get("method.response.header.Access-Control-Allow-Credentials")
                    .is_none()
            );
        }
    }

    #[test]
    fn test_stage_and_output() {
        let template = synthesize(&api());
        let stage = template.resource("ApiGatewayDeploymentStage").unwrap();
        assert_eq!(stage.properties["StageName"], "test");
        assert_eq!(stage.properties["MethodSettings"][0]["LoggingLevel"], "ERROR");
        assert_eq!(stage.properties["MethodSettings"][0]["MetricsEnabled"], true);

        let deployment = template.resource("ApiGatewayDeployment").unwrap();
        assert!(deployment.depends_on.contains(&"ApiGatewayCoursesGET".to_string()));

        let output = &template.outputs["ApiGatewayEndpoint"];
        assert_eq!(
            output.export.as_ref().unwrap().name,
            json!("classesAPI-test-api-url")
        );
    }

    #[test]
    fn test_cors_validation() {
        let mut cors = CorsOptions::allow_all();
        cors.allow_credentials = true;
        assert!(
            RestApi::new("Api", "api", "", deploy())
                .unwrap()
                .with_cors(cors)
                .is_err()
        );

        let cors = CorsOptions {
            allow_origins: vec!["https://a.nd.edu".to_string(), "https://b.nd.edu".to_string()],
            allow_credentials: true,
            status_code: 204,
        };
        let api = RestApi::new("Api", "api", "", deploy())
            .unwrap()
            .with_cors(cors)
            .unwrap()
            .add_route(route())
            .unwrap();
        let template = synthesize(&api);
        let response = &template.resource("ApiOPTIONS").unwrap().properties["Integration"]
            ["IntegrationResponses"][0];
        assert_eq!(response["StatusCode"], "204");
        assert_eq!(response["ResponseParameters"]["method.response.header.Vary"], "'Origin'");
        assert!(
            response["ResponseTemplates"]["application/json"]
                .as_str()
                .unwrap()
                .contains("$origin.matches(\"https://b.nd.edu\")")
        );
    }

    #[test]
    fn test_route_validation() {
        let api = RestApi::new("Api", "api", "", deploy()).unwrap();
        let mut bad = route();
        bad.path_part = "courses/{id}".to_string();
        assert!(api.clone().add_route(bad).is_err());

        let mut bad = route();
        bad.method = "FETCH".to_string();
        assert!(api.clone().add_route(bad).is_err());

        let twice = api.add_route(route()).unwrap().add_route(route());
        assert!(matches!(twice, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_api_without_routes_is_rejected() {
        let api = RestApi::new("Api", "api", "", deploy()).unwrap();
        let mut template = Template::new("test");
        assert!(api.add_to(&mut template).is_err());
    }

    #[test]
    fn test_authorizer_ttl_limit() {
        assert!(TokenAuthorizer::new("A", "jwt", "arn", "Authorization", 3601).is_err());
    }
}
