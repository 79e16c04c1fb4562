//! Permission statements
//!
//! A [`PolicyStatement`] grants a list of actions on a list of resource
//! patterns. Every statement belongs to exactly one [`Concern`] and may only
//! carry actions that concern admits.

use blueprints_core::arn::{self, Locator};
use blueprints_core::intrinsic;
use blueprints_core::{Error, Result};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Concern group of a permission statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concern {
    /// Inspect the identity's own inline policies
    SelfIntrospection,
    /// Manage roles under the per-stage service prefixes
    IamRoles,
    /// Enumerated account-wide read-only actions
    AccountWideRead,
    /// Create log groups and streams of the owning deployment
    LogStreams,
    /// Write log events of the owning deployment
    LogEvents,
    /// Bucket-level access to the artifact and staging buckets
    StorageBuckets,
    /// Object-level access to the artifact and staging buckets
    StorageObjects,
    /// Manage compute functions under the per-stage service prefixes
    ComputeFunctions,
    /// Manage the per-stage service deployments
    DeploymentLifecycle,
    /// Read the bootstrap deployment's status
    BootstrapStatus,
    /// Account-level routing-layer settings
    RoutingAccount,
    /// Create routing-layer instances
    RoutingCreate,
    /// Manage any routing-layer instance
    RoutingInstances,
    /// Read configuration parameters
    ConfigRead,
    /// Read secrets
    SecretRead,
    /// Write configuration parameters of the application
    ConfigWrite,
    /// Start and inspect builds
    BuildExecution,
    /// Publish notifications
    Notification,
}

impl Concern {
    /// Every concern, in assembly order
    pub const ALL: [Self; 18] = [
        Self::SelfIntrospection,
        Self::IamRoles,
        Self::AccountWideRead,
        Self::LogStreams,
        Self::LogEvents,
        Self::StorageBuckets,
        Self::StorageObjects,
        Self::ComputeFunctions,
        Self::DeploymentLifecycle,
        Self::BootstrapStatus,
        Self::RoutingAccount,
        Self::RoutingCreate,
        Self::RoutingInstances,
        Self::ConfigRead,
        Self::SecretRead,
        Self::ConfigWrite,
        Self::BuildExecution,
        Self::Notification,
    ];

    /// Concern name, also used as the statement id
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SelfIntrospection => "SelfIntrospection",
            Self::IamRoles => "IamRoles",
            Self::AccountWideRead => "AccountWideRead",
            Self::LogStreams => "LogStreams",
            Self::LogEvents => "LogEvents",
            Self::StorageBuckets => "StorageBuckets",
            Self::StorageObjects => "StorageObjects",
            Self::ComputeFunctions => "ComputeFunctions",
            Self::DeploymentLifecycle => "DeploymentLifecycle",
            Self::BootstrapStatus => "BootstrapStatus",
            Self::RoutingAccount => "RoutingAccount",
            Self::RoutingCreate => "RoutingCreate",
            Self::RoutingInstances => "RoutingInstances",
            Self::ConfigRead => "ConfigRead",
            Self::SecretRead => "SecretRead",
            Self::ConfigWrite => "ConfigWrite",
            Self::BuildExecution => "BuildExecution",
            Self::Notification => "Notification",
        }
    }

    /// Action patterns admitted by this concern.
    ///
    /// A trailing `*` admits every action of the service.
    #[must_use]
    pub const fn admitted_actions(self) -> &'static [&'static str] {
        match self {
            Self::SelfIntrospection => &[
                "iam:GetRolePolicy",
                "iam:ListRolePolicies",
                "iam:ListAttachedRolePolicies",
            ],
            Self::IamRoles => &[
                "iam:GetRole",
                "iam:GetRolePolicy",
                "iam:CreateRole",
                "iam:DeleteRole",
                "iam:DeleteRolePolicy",
                "iam:AttachRolePolicy",
                "iam:DetachRolePolicy",
                "iam:PutRolePolicy",
                "iam:PassRole",
                "iam:TagRole",
                "iam:UntagRole",
            ],
            Self::AccountWideRead => ACCOUNT_WIDE_READ_ACTIONS,
            Self::LogStreams => &["logs:CreateLogGroup", "logs:CreateLogStream"],
            Self::LogEvents => &["logs:PutLogEvents"],
            Self::StorageBuckets => &[
                "s3:ListBucket",
                "s3:ListBucketVersions",
                "s3:GetBucketLocation",
                "s3:GetBucketPolicy",
            ],
            Self::StorageObjects => &[
                "s3:GetObject",
                "s3:GetObjectVersion",
                "s3:PutObject",
            ],
            Self::ComputeFunctions => &["lambda:*"],
            Self::DeploymentLifecycle => &[
                "cloudformation:DescribeStacks",
                "cloudformation:DescribeStackEvents",
                "cloudformation:DescribeChangeSet",
                "cloudformation:CreateChangeSet",
                "cloudformation:ExecuteChangeSet",
                "cloudformation:DeleteChangeSet",
                "cloudformation:DeleteStack",
                "cloudformation:GetTemplate",
            ],
            Self::BootstrapStatus => &["cloudformation:DescribeStacks"],
            Self::RoutingAccount => &["apigateway:PATCH"],
            Self::RoutingCreate => &["apigateway:POST"],
            Self::RoutingInstances => &["apigateway:*"],
            Self::ConfigRead => &[
                "ssm:GetParametersByPath",
                "ssm:GetParameter",
                "ssm:GetParameters",
            ],
            Self::SecretRead => &[
                "secretsmanager:GetSecretValue",
                "secretsmanager:DescribeSecret",
                "secretsmanager:ListSecretVersionIds",
            ],
            Self::ConfigWrite => &[
                "ssm:PutParameter",
                "ssm:DeleteParameter",
                "ssm:AddTagsToResource",
                "ssm:RemoveTagsFromResource",
            ],
            Self::BuildExecution => &[
                "codebuild:StartBuild",
                "codebuild:BatchGetBuilds",
                "codebuild:StopBuild",
            ],
            Self::Notification => &["sns:Publish"],
        }
    }

    /// Whether `action` belongs to this concern
    #[must_use]
    pub fn admits(self, action: &str) -> bool {
        self.admitted_actions().iter().any(|pattern| {
            pattern.strip_suffix('*').map_or(*pattern == action, |prefix| {
                action.starts_with(prefix)
            })
        })
    }

    /// Concerns whose resources are scoped by the per-stage service prefix
    #[must_use]
    pub const fn is_per_stage(self) -> bool {
        matches!(
            self,
            Self::IamRoles | Self::ComputeFunctions | Self::DeploymentLifecycle
        )
    }
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions that may be granted on every resource (`*`).
pub const ACCOUNT_WIDE_READ_ACTIONS: &[&str] = &["cloudformation:ListExports"];

/// Statement effect. Statements only ever allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum Effect {
    /// Allow the actions
    #[default]
    Allow,
}

/// A resource pattern of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePattern {
    /// A fixed identifier, or `*`
    Literal(String),
    /// An identifier carrying `${...}` placeholders
    Sub(String),
    /// `Ref` of a resource in the same template
    Reference(String),
    /// `Fn::GetAtt` of a resource in the same template
    Attribute {
        /// Logical id
        logical_id: String,
        /// Attribute name, usually `Arn`
        attribute: String,
    },
    /// `Fn::GetAtt` followed by a literal suffix
    AttributeSuffix {
        /// Logical id
        logical_id: String,
        /// Attribute name, usually `Arn`
        attribute: String,
        /// Appended suffix, e.g. `/*`
        suffix: String,
    },
}

impl ResourcePattern {
    /// Every resource
    #[must_use]
    pub fn any() -> Self {
        Self::Literal("*".to_string())
    }

    /// A literal or substituted pattern depending on its content
    #[must_use]
    pub fn templated(value: impl Into<String>) -> Self {
        let value = value.into();
        if arn::needs_substitution(&value) {
            Self::Sub(value)
        } else {
            Self::Literal(value)
        }
    }

    /// `Arn` attribute of a resource
    #[must_use]
    pub fn arn_of(logical_id: impl Into<String>) -> Self {
        Self::Attribute {
            logical_id: logical_id.into(),
            attribute: "Arn".to_string(),
        }
    }

    /// Whether this pattern grants every resource
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Literal(value) if value == "*")
    }

    /// Template value of this pattern
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Literal(value) => Value::String(value.clone()),
            Self::Sub(value) => intrinsic::sub(value),
            Self::Reference(logical_id) => intrinsic::reference(logical_id),
            Self::Attribute {
                logical_id,
                attribute,
            } => intrinsic::get_att(logical_id, attribute),
            Self::AttributeSuffix {
                logical_id,
                attribute,
                suffix,
            } => intrinsic::join(
                "",
                vec![
                    intrinsic::get_att(logical_id, attribute),
                    Value::String(suffix.clone()),
                ],
            ),
        }
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) | Self::Sub(value) => f.write_str(value),
            Self::Reference(logical_id) => write!(f, "${{{logical_id}}}"),
            Self::Attribute {
                logical_id,
                attribute,
            } => write!(f, "${{{logical_id}.{attribute}}}"),
            Self::AttributeSuffix {
                logical_id,
                attribute,
                suffix,
            } => write!(f, "${{{logical_id}.{attribute}}}{suffix}"),
        }
    }
}

impl Serialize for ResourcePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// The artifact storage location granted to a build identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketRef {
    /// A bucket declared in the same template
    Managed {
        /// Logical id of the bucket resource
        logical_id: String,
    },
    /// A bucket that already exists
    Existing {
        /// Bucket name
        name: String,
    },
}

impl BucketRef {
    /// A bucket declared in the same template
    #[must_use]
    pub fn managed(logical_id: impl Into<String>) -> Self {
        Self::Managed {
            logical_id: logical_id.into(),
        }
    }

    /// Bucket-level pattern (the bucket ARN)
    #[must_use]
    pub fn bucket_pattern(&self) -> ResourcePattern {
        match self {
            Self::Managed { logical_id } => ResourcePattern::arn_of(logical_id.clone()),
            Self::Existing { name } => ResourcePattern::Literal(bucket_arn(name)),
        }
    }

    /// Object-level pattern (`<bucket-arn>/*`)
    #[must_use]
    pub fn objects_pattern(&self) -> ResourcePattern {
        match self {
            Self::Managed { logical_id } => ResourcePattern::AttributeSuffix {
                logical_id: logical_id.clone(),
                attribute: "Arn".to_string(),
                suffix: "/*".to_string(),
            },
            Self::Existing { name } => ResourcePattern::Literal(format!("{}/*", bucket_arn(name))),
        }
    }
}

fn bucket_arn(name: &str) -> String {
    arn::arn("s3", &Locator::Omitted, &Locator::Omitted, &[name])
}

/// An allow-rule pairing resource patterns with actions of one concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    /// Statement id
    pub sid: String,
    /// Concern group
    #[serde(skip)]
    pub concern: Concern,
    /// Always [`Effect::Allow`]
    pub effect: Effect,
    /// Granted actions
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    /// Resource patterns
    #[serde(rename = "Resource")]
    pub resources: Vec<ResourcePattern>,
}

impl PolicyStatement {
    /// Create a statement whose id is the concern name
    #[must_use]
    pub fn new(concern: Concern, actions: &[&str], resources: Vec<ResourcePattern>) -> Self {
        Self {
            sid: concern.as_str().to_string(),
            concern,
            effect: Effect::Allow,
            actions: actions.iter().map(|a| (*a).to_string()).collect(),
            resources,
        }
    }

    /// Whether any resource pattern renders to `needle`
    #[must_use]
    pub fn covers(&self, needle: &str) -> bool {
        self.resources.iter().any(|r| r.to_string() == needle)
    }

    /// Check the statement against its concern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every violation.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();

        if self.actions.is_empty() {
            violations.push("statement grants no actions".to_string());
        }
        if self.resources.is_empty() {
            violations.push("statement names no resources".to_string());
        }
        for action in &self.actions {
            if !self.concern.admits(action) {
                violations.push(format!(
                    "action '{action}' does not belong to concern {}",
                    self.concern
                ));
            }
        }
        if self.resources.iter().any(ResourcePattern::is_wildcard) {
            let read_only = self.concern == Concern::AccountWideRead
                && self
                    .actions
                    .iter()
                    .all(|a| ACCOUNT_WIDE_READ_ACTIONS.contains(&a.as_str()));
            if !read_only {
                violations.push(
                    "'*' resources are only allowed for account-wide read-only actions".to_string(),
                );
            }
        }
        for resource in &self.resources {
            if let ResourcePattern::Sub(template) = resource
                && let Err(err) = arn::validate_substitution(template)
            {
                violations.push(err.to_string());
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                component: format!("statement {}", self.sid),
                violations,
            })
        }
    }

    /// Template value of this statement
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_admits_exact_and_wildcard() {
        assert!(Concern::IamRoles.admits("iam:PassRole"));
        assert!(!Concern::IamRoles.admits("s3:GetObject"));
        assert!(Concern::ComputeFunctions.admits("lambda:*"));
        assert!(Concern::ComputeFunctions.admits("lambda:UpdateFunctionCode"));
        assert!(!Concern::ComputeFunctions.admits("lambdax:Invoke"));
        assert!(Concern::RoutingInstances.admits("apigateway:DELETE"));
    }

    #[test]
    fn test_statement_serialization() {
        let statement = PolicyStatement::new(
            Concern::StorageObjects,
            &["s3:GetObject", "s3:PutObject"],
            vec![BucketRef::managed("ArtifactBucket").objects_pattern()],
        );
        assert_eq!(
            statement.to_value(),
            json!({
                "Sid": "StorageObjects",
                "Effect": "Allow",
                "Action": ["s3:GetObject", "s3:PutObject"],
                "Resource": [{
                    "Fn::Join": ["", [{ "Fn::GetAtt": ["ArtifactBucket", "Arn"] }, "/*"]]
                }]
            })
        );
    }

    #[test]
    fn test_pattern_display() {
        assert_eq!(
            BucketRef::managed("ArtifactBucket").objects_pattern().to_string(),
            "${ArtifactBucket.Arn}/*"
        );
        assert_eq!(
            BucketRef::Existing {
                name: "artifacts".to_string()
            }
            .bucket_pattern()
            .to_string(),
            "arn:aws:s3:::artifacts"
        );
        assert_eq!(ResourcePattern::Reference("Topic".to_string()).to_string(), "${Topic}");
    }

    #[test]
    fn test_templated_picks_variant() {
        assert!(matches!(
            ResourcePattern::templated("arn:aws:s3:::bucket"),
            ResourcePattern::Literal(_)
        ));
        assert!(matches!(
            ResourcePattern::templated("arn:aws:ssm:${AWS::Region}:x"),
            ResourcePattern::Sub(_)
        ));
    }

    #[test]
    fn test_validate_rejects_mixed_concerns() {
        let statement = PolicyStatement::new(
            Concern::StorageObjects,
            &["s3:GetObject", "iam:PassRole"],
            vec![ResourcePattern::Literal("arn:aws:s3:::b/*".to_string())],
        );
        let err = statement.validate().unwrap_err();
        assert!(err.to_string().contains("iam:PassRole"));
    }

    #[test]
    fn test_validate_wildcard_only_for_account_wide_read() {
        let ok = PolicyStatement::new(
            Concern::AccountWideRead,
            &["cloudformation:ListExports"],
            vec![ResourcePattern::any()],
        );
        assert!(ok.validate().is_ok());

        let bad = PolicyStatement::new(
            Concern::ComputeFunctions,
            &["lambda:*"],
            vec![ResourcePattern::any()],
        );
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_and_malformed() {
        let empty = PolicyStatement::new(Concern::LogEvents, &[], vec![]);
        match empty.validate().unwrap_err() {
            Error::Validation { violations, .. } => assert_eq!(violations.len(), 2),
            other => panic!("unexpected error: {other}"),
        }

        let malformed = PolicyStatement::new(
            Concern::LogEvents,
            &["logs:PutLogEvents"],
            vec![ResourcePattern::Sub("arn:aws:logs:${AWS::Regio".to_string())],
        );
        assert!(malformed.validate().is_err());
    }

    #[test]
    fn test_every_concern_has_actions() {
        for concern in Concern::ALL {
            assert!(!concern.admitted_actions().is_empty(), "{concern}");
        }
    }
}
