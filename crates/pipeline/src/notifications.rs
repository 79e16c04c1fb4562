//! Notification topics
//!
//! Pipeline state changes go to an email topic; manual approvals go to a
//! dedicated topic that a chat relay may subscribe to.

use blueprints_core::arn::{self, Locator};
use blueprints_core::template::validate_logical_id;
use blueprints_core::{Error, Resource, Result, Template, intrinsic};
use serde_json::{Value, json};

/// Event type forwarded to the notification topic
pub const PIPELINE_STATE_CHANGE: &str = "CodePipeline Pipeline Execution State Change";

/// An SNS topic.
#[derive(Debug, Clone)]
pub struct Topic {
    logical_id: String,
    display_name: String,
}

impl Topic {
    /// Create a topic.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid logical id.
    pub fn new(logical_id: impl Into<String>, display_name: impl Into<String>) -> Result<Self> {
        let logical_id = logical_id.into();
        validate_logical_id(&logical_id)?;
        Ok(Self {
            logical_id,
            display_name: display_name.into(),
        })
    }

    /// Logical id of the topic resource
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// `Ref` of the topic, which is its ARN
    #[must_use]
    pub fn arn(&self) -> Value {
        intrinsic::reference(&self.logical_id)
    }

    /// The `AWS::SNS::Topic` resource
    #[must_use]
    pub fn to_resource(&self) -> Resource {
        Resource::new(
            "AWS::SNS::Topic",
            json!({ "DisplayName": self.display_name }),
        )
    }

    /// Add the topic to a template.
    ///
    /// # Errors
    ///
    /// Fails on a logical id collision.
    pub fn add_to(&self, template: &mut Template) -> Result<()> {
        template.add_resource(self.logical_id.clone(), self.to_resource())
    }
}

/// Split a comma separated list of email addresses.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] for an empty list or an entry without `@`.
pub fn parse_receivers(receivers: &str) -> Result<Vec<String>> {
    let parsed: Vec<String> = receivers
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(ToString::to_string)
        .collect();

    if parsed.is_empty() {
        return Err(Error::invalid_config(
            "pipeline notifications",
            "at least one email receiver is required",
        ));
    }
    if let Some(bad) = parsed.iter().find(|r| !r.contains('@')) {
        return Err(Error::invalid_config(
            "pipeline notifications",
            format!("'{bad}' is not an email address"),
        ));
    }
    Ok(parsed)
}

/// Broadcasts pipeline execution state changes to email receivers.
#[derive(Debug, Clone)]
pub struct PipelineNotifications {
    logical_id: String,
    topic: Topic,
    receivers: Vec<String>,
    pipeline_logical_id: String,
    region: Locator,
    account: Locator,
}

impl PipelineNotifications {
    /// Create the notifications for `pipeline_logical_id`.
    ///
    /// # Errors
    ///
    /// Fails on invalid logical ids or receivers.
    pub fn new(
        logical_id: impl Into<String>,
        pipeline_logical_id: impl Into<String>,
        receivers: &str,
        ctx: &blueprints_core::SynthContext,
    ) -> Result<Self> {
        let logical_id = logical_id.into();
        let pipeline_logical_id = pipeline_logical_id.into();
        validate_logical_id(&logical_id)?;
        validate_logical_id(&pipeline_logical_id)?;
        let topic = Topic::new(format!("{logical_id}Topic"), "Pipeline notifications")?;
        Ok(Self {
            logical_id,
            topic,
            receivers: parse_receivers(receivers)?,
            pipeline_logical_id,
            region: ctx.region_locator(),
            account: ctx.account_locator(),
        })
    }

    /// Email receivers
    #[must_use]
    pub fn receivers(&self) -> &[String] {
        &self.receivers
    }

    /// The notification topic
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Topic, subscriptions, event rule and topic policy
    #[must_use]
    pub fn resources(&self) -> Vec<(String, Resource)> {
        let mut resources = vec![(self.topic.logical_id.clone(), self.topic.to_resource())];

        for (index, receiver) in self.receivers.iter().enumerate() {
            resources.push((
                format!("{}Subscription{index}", self.topic.logical_id),
                Resource::new(
                    "AWS::SNS::Subscription",
                    json!({
                        "Protocol": "email",
                        "Endpoint": receiver,
                        "TopicArn": self.topic.arn()
                    }),
                ),
            ));
        }

        let pipeline_name = format!("${{{}}}", self.pipeline_logical_id);
        let pipeline_arn = arn::arn(
            "codepipeline",
            &self.region,
            &self.account,
            &[pipeline_name.as_str()],
        );
        resources.push((
            format!("{}Rule", self.logical_id),
            Resource::new(
                "AWS::Events::Rule",
                json!({
                    "Description": "Pipeline execution state changes",
                    "State": "ENABLED",
                    "EventPattern": {
                        "source": ["aws.codepipeline"],
                        "detail-type": [PIPELINE_STATE_CHANGE],
                        "resources": [intrinsic::sub(&pipeline_arn)]
                    },
                    "Targets": [{
                        "Id": "Target0",
                        "Arn": self.topic.arn()
                    }]
                }),
            ),
        ));

        resources.push((
            format!("{}Policy", self.topic.logical_id),
            Resource::new(
                "AWS::SNS::TopicPolicy",
                json!({
                    "Topics": [self.topic.arn()],
                    "PolicyDocument": {
                        "Version": blueprints_iam::role::POLICY_VERSION,
                        "Statement": [{
                            "Sid": "AllowEventsToPublish",
                            "Effect": "Allow",
                            "Principal": { "Service": "events.amazonaws.com" },
                            "Action": "sns:Publish",
                            "Resource": self.topic.arn()
                        }]
                    }
                }),
            ),
        ));

        resources
    }

    /// Add every notification resource to a template.
    ///
    /// # Errors
    ///
    /// Fails on a logical id collision.
    pub fn add_to(&self, template: &mut Template) -> Result<()> {
        template.extend_resources(self.resources())
    }
}

/// Relays approval notifications to a chat system.
///
/// The relay function lives in another stack, which exports its ARN as
/// `<stack>:LambdaArn`.
#[derive(Debug, Clone)]
pub struct SlackApproval {
    logical_id: String,
    approval_topic_logical_id: String,
    notify_stack_name: String,
}

impl SlackApproval {
    /// Subscribe the relay of `notify_stack_name` to the approval topic.
    ///
    /// # Errors
    ///
    /// Fails on an invalid logical id or a blank stack name.
    pub fn new(
        logical_id: impl Into<String>,
        approval_topic: &Topic,
        notify_stack_name: impl Into<String>,
    ) -> Result<Self> {
        let logical_id = logical_id.into();
        let notify_stack_name = notify_stack_name.into();
        validate_logical_id(&logical_id)?;
        blueprints_core::error::require("slack approval", "slack_notify_stack_name", &notify_stack_name)?;
        Ok(Self {
            logical_id,
            approval_topic_logical_id: approval_topic.logical_id.clone(),
            notify_stack_name,
        })
    }

    /// Name of the export holding the relay function's ARN
    #[must_use]
    pub fn export_name(&self) -> String {
        format!("{}:LambdaArn", self.notify_stack_name)
    }

    /// Subscription and invoke permission
    #[must_use]
    pub fn resources(&self) -> Vec<(String, Resource)> {
        let function = intrinsic::import_value(&self.export_name());
        let topic = intrinsic::reference(&self.approval_topic_logical_id);
        vec![
            (
                format!("{}Subscription", self.logical_id),
                Resource::new(
                    "AWS::SNS::Subscription",
                    json!({
                        "Protocol": "lambda",
                        "Endpoint": function,
                        "TopicArn": topic
                    }),
                ),
            ),
            (
                format!("{}Permission", self.logical_id),
                Resource::new(
                    "AWS::Lambda::Permission",
                    json!({
                        "Action": "lambda:InvokeFunction",
                        "FunctionName": function,
                        "Principal": "sns.amazonaws.com",
                        "SourceArn": topic
                    }),
                ),
            ),
        ]
    }

    /// Add the relay resources to a template.
    ///
    /// # Errors
    ///
    /// Fails on a logical id collision.
    pub fn add_to(&self, template: &mut Template) -> Result<()> {
        template.extend_resources(self.resources())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprints_core::SynthContext;

    #[test]
    fn test_parse_receivers() {
        assert_eq!(
            parse_receivers("a@nd.edu, b@nd.edu,").unwrap(),
            vec!["a@nd.edu".to_string(), "b@nd.edu".to_string()]
        );
        assert!(matches!(
            parse_receivers(" , "),
            Err(Error::InvalidConfig { .. })
        ));
        let err = parse_receivers("a@nd.edu,nobody").unwrap_err();
        assert!(err.to_string().contains("'nobody'"));
    }

    #[test]
    fn test_notification_resources() {
        let notifications = PipelineNotifications::new(
            "PipelineNotifications",
            "CodePipeline",
            "a@nd.edu,b@nd.edu",
            &SynthContext::default(),
        )
        .unwrap();
        let resources = notifications.resources();
        let ids: Vec<_> = resources.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "PipelineNotificationsTopic",
                "PipelineNotificationsTopicSubscription0",
                "PipelineNotificationsTopicSubscription1",
                "PipelineNotificationsRule",
                "PipelineNotificationsTopicPolicy",
            ]
        );

        let rule = &resources[3].1;
        assert_eq!(
            rule.properties["EventPattern"]["resources"][0],
            json!({ "Fn::Sub": "arn:aws:codepipeline:${AWS::Region}:${AWS::AccountId}:${CodePipeline}" })
        );
        assert_eq!(rule.properties["Targets"][0]["Arn"], json!({ "Ref": "PipelineNotificationsTopic" }));
    }

    #[test]
    fn test_slack_approval() {
        let topic = Topic::new("PipelineApprovalTopic", "PipelineApprovalTopic").unwrap();
        let slack = SlackApproval::new("SlackApproval", &topic, "slack-approval-bot").unwrap();
        let resources = slack.resources();
        assert_eq!(resources[0].0, "SlackApprovalSubscription");
        assert_eq!(
            resources[0].1.properties["Endpoint"],
            json!({ "Fn::ImportValue": "slack-approval-bot:LambdaArn" })
        );
        assert_eq!(resources[1].1.properties["Principal"], "sns.amazonaws.com");
        assert_eq!(
            resources[1].1.properties["SourceArn"],
            json!({ "Ref": "PipelineApprovalTopic" })
        );
    }

    #[test]
    fn test_slack_approval_requires_stack_name() {
        let topic = Topic::new("PipelineApprovalTopic", "PipelineApprovalTopic").unwrap();
        assert!(SlackApproval::new("SlackApproval", &topic, "").is_err());
    }
}
