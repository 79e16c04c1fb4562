//! ARN templating
//!
//! Resource identifiers are built by a single pure function so they can be
//! unit tested without any cloud context. Region and account slots either
//! carry a literal value or the `${AWS::...}` pseudo parameter that the
//! deployment engine substitutes at deploy time.

use crate::error::{Error, Result};
use std::borrow::Cow;

/// Pseudo parameters that may appear inside `${...}` placeholders.
pub const PSEUDO_PARAMETERS: &[&str] = &[
    "AWS::AccountId",
    "AWS::Region",
    "AWS::StackName",
    "AWS::Partition",
    "AWS::URLSuffix",
];

/// Placeholder for the deploying account
pub const ACCOUNT_ID: &str = "${AWS::AccountId}";
/// Placeholder for the deploying region
pub const REGION: &str = "${AWS::Region}";
/// Placeholder for the owning stack's name
pub const STACK_NAME: &str = "${AWS::StackName}";

/// Region or account slot of an ARN.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Locator {
    /// Resolved from the deploying environment
    #[default]
    Current,
    /// A fixed value
    Literal(String),
    /// Empty slot (global services such as S3 and API Gateway paths)
    Omitted,
}

impl Locator {
    /// Locator from an optional literal, falling back to [`Locator::Current`]
    #[must_use]
    pub fn from_option(value: Option<&str>) -> Self {
        value.map_or(Self::Current, |v| Self::Literal(v.to_string()))
    }

    fn render(&self, pseudo: &'static str) -> Cow<'_, str> {
        match self {
            Self::Current => Cow::Borrowed(pseudo),
            Self::Literal(value) => Cow::Borrowed(value.as_str()),
            Self::Omitted => Cow::Borrowed(""),
        }
    }
}

/// Render `arn:aws:<service>:<region>:<account>:<fragments...>`.
///
/// Fragments are concatenated verbatim, so callers choose the resource
/// separator (`role/`, `function:`, `parameter/`, ...).
///
/// ```
/// use blueprints_core::arn::{arn, Locator};
///
/// let role = arn("iam", &Locator::Omitted, &Locator::Current, &["role/", "classesAPI-test", "*"]);
/// assert_eq!(role, "arn:aws:iam::${AWS::AccountId}:role/classesAPI-test*");
/// ```
#[must_use]
pub fn arn(service: &str, region: &Locator, account: &Locator, fragments: &[&str]) -> String {
    format!(
        "arn:aws:{service}:{}:{}:{}",
        region.render(REGION),
        account.render(ACCOUNT_ID),
        fragments.concat()
    )
}

/// Whether the string contains a `${...}` placeholder and must be wrapped in
/// `Fn::Sub` before it reaches the template.
#[must_use]
pub fn needs_substitution(value: &str) -> bool {
    value.contains("${")
}

/// Reject malformed `${...}` placeholders.
///
/// # Errors
///
/// Returns [`Error::MalformedTemplate`] for an unterminated or empty
/// placeholder, or one naming an unknown pseudo parameter.
pub fn validate_substitution(template: &str) -> Result<()> {
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(Error::malformed(template, "unterminated '${' placeholder"));
        };
        let name = &after[..end];
        if name.is_empty() {
            return Err(Error::malformed(template, "empty placeholder"));
        }
        if name.contains("${") {
            return Err(Error::malformed(template, "nested placeholder"));
        }
        if name.starts_with("AWS::") && !PSEUDO_PARAMETERS.contains(&name) {
            return Err(Error::malformed(
                template,
                format!("unknown pseudo parameter '{name}'"),
            ));
        }
        rest = &after[end + 1..];
    }
    Ok(())
}
