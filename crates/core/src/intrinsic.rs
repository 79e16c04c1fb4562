//! Intrinsic functions and dynamic references
//!
//! Helpers that build the JSON shapes the deployment engine resolves at
//! deploy time (`Ref`, `Fn::GetAtt`, `Fn::Sub`, ...).

use crate::arn::needs_substitution;
use serde_json::{Value, json};

/// `{"Ref": logical_id}`
#[must_use]
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [logical_id, attribute]}`
#[must_use]
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Sub": template}`
#[must_use]
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

/// `{"Fn::Join": [delimiter, parts]}`
#[must_use]
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{"Fn::ImportValue": name}`
#[must_use]
pub fn import_value(name: &str) -> Value {
    json!({ "Fn::ImportValue": name })
}

/// Wrap `value` in `Fn::Sub` only when it carries a placeholder
#[must_use]
pub fn string_or_sub(value: &str) -> Value {
    if needs_substitution(value) {
        sub(value)
    } else {
        Value::String(value.to_string())
    }
}

/// Dynamic reference to a JSON field of a Secrets Manager secret.
///
/// The value is resolved by the deployment engine and never stored in the
/// template.
#[must_use]
pub fn secrets_manager_reference(secret_id: &str, json_field: &str) -> String {
    format!("{{{{resolve:secretsmanager:{secret_id}:SecretString:{json_field}::}}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        assert_eq!(reference("Role"), json!({ "Ref": "Role" }));
        assert_eq!(
            get_att("Bucket", "Arn"),
            json!({ "Fn::GetAtt": ["Bucket", "Arn"] })
        );
        assert_eq!(
            join("", vec![get_att("Bucket", "Arn"), json!("/*")]),
            json!({ "Fn::Join": ["", [{ "Fn::GetAtt": ["Bucket", "Arn"] }, "/*"]] })
        );
        assert_eq!(import_value("x:Arn"), json!({ "Fn::ImportValue": "x:Arn" }));
    }

    #[test]
    fn test_string_or_sub() {
        assert_eq!(string_or_sub("plain"), json!("plain"));
        assert_eq!(
            string_or_sub("arn:aws:iam::${AWS::AccountId}:role/x"),
            json!({ "Fn::Sub": "arn:aws:iam::${AWS::AccountId}:role/x" })
        );
    }

    #[test]
    fn test_secrets_manager_reference() {
        assert_eq!(
            secrets_manager_reference("/all/github/ndlib-git", "oauth"),
            "{{resolve:secretsmanager:/all/github/ndlib-git:SecretString:oauth::}}"
        );
    }
}
