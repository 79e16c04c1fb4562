//! CloudFormation Template Schema Types
//!
//! Defines the data structures for deployment-description generation.
//! See: <https://docs.aws.amazon.com/AWSCloudFormation/latest/UserGuide/template-anatomy.html>

use crate::error::{Error, Result};
use crate::intrinsic;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// Template format version emitted in every template
pub const FORMAT_VERSION: &str = "2010-09-09";

/// A complete deployment description for one stack.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    /// Template format version
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    /// Human readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Deploy-time parameters (order preserved via `IndexMap`)
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, Parameter>,

    /// Resources keyed by logical id
    pub resources: IndexMap<String, Resource>,

    /// Stack outputs
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, Output>,
}

/// A resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    /// Resource type, e.g. `AWS::IAM::Role`
    #[serde(rename = "Type")]
    pub resource_type: String,

    /// Resource properties
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,

    /// Explicit ordering dependencies
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// What happens to the physical resource when the stack drops it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<RetentionPolicy>,

    /// What happens to the old physical resource on replacement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<RetentionPolicy>,

    /// Free-form metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Resource {
    /// Create a resource of the given type with the given properties.
    ///
    /// Non-object property values produce an empty property map.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            resource_type: resource_type.into(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
            metadata: None,
        }
    }

    /// Add an explicit dependency on another logical id
    #[must_use]
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    /// Retain the physical resource on delete and on replacement
    #[must_use]
    pub const fn retained(mut self) -> Self {
        self.deletion_policy = Some(RetentionPolicy::Retain);
        self.update_replace_policy = Some(RetentionPolicy::Retain);
        self
    }

    /// Attach metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Look up a property
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// Deletion / replacement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RetentionPolicy {
    /// Delete the physical resource
    Delete,
    /// Keep the physical resource
    Retain,
}

/// A deploy-time parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    /// Parameter type, e.g. `String`
    #[serde(rename = "Type")]
    pub parameter_type: String,

    /// Default value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Description shown by the deployment tool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    /// A plain string parameter
    #[must_use]
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            parameter_type: "String".to_string(),
            default: None,
            description: Some(description.into()),
        }
    }
}

/// A stack output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    /// Output value
    pub value: Value,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Cross-stack export
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
}

/// Cross-stack export name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Export {
    /// Export name
    pub name: Value,
}

impl Template {
    /// Create an empty template
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description: Some(description.into()),
            parameters: IndexMap::new(),
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    /// Add a resource.
    ///
    /// # Errors
    ///
    /// Fails on an invalid or already used logical id.
    pub fn add_resource(&mut self, logical_id: impl Into<String>, resource: Resource) -> Result<()> {
        let logical_id = logical_id.into();
        self.claim(&logical_id)?;
        tracing::debug!(
            logical_id = %logical_id,
            resource_type = %resource.resource_type,
            "Adding resource"
        );
        self.resources.insert(logical_id, resource);
        Ok(())
    }

    /// Add several resources in order.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid or duplicate logical id.
    pub fn extend_resources(
        &mut self,
        resources: impl IntoIterator<Item = (String, Resource)>,
    ) -> Result<()> {
        for (logical_id, resource) in resources {
            self.add_resource(logical_id, resource)?;
        }
        Ok(())
    }

    /// Add a parameter.
    ///
    /// # Errors
    ///
    /// Fails on an invalid or already used logical id.
    pub fn add_parameter(&mut self, logical_id: impl Into<String>, parameter: Parameter) -> Result<()> {
        let logical_id = logical_id.into();
        self.claim(&logical_id)?;
        self.parameters.insert(logical_id, parameter);
        Ok(())
    }

    /// Add an output.
    ///
    /// # Errors
    ///
    /// Fails on an invalid or already used logical id.
    pub fn add_output(&mut self, logical_id: impl Into<String>, output: Output) -> Result<()> {
        let logical_id = logical_id.into();
        validate_logical_id(&logical_id)?;
        if self.outputs.contains_key(&logical_id) {
            return Err(Error::DuplicateLogicalId { id: logical_id });
        }
        self.outputs.insert(logical_id, output);
        Ok(())
    }

    /// Reference a string value held in the remote parameter store.
    ///
    /// Registers an `AWS::SSM::Parameter::Value<String>` parameter whose
    /// default is the parameter path and returns a `Ref` to it. Asking for
    /// the same path twice reuses the parameter.
    ///
    /// # Errors
    ///
    /// Fails if the derived logical id collides with a resource.
    pub fn ssm_parameter(&mut self, path: &str) -> Result<Value> {
        let logical_id = ssm_logical_id(path);
        if !self.parameters.contains_key(&logical_id) {
            self.add_parameter(
                logical_id.clone(),
                Parameter {
                    parameter_type: "AWS::SSM::Parameter::Value<String>".to_string(),
                    default: Some(path.to_string()),
                    description: None,
                },
            )?;
        }
        Ok(intrinsic::reference(&logical_id))
    }

    /// Look up a resource by logical id
    #[must_use]
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Iterate resources of one type
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    fn claim(&self, logical_id: &str) -> Result<()> {
        validate_logical_id(logical_id)?;
        if self.resources.contains_key(logical_id) || self.parameters.contains_key(logical_id) {
            return Err(Error::DuplicateLogicalId {
                id: logical_id.to_string(),
            });
        }
        Ok(())
    }
}

/// Validate a logical id.
///
/// # Errors
///
/// Returns [`Error::InvalidLogicalId`] unless the id is non-empty ASCII
/// alphanumeric.
pub fn validate_logical_id(logical_id: &str) -> Result<()> {
    if logical_id.is_empty() || !logical_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidLogicalId {
            id: logical_id.to_string(),
        });
    }
    Ok(())
}

/// Derive a logical id from arbitrary text by dropping non-alphanumerics
/// and capitalising the character that follows each dropped run.
#[must_use]
pub fn logical_id_from(text: &str) -> String {
    let mut id = String::with_capacity(text.len());
    let mut upper_next = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if upper_next {
                id.push(c.to_ascii_uppercase());
            } else {
                id.push(c);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    id
}

fn ssm_logical_id(path: &str) -> String {
    format!("SsmParameterValue{}", logical_id_from(path))
}
