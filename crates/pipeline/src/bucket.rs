//! Artifact storage bucket

use blueprints_core::template::validate_logical_id;
use blueprints_core::{Resource, Result, Template, intrinsic};
use blueprints_iam::BucketRef;
use serde_json::json;

/// Encrypted, private, retained bucket holding pipeline artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactBucket {
    logical_id: String,
}

impl ArtifactBucket {
    /// Create the bucket declaration.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid logical id.
    pub fn new(logical_id: impl Into<String>) -> Result<Self> {
        let logical_id = logical_id.into();
        validate_logical_id(&logical_id)?;
        Ok(Self { logical_id })
    }

    /// Logical id of the bucket resource
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Reference usable in permission statements
    #[must_use]
    pub fn bucket_ref(&self) -> BucketRef {
        BucketRef::managed(self.logical_id.clone())
    }

    fn policy_logical_id(&self) -> String {
        format!("{}Policy", self.logical_id)
    }

    /// Bucket and bucket policy resources
    #[must_use]
    pub fn resources(&self) -> Vec<(String, Resource)> {
        let bucket = Resource::new(
            "AWS::S3::Bucket",
            json!({
                "BucketEncryption": {
                    "ServerSideEncryptionConfiguration": [{
                        "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
                    }]
                },
                "PublicAccessBlockConfiguration": {
                    "BlockPublicAcls": true,
                    "BlockPublicPolicy": true,
                    "IgnorePublicAcls": true,
                    "RestrictPublicBuckets": true
                }
            }),
        )
        .retained();

        let arn = intrinsic::get_att(&self.logical_id, "Arn");
        let policy = Resource::new(
            "AWS::S3::BucketPolicy",
            json!({
                "Bucket": intrinsic::reference(&self.logical_id),
                "PolicyDocument": {
                    "Version": blueprints_iam::role::POLICY_VERSION,
                    "Statement": [{
                        "Sid": "DenyInsecureTransport",
                        "Effect": "Deny",
                        "Principal": { "AWS": "*" },
                        "Action": "s3:*",
                        "Resource": [arn.clone(), intrinsic::join("", vec![arn, json!("/*")])],
                        "Condition": { "Bool": { "aws:SecureTransport": "false" } }
                    }]
                }
            }),
        );

        vec![
            (self.logical_id.clone(), bucket),
            (self.policy_logical_id(), policy),
        ]
    }

    /// Add the bucket to a template.
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
    use blueprints_core::template::RetentionPolicy;

    #[test]
    fn test_bucket_is_private_encrypted_and_retained() {
        let resources = ArtifactBucket::new("ArtifactBucket").unwrap().resources();
        let (id, bucket) = &resources[0];
        assert_eq!(id, "ArtifactBucket");
        assert_eq!(bucket.deletion_policy, Some(RetentionPolicy::Retain));
        assert_eq!(
            bucket.properties["BucketEncryption"]["ServerSideEncryptionConfiguration"][0]
                ["ServerSideEncryptionByDefault"]["SSEAlgorithm"],
            "AES256"
        );
        assert_eq!(
            bucket.properties["PublicAccessBlockConfiguration"]["RestrictPublicBuckets"],
            true
        );
    }

    #[test]
    fn test_policy_denies_insecure_transport() {
        let resources = ArtifactBucket::new("ArtifactBucket").unwrap().resources();
        let (id, policy) = &resources[1];
        assert_eq!(id, "ArtifactBucketPolicy");
        let statement = &policy.properties["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Effect"], "Deny");
        assert_eq!(statement["Condition"]["Bool"]["aws:SecureTransport"], "false");
    }

    #[test]
    fn test_bucket_ref_is_managed() {
        let bucket = ArtifactBucket::new("ArtifactBucket").unwrap();
        assert_eq!(bucket.bucket_ref(), BucketRef::managed("ArtifactBucket"));
    }
}
