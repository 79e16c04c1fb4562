//! Tests for error types

use blueprints_core::error::require;
use blueprints_core::{Error, StageName, StageSet};
use miette::Diagnostic;
use std::path::Path;

fn code(error: &Error) -> String {
    error.code().map(|c| c.to_string()).unwrap_or_default()
}

#[test]
fn test_stage_errors() {
    let error = StageName::new("Prod").unwrap_err();
    assert_eq!(error.to_string(), "Invalid stage name 'Prod'");
    assert_eq!(code(&error), "blueprints::stage::invalid");
    assert!(error.help().is_some());

    let error = StageSet::new(Vec::<String>::new()).unwrap_err();
    assert_eq!(error.to_string(), "Stage set is empty");

    let error = StageSet::new(["test", "prod", "test"]).unwrap_err();
    assert_eq!(error.to_string(), "Stage 'test' is listed more than once");
    assert_eq!(code(&error), "blueprints::stage::duplicate");
}

#[test]
fn test_uncovered_stage_error() {
    let stages = StageSet::new(["test"]).unwrap();
    let error = stages.ensure_covers(&StageName::prod()).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Stage 'prod' is deployed but the build role only covers [test]"
    );
    assert_eq!(code(&error), "blueprints::stage::uncovered");
}

#[test]
fn test_missing_field_error() {
    let error = require("pipeline", "git_owner", "  ").unwrap_err();
    assert_eq!(
        error.to_string(),
        "pipeline: required field 'git_owner' is missing"
    );
    assert!(require("pipeline", "git_owner", "ndlib").is_ok());
}

#[test]
fn test_invalid_config_error() {
    let error = Error::invalid_config("function", "timeout 0 s is outside 1..=900");
    assert_eq!(error.to_string(), "function: timeout 0 s is outside 1..=900");
    assert_eq!(code(&error), "blueprints::config::invalid");
}

#[test]
fn test_malformed_template_error() {
    let error = Error::malformed("arn:aws:s3:::${Bucket", "unclosed placeholder");
    assert_eq!(
        error.to_string(),
        "Malformed resource-name template 'arn:aws:s3:::${Bucket': unclosed placeholder"
    );
}

#[test]
fn test_unknown_stack_error() {
    let error = Error::UnknownStack {
        name: "classesAPI-dev".to_string(),
        available: "classesAPI-pipeline, classesAPI-test".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Unknown stack 'classesAPI-dev'. Available: classesAPI-pipeline, classesAPI-test"
    );
}

#[test]
fn test_io_error() {
    let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let error = Error::io(source, Path::new("/tmp/cdk.out"), "write");
    assert_eq!(
        error.to_string(),
        "I/O error during write of /tmp/cdk.out: denied"
    );
    assert!(std::error::Error::source(&error).is_some());
}

#[test]
fn test_serialization_error() {
    let error = Error::serialization("unexpected end of input");
    assert_eq!(
        error.to_string(),
        "Serialization failed: unexpected end of input"
    );
}
