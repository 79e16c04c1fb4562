//! End-to-end tests of the `blueprints` binary

// Integration tests can use unwrap/expect for cleaner assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CONFIG: &str = r#"
[app]
stages = ["test", "prod"]

[pipeline]
git_owner = "ndlib"
git_token_path = "/all/github/ndlib-git"
service_repository = "classes-api"
service_branch = "main"
blueprints_repository = "classes-api-blueprints"
blueprints_branch = "main"
email_receivers = "wse@nd.edu"
contact = "wse@nd.edu"
owner = "WSE"
sentry_token_path = "/all/sentry/token"
sentry_org = "ndlib"
sentry_project = "classes-api"

[service]
stage = "test"
lambda_code_path = "../src"
sentry_project = "classes-api"
sentry_version = "local"
"#;

fn workspace(config: &str) -> TempDir {
    let dir = tempfile::Builder::new()
        .prefix("blueprints_test_")
        .tempdir()
        .expect("Failed to create temp directory");
    fs::write(dir.path().join("blueprints.toml"), config).unwrap();
    dir
}

fn blueprints(dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("blueprints").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG").env_remove("BLUEPRINTS_CONFIG");
    cmd
}

#[test]
fn test_list_shows_both_stacks() {
    let dir = workspace(CONFIG);
    blueprints(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("classesAPI-pipeline"))
        .stdout(predicate::str::contains("classesAPI-test"));
}

#[test]
fn test_synth_writes_assembly() {
    let dir = workspace(CONFIG);
    blueprints(dir.path())
        .args(["synth", "--out", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("manifest.json"));

    let out = dir.path().join("out");
    let manifest: Value =
        serde_json::from_str(&fs::read_to_string(out.join("manifest.json")).unwrap()).unwrap();
    let names: Vec<_> = manifest["stacks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["classesAPI-pipeline", "classesAPI-test"]);

    let pipeline: Value = serde_json::from_str(
        &fs::read_to_string(out.join("classesAPI-pipeline.template.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        pipeline["Resources"]["CodePipeline"]["Type"],
        "AWS::CodePipeline::Pipeline"
    );
}

#[test]
fn test_synth_single_stack_with_context() {
    let dir = workspace(CONFIG);
    blueprints(dir.path())
        .args([
            "synth",
            "classesAPI-prod",
            "--format",
            "yaml",
            "--out",
            "out",
            "--context",
            "stage=prod",
            "--context",
            "sentryVersion=abc123",
        ])
        .assert()
        .success();

    let template = fs::read_to_string(dir.path().join("out/classesAPI-prod.template.yaml")).unwrap();
    assert!(template.contains("classes-api@abc123"));
    assert!(!dir.path().join("out/classesAPI-pipeline.template.yaml").exists());
}

#[test]
fn test_unknown_stack_is_a_config_error() {
    let dir = workspace(CONFIG);
    blueprints(dir.path())
        .args(["synth", "nope", "--out", "out"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown stack 'nope'"));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    blueprints(dir.path())
        .arg("list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("blueprints.toml"));
}

#[test]
fn test_uncovered_stage_fails_with_json_error() {
    let dir = workspace(&CONFIG.replace(r#"stages = ["test", "prod"]"#, r#"stages = ["test"]"#));
    let output = blueprints(dir.path())
        .args(["validate", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let envelope: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["error"]["code"], "config");
    assert!(envelope["error"]["message"].as_str().unwrap().contains("prod"));
}

#[test]
fn test_validate_reports_every_stack() {
    let dir = workspace(CONFIG);
    blueprints(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 stack(s) valid"));
}

#[test]
fn test_policy_covers_requested_stages() {
    let dir = workspace(CONFIG);
    let output = blueprints(dir.path())
        .args(["policy", "--stage", "test", "--stage", "dev"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let document: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(document["Version"], "2012-10-17");
    let text = document.to_string();
    assert!(text.contains("classesAPI-dev"));
    assert!(!text.contains("classesAPI-prod"));
}

#[test]
fn test_invalid_policy_stage() {
    let dir = workspace(CONFIG);
    blueprints(dir.path())
        .args(["policy", "--stage", "Prod"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid stage name"));
}

#[test]
fn test_unknown_context_key_is_rejected_by_parser() {
    let dir = workspace(CONFIG);
    blueprints(dir.path())
        .args(["list", "--context", "region=us-east-1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown context key"));
}

#[test]
fn test_stack_name_context_renames_every_stack() {
    let dir = workspace(CONFIG);
    blueprints(dir.path())
        .args(["list", "--context", "serviceStackName=coursesAPI"])
        .assert()
        .success()
        .stdout(predicate::str::contains("coursesAPI-pipeline"))
        .stdout(predicate::str::contains("coursesAPI-test"));
}

#[test]
fn test_misspelled_app_key_fails() {
    let dir = workspace(&CONFIG.replace("[app]\n", "[app]\nservice_stack_prefx = \"coursesAPI\"\n"));
    blueprints(dir.path())
        .arg("list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("service_stack_prefx"));
}

#[test]
fn test_relative_parameter_root_fails_policy() {
    let dir = workspace(&CONFIG.replace("[app]\n", "[app]\nparameter_root = \"all\"\n"));
    blueprints(dir.path())
        .arg("policy")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("parameter_root 'all'"));
}
