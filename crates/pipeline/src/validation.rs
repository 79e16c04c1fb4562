//! Pipeline Validation
//!
//! Checks a pipeline definition for structural correctness before it is
//! emitted. Every violation is collected, not just the first.

use crate::schema::{Action, MAX_RUN_ORDER, MIN_RUN_ORDER, Pipeline, is_valid_name};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Validation errors for pipeline definitions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Pipeline has no stages")]
    EmptyPipeline,

    #[error("Stage '{stage}' has no actions")]
    EmptyStage { stage: String },

    #[error("{kind} name '{name}' is invalid")]
    InvalidName { kind: &'static str, name: String },

    #[error("Stage '{stage}' is declared more than once")]
    DuplicateStage { stage: String },

    #[error("Stage '{stage}' declares action '{action}' more than once")]
    DuplicateAction { stage: String, action: String },

    #[error("Source action '{action}' must be in the first stage, found in '{stage}'")]
    SourceOutsideFirstStage { stage: String, action: String },

    #[error("First stage '{stage}' may only contain source actions, found '{action}'")]
    NonSourceInFirstStage { stage: String, action: String },

    #[error("Action '{stage}/{action}' has run-order {run_order} (must be 1..=999)")]
    InvalidRunOrder {
        stage: String,
        action: String,
        run_order: u32,
    },

    #[error("Source action '{stage}/{action}' must produce exactly one artifact")]
    SourceOutput { stage: String, action: String },

    #[error("Build action '{stage}/{action}' has no input artifact")]
    BuildWithoutInput { stage: String, action: String },

    #[error("Artifact '{artifact}' is produced by both '{first}' and '{second}'")]
    ArtifactProducedTwice {
        artifact: String,
        first: String,
        second: String,
    },

    #[error("Action '{stage}/{action}' consumes '{artifact}' which no earlier action produces")]
    MissingInput {
        stage: String,
        action: String,
        artifact: String,
    },

    #[error(
        "Approval '{stage}/{action}' has run-order {run_order} but must be strictly after every other action in its stage"
    )]
    ApprovalNotLast {
        stage: String,
        action: String,
        run_order: u32,
    },
}

/// Validator for pipeline definitions
pub struct PipelineValidator<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> PipelineValidator<'a> {
    /// Create a new validator for the given pipeline
    #[must_use]
    pub fn new(pipeline: &'a Pipeline) -> Self {
        Self { pipeline }
    }

    /// Validate the entire pipeline
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.pipeline.stages.is_empty() {
            errors.push(ValidationError::EmptyPipeline);
            return Err(errors);
        }

        self.validate_structure(&mut errors);
        self.validate_artifacts(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Names, placement, run-orders and approval ordering
    fn validate_structure(&self, errors: &mut Vec<ValidationError>) {
        let mut stage_names = HashSet::new();

        for (index, stage) in self.pipeline.stages.iter().enumerate() {
            if !is_valid_name(&stage.name) {
                errors.push(ValidationError::InvalidName {
                    kind: "Stage",
                    name: stage.name.clone(),
                });
            }
            if !stage_names.insert(stage.name.as_str()) {
                errors.push(ValidationError::DuplicateStage {
                    stage: stage.name.clone(),
                });
            }
            if stage.actions.is_empty() {
                errors.push(ValidationError::EmptyStage {
                    stage: stage.name.clone(),
                });
                continue;
            }

            let mut action_names = HashSet::new();
            for action in &stage.actions {
                if !is_valid_name(&action.name) {
                    errors.push(ValidationError::InvalidName {
                        kind: "Action",
                        name: action.name.clone(),
                    });
                }
                if !action_names.insert(action.name.as_str()) {
                    errors.push(ValidationError::DuplicateAction {
                        stage: stage.name.clone(),
                        action: action.name.clone(),
                    });
                }
                if !(MIN_RUN_ORDER..=MAX_RUN_ORDER).contains(&action.run_order) {
                    errors.push(ValidationError::InvalidRunOrder {
                        stage: stage.name.clone(),
                        action: action.name.clone(),
                        run_order: action.run_order,
                    });
                }
                match (index == 0, action.is_source()) {
                    (false, true) => errors.push(ValidationError::SourceOutsideFirstStage {
                        stage: stage.name.clone(),
                        action: action.name.clone(),
                    }),
                    (true, false) => errors.push(ValidationError::NonSourceInFirstStage {
                        stage: stage.name.clone(),
                        action: action.name.clone(),
                    }),
                    _ => {}
                }
                self.validate_action_shape(&stage.name, action, errors);
            }

            for approval in stage.actions.iter().filter(|a| a.is_approval()) {
                let blocked = stage.actions.iter().any(|other| {
                    !std::ptr::eq(other, approval) && other.run_order >= approval.run_order
                });
                if blocked {
                    errors.push(ValidationError::ApprovalNotLast {
                        stage: stage.name.clone(),
                        action: approval.name.clone(),
                        run_order: approval.run_order,
                    });
                }
            }
        }
    }

    fn validate_action_shape(&self, stage: &str, action: &Action, errors: &mut Vec<ValidationError>) {
        match &action.kind {
            crate::schema::ActionKind::GitHubSource(_) if action.outputs.len() != 1 => {
                errors.push(ValidationError::SourceOutput {
                    stage: stage.to_string(),
                    action: action.name.clone(),
                });
            }
            crate::schema::ActionKind::CodeBuild(_) if action.inputs.is_empty() => {
                errors.push(ValidationError::BuildWithoutInput {
                    stage: stage.to_string(),
                    action: action.name.clone(),
                });
            }
            _ => {}
        }
    }

    /// Every artifact is produced once, before anything consumes it
    fn validate_artifacts(&self, errors: &mut Vec<ValidationError>) {
        let mut producers: HashMap<&str, String> = HashMap::new();
        for (stage, action) in self.pipeline.actions() {
            for output in &action.outputs {
                if !is_valid_name(output.name()) {
                    errors.push(ValidationError::InvalidName {
                        kind: "Artifact",
                        name: output.name().to_string(),
                    });
                }
                let producer = format!("{}/{}", stage.name, action.name);
                if let Some(first) = producers.get(output.name()) {
                    errors.push(ValidationError::ArtifactProducedTwice {
                        artifact: output.name().to_string(),
                        first: first.clone(),
                        second: producer,
                    });
                } else {
                    producers.insert(output.name(), producer);
                }
            }
        }

        let mut available: HashSet<&str> = HashSet::new();
        for stage in &self.pipeline.stages {
            let ordered = stage.ordered_actions();
            let mut in_stage: Vec<(u32, &str)> = Vec::new();
            for action in &ordered {
                for input in &action.inputs {
                    let earlier_in_stage = in_stage
                        .iter()
                        .any(|(order, name)| *order < action.run_order && *name == input.name());
                    if !available.contains(input.name()) && !earlier_in_stage {
                        errors.push(ValidationError::MissingInput {
                            stage: stage.name.clone(),
                            action: action.name.clone(),
                            artifact: input.name().to_string(),
                        });
                    }
                }
                for output in &action.outputs {
                    in_stage.push((action.run_order, output.name()));
                }
            }
            available.extend(in_stage.into_iter().map(|(_, name)| name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Artifact, GitHubSource, SourceTrigger, Stage};

    fn source(name: &str, output: &str) -> Action {
        Action::github_source(
            name,
            GitHubSource {
                owner: "ndlib".to_string(),
                repo: "repo".to_string(),
                branch: "main".to_string(),
                oauth_token: "token".to_string(),
                trigger: SourceTrigger::None,
            },
            Artifact::new(output),
        )
    }

    fn build(name: &str, input: &str) -> Action {
        Action::code_build(name, "Project", Artifact::new(input), vec![])
    }

    fn pipeline(stages: Vec<Stage>) -> Pipeline {
        stages
            .into_iter()
            .fold(Pipeline::new("CodePipeline", "Role", "Bucket"), Pipeline::add_stage)
    }

    fn errors(pipeline: &Pipeline) -> Vec<ValidationError> {
        PipelineValidator::new(pipeline).validate().unwrap_err()
    }

    #[test]
    fn test_valid_pipeline() {
        let p = pipeline(vec![
            Stage::new("Source", vec![source("Src", "AppCode")]),
            Stage::new(
                "Deploy",
                vec![
                    build("Build", "AppCode"),
                    Action::manual_approval("Approve", None, None).with_run_order(2),
                ],
            ),
        ]);
        assert!(PipelineValidator::new(&p).validate().is_ok());
    }

    #[test]
    fn test_empty_pipeline_and_stage() {
        assert_eq!(errors(&pipeline(vec![])), vec![ValidationError::EmptyPipeline]);
        let p = pipeline(vec![
            Stage::new("Source", vec![source("Src", "AppCode")]),
            Stage::new("Empty", vec![]),
        ]);
        assert_eq!(
            errors(&p),
            vec![ValidationError::EmptyStage {
                stage: "Empty".to_string()
            }]
        );
    }

    #[test]
    fn test_collects_every_violation() {
        let p = pipeline(vec![
            Stage::new("Source", vec![source("Src", "AppCode"), build("Early", "AppCode")]),
            Stage::new(
                "Deploy",
                vec![
                    source("Late", "Other"),
                    build("Build", "Missing").with_run_order(1000),
                    build("Build", "AppCode"),
                ],
            ),
            Stage::new("Deploy", vec![build("Again", "AppCode")]),
        ]);
        let found = errors(&p);
        assert!(found.contains(&ValidationError::NonSourceInFirstStage {
            stage: "Source".to_string(),
            action: "Early".to_string()
        }));
        assert!(found.contains(&ValidationError::SourceOutsideFirstStage {
            stage: "Deploy".to_string(),
            action: "Late".to_string()
        }));
        assert!(found.contains(&ValidationError::InvalidRunOrder {
            stage: "Deploy".to_string(),
            action: "Build".to_string(),
            run_order: 1000
        }));
        assert!(found.contains(&ValidationError::DuplicateAction {
            stage: "Deploy".to_string(),
            action: "Build".to_string()
        }));
        assert!(found.contains(&ValidationError::DuplicateStage {
            stage: "Deploy".to_string()
        }));
        assert!(found.contains(&ValidationError::MissingInput {
            stage: "Deploy".to_string(),
            action: "Build".to_string(),
            artifact: "Missing".to_string()
        }));
    }

    #[test]
    fn test_artifact_produced_twice() {
        let p = pipeline(vec![Stage::new(
            "Source",
            vec![source("A", "AppCode"), source("B", "AppCode")],
        )]);
        assert!(matches!(
            errors(&p).as_slice(),
            [ValidationError::ArtifactProducedTwice { .. }]
        ));
    }

    #[test]
    fn test_input_from_same_stage_needs_lower_run_order() {
        let mut producer = build("Package", "AppCode");
        producer.outputs.push(Artifact::new("Bundle"));
        let consumer_same_order = build("Publish", "Bundle");
        let p = pipeline(vec![
            Stage::new("Source", vec![source("Src", "AppCode")]),
            Stage::new("Build", vec![producer.clone(), consumer_same_order.clone()]),
        ]);
        assert!(matches!(
            errors(&p).as_slice(),
            [ValidationError::MissingInput { .. }]
        ));

        let p = pipeline(vec![
            Stage::new("Source", vec![source("Src", "AppCode")]),
            Stage::new("Build", vec![producer, consumer_same_order.with_run_order(2)]),
        ]);
        assert!(PipelineValidator::new(&p).validate().is_ok());
    }

    #[test]
    fn test_approval_must_be_strictly_last() {
        let p = pipeline(vec![
            Stage::new("Source", vec![source("Src", "AppCode")]),
            Stage::new(
                "Deploy",
                vec![
                    Action::manual_approval("Approve", None, None).with_run_order(98),
                    build("Smoke", "AppCode").with_run_order(98),
                ],
            ),
        ]);
        assert_eq!(
            errors(&p),
            vec![ValidationError::ApprovalNotLast {
                stage: "Deploy".to_string(),
                action: "Approve".to_string(),
                run_order: 98
            }]
        );
    }

    #[test]
    fn test_source_and_build_shapes() {
        let mut src = source("Src", "AppCode");
        src.outputs.clear();
        let mut b = build("Build", "AppCode");
        b.inputs.clear();
        let p = pipeline(vec![
            Stage::new("Source", vec![src]),
            Stage::new("Deploy", vec![b]),
        ]);
        let found = errors(&p);
        assert!(found.iter().any(|e| matches!(e, ValidationError::SourceOutput { .. })));
        assert!(found.iter().any(|e| matches!(e, ValidationError::BuildWithoutInput { .. })));
    }
}
