//! Continuous-delivery pipeline for the classes API.
//!
//! - [`buildspec`] and [`project`]: the deploy and smoke-test build tasks
//! - [`schema`], [`validation`] and [`emitter`]: the pipeline definition,
//!   its structural checks and its template rendering
//! - [`bucket`] and [`notifications`]: artifact storage and notification
//!   channels
//! - [`stack`]: everything wired into one [`PipelineStack`]

#![warn(missing_docs)]

pub mod bucket;
pub mod buildspec;
pub mod emitter;
pub mod notifications;
pub mod project;
pub mod schema;
pub mod stack;
pub mod validation;

pub use bucket::ArtifactBucket;
pub use buildspec::{BuildSpec, Phase};
pub use emitter::PipelineEmitter;
pub use notifications::{PipelineNotifications, SlackApproval, Topic};
pub use project::{BuildProject, DeploymentProps, EnvironmentVariable, ProjectKind};
pub use schema::{Action, ActionKind, Artifact, Pipeline, SourceTrigger, Stage};
pub use stack::{PipelineStack, PipelineStackConfig};
pub use validation::{PipelineValidator, ValidationError};
