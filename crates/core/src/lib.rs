//! Core types for the classes API blueprints.
//!
//! This crate provides the building blocks shared by every stack:
//! - [`StageName`] / [`StageSet`] for validated deployment stages
//! - [`arn::arn`] and [`arn::validate_substitution`] for resource identifiers
//! - [`Template`] / [`Resource`] for the deployment description schema
//! - [`StackDefinition`] / [`StackRegistry`] for synthesizing stacks by name
//! - [`assembly::CloudAssembly`] for writing synthesized templates to disk

#![warn(missing_docs)]

pub mod arn;
pub mod assembly;
pub mod context;
pub mod error;
pub mod intrinsic;
pub mod stack;
pub mod stage;
pub mod template;

pub use context::SynthContext;
pub use error::{Error, Result};
pub use stack::{StackDefinition, StackRegistry, SynthesizedStack};
pub use stage::{StageName, StageSet};
pub use template::{Output, Parameter, Resource, Template};
