//! Least-privilege permission statements and roles.
//!
//! - [`PolicyAssembler`] builds the build identity's statements from a stage
//!   set and an artifact bucket
//! - [`Role`] turns statements into an assumable identity

#![warn(missing_docs)]

pub mod policy;
pub mod role;
pub mod statement;

pub use policy::{PolicyAssembler, PolicyNaming};
pub use role::{Role, ServicePrincipal};
pub use statement::{BucketRef, Concern, Effect, PolicyStatement, ResourcePattern};
