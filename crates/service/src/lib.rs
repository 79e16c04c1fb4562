//! Classes API service stack.
//!
//! A passthrough [`function::ComputeFunction`] behind a token-authorized
//! [`api::RestApi`], wired together by [`ServiceStack`].

#![warn(missing_docs)]

pub mod api;
pub mod function;
pub mod stack;

pub use api::{CorsOptions, DeployOptions, LoggingLevel, PassthroughBehavior, RestApi, Route, TokenAuthorizer};
pub use function::{ComputeFunction, EnvironmentValue, FunctionProps};
pub use stack::{ServiceStack, ServiceStackConfig};
