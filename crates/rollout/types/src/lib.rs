//! Rollout Core Types
//!
//! Shared type definitions for function deployment orchestration: the
//! Deployment, DeploymentVersion and DeploymentEnvironment entities, the
//! configuration value objects that drive each rollout strategy, and the
//! itemized validation result every gate produces.
//!
//! ## Entity ownership
//!
//! - A [`Deployment`] binds one function to one environment under one strategy.
//! - A [`DeploymentVersion`] is a frozen snapshot of the function, referenced
//!   (never owned) by the deployment's current/previous pointers.
//! - A [`DeploymentEnvironment`] is created independently and only referenced.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod configuration;
pub mod deployment;
pub mod environment;
pub mod function;
pub mod ids;
pub mod status;
pub mod validation;
pub mod version;

pub use configuration::*;
pub use deployment::*;
pub use environment::*;
pub use function::*;
pub use ids::*;
pub use status::*;
pub use validation::*;
pub use version::*;
