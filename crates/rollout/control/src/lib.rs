//! Rollout Control Plane
//!
//! The deployment orchestrator: one entry point for creating deployments,
//! rolling versions out, stopping and rolling back, promoting between
//! environments and managing the environments and versions involved.
//!
//! ## Architectural Boundaries
//!
//! - `rollout-control` owns: the public operations, per-deployment locking,
//!   the automatic rollback policy and metrics bookkeeping
//! - `rollout-deployment` owns: how each strategy moves traffic
//! - `rollout-validator` owns: what counts as a valid entity
//!
//! Operations that mutate one deployment's rollout state are serialized per
//! deployment. `stop_deployment` and `update_traffic_routing` bypass that
//! lock so they can reach a rollout in flight.
//!
//! ## Usage
//!
//! ```no_run
//! use rollout_control::DeploymentOrchestratorBuilder;
//! use rollout_deployment::catalog::InMemoryFunctionCatalog;
//! use rollout_types::{DeploymentConfiguration, DeploymentEnvironment, FunctionId};
//! use std::sync::Arc;
//!
//! # async fn example(env: DeploymentEnvironment) -> rollout_control::Result<()> {
//! let orchestrator = DeploymentOrchestratorBuilder::new()
//!     .with_function_lookup(Arc::new(InMemoryFunctionCatalog::new()))
//!     .build()?;
//!
//! let env = orchestrator.create_environment(env).await?;
//! let report = orchestrator
//!     .deploy_function(&FunctionId::new("resize"), &env.id, DeploymentConfiguration::all_at_once())
//!     .await?;
//! println!("{} is {}", report.deployment.id, report.status());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod builder;
pub mod config;
pub mod control_plane;
pub mod environments;
pub mod error;
pub mod locks;
pub mod policy;
pub mod telemetry;
pub mod versions;

pub use builder::DeploymentOrchestratorBuilder;
pub use config::{ControlConfig, LoggingConfig, RolloutSettings};
pub use control_plane::{CreateDeploymentRequest, DeploymentOrchestrator, RollbackReport, RolloutReport};
pub use error::{ControlPlaneError, Result};
pub use locks::KeyedLocks;
pub use policy::RollbackPolicy;
pub use telemetry::init_tracing;
