//! Rollout Deployment Engine
//!
//! Runs function rollouts using pluggable strategies and keeps the
//! deployment and version records consistent while doing so.
//!
//! ## Architectural Boundaries
//!
//! - `rollout-validator` owns: the rules a rollout must pass (called BY strategies)
//! - `rollout-deployment` owns: strategies, status transitions, traffic shifting
//! - `rollout-control` owns: the public operations, locking and policy
//!
//! Strategies reach storage, hooks, alarms and the traffic layer only
//! through [`DeploymentContext`], so every collaborator can be swapped.
//!
//! ## Usage
//!
//! ```no_run
//! use rollout_deployment::catalog::InMemoryFunctionCatalog;
//! use rollout_deployment::hooks::{NoopHookInvoker, QuietAlarmEvaluator};
//! use rollout_deployment::routing::InMemoryTrafficRouter;
//! use rollout_deployment::state::{
//!     InMemoryDeploymentRepository, InMemoryEnvironmentRepository, InMemoryVersionRepository,
//! };
//! use rollout_deployment::{create_strategy, DeploymentContext};
//! use rollout_types::{DeploymentId, StrategyType, VersionId};
//! use std::sync::Arc;
//!
//! # async fn example(deployment_id: DeploymentId, version_id: VersionId) {
//! let ctx = DeploymentContext::new(
//!     Arc::new(InMemoryDeploymentRepository::new()),
//!     Arc::new(InMemoryVersionRepository::new()),
//!     Arc::new(InMemoryEnvironmentRepository::new()),
//!     Arc::new(InMemoryFunctionCatalog::new()),
//!     Arc::new(NoopHookInvoker),
//!     Arc::new(QuietAlarmEvaluator),
//!     Arc::new(InMemoryTrafficRouter::new()),
//! );
//!
//! let strategy = create_strategy(StrategyType::Canary);
//! let config = strategy.default_configuration();
//! let outcome = strategy.deploy(&ctx, &deployment_id, &version_id, &config).await;
//! if outcome.should_rollback() {
//!     strategy.rollback(&ctx, &deployment_id).await;
//! }
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod catalog;
pub mod context;
pub mod error;
pub mod hooks;
pub mod routing;
pub mod signal;
pub mod state;
pub mod strategies;

// Re-exports
pub use context::DeploymentContext;
pub use error::{CollaboratorError, DeploymentError, Result};
pub use signal::{StopHandle, StopSignal};
pub use state::{DeploymentRepository, EnvironmentRepository, RepositoryError, VersionRepository};
pub use strategies::{create_strategy, RolloutFailure, RolloutOutcome, Strategy};
