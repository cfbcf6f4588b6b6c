//! Rollout strategy implementations
//!
//! Every strategy shares one deploy/rollback sequence (see [`base`]): load
//! and validate, run pre-deployment hooks, hand over to the strategy body,
//! run post-deployment hooks, then settle statuses. Only the body differs.

pub mod all_at_once;
pub mod base;
pub mod blue_green;
pub mod canary;

pub use all_at_once::AllAtOnceStrategy;
pub use base::{RollbackMode, RollbackPlan, RolloutPlan};
pub use blue_green::BlueGreenStrategy;
pub use canary::CanaryStrategy;

use crate::context::DeploymentContext;
use crate::error::Result;
use async_trait::async_trait;
use rollout_types::{
    DeploymentConfiguration, DeploymentId, DeploymentStatus, RollbackEvent, StrategyType,
    TrafficRouting, VersionId,
};
use std::sync::Arc;

/// Why a rollout or rollback did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutFailure {
    /// Event that a rollback policy can match against
    pub event: RollbackEvent,
    pub reason: String,
    /// Traffic may have moved, so rolling back is meaningful
    pub rollback_recommended: bool,
}

/// Terminal outcome of a strategy operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutOutcome {
    pub status: DeploymentStatus,
    pub failure: Option<RolloutFailure>,
}

impl RolloutOutcome {
    pub fn completed(status: DeploymentStatus) -> Self {
        Self {
            status,
            failure: None,
        }
    }

    pub fn failed(
        status: DeploymentStatus,
        event: RollbackEvent,
        reason: impl Into<String>,
        rollback_recommended: bool,
    ) -> Self {
        Self {
            status,
            failure: Some(RolloutFailure {
                event,
                reason: reason.into(),
                rollback_recommended,
            }),
        }
    }

    /// Check if the operation completed
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Check if rollback is recommended
    pub fn should_rollback(&self) -> bool {
        self.failure
            .as_ref()
            .map(|f| f.rollback_recommended)
            .unwrap_or(false)
    }

    pub fn reason(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.reason.as_str())
    }
}

/// Trait for rollout strategies
#[async_trait]
pub trait Strategy: Send + Sync {
    fn strategy_type(&self) -> StrategyType;

    /// Strategy name for logging
    fn name(&self) -> &str;

    /// Whether `config` has the shape this strategy needs
    fn validate_configuration(&self, config: &DeploymentConfiguration) -> bool;

    fn default_configuration(&self) -> DeploymentConfiguration;

    /// Strategy-specific rollout body; the deployment is `Deploying`
    async fn execute_rollout(&self, ctx: &DeploymentContext, plan: &RolloutPlan) -> Result<()>;

    /// Strategy-specific rollback body; the deployment is `RollingBack`
    async fn execute_rollback(&self, ctx: &DeploymentContext, plan: &RollbackPlan) -> Result<()>;

    /// Roll `version_id` out under `config`
    async fn deploy(
        &self,
        ctx: &DeploymentContext,
        deployment_id: &DeploymentId,
        version_id: &VersionId,
        config: &DeploymentConfiguration,
    ) -> RolloutOutcome {
        base::deploy(self, ctx, deployment_id, version_id, config).await
    }

    /// Move traffic back to the last known good version
    async fn rollback(&self, ctx: &DeploymentContext, deployment_id: &DeploymentId) -> RolloutOutcome {
        base::rollback(self, ctx, deployment_id).await
    }

    /// Apply a routing change; strategies without gradual shifting ignore it
    async fn update_traffic_routing(
        &self,
        ctx: &DeploymentContext,
        deployment_id: &DeploymentId,
        _routing: &TrafficRouting,
    ) -> Result<DeploymentStatus> {
        Ok(ctx.deployment(deployment_id).await?.status)
    }
}

/// Factory for creating strategies
pub fn create_strategy(strategy: StrategyType) -> Arc<dyn Strategy> {
    match strategy {
        StrategyType::AllAtOnce => Arc::new(AllAtOnceStrategy::new()),
        StrategyType::BlueGreen => Arc::new(BlueGreenStrategy::new()),
        StrategyType::Canary => Arc::new(CanaryStrategy::new()),
    }
}
