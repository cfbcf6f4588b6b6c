//! Blue-green strategy
//!
//! The new (green) target is provisioned next to the serving (blue) one.
//! Traffic moves to green in a single 100% switch once green is ready;
//! `traffic_routing` does not stage it. Blue is kept for the configured
//! termination wait so a rollback can switch straight back.

use super::base::{RollbackPlan, RolloutPlan};
use super::Strategy;
use crate::context::DeploymentContext;
use crate::error::{DeploymentError, Result};
use crate::routing::TrafficSplit;
use async_trait::async_trait;
use rollout_types::{BlueGreenConfiguration, DeploymentConfiguration, StrategyType, VersionLogEntry};
use tracing::info;

/// Switch between two full targets
pub struct BlueGreenStrategy;

impl BlueGreenStrategy {
    pub fn new() -> Self {
        Self
    }

    fn section(config: &DeploymentConfiguration) -> Result<&BlueGreenConfiguration> {
        config.blue_green.as_ref().ok_or_else(|| {
            DeploymentError::ValidationFailed("missing blue_green configuration".into())
        })
    }
}

impl Default for BlueGreenStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Strategy for BlueGreenStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::BlueGreen
    }

    fn name(&self) -> &str {
        "blue_green"
    }

    fn validate_configuration(&self, config: &DeploymentConfiguration) -> bool {
        config
            .blue_green
            .as_ref()
            .map(|bg| bg.violations().is_empty())
            .unwrap_or(false)
    }

    fn default_configuration(&self) -> DeploymentConfiguration {
        DeploymentConfiguration::blue_green(BlueGreenConfiguration::default())
    }

    async fn execute_rollout(&self, ctx: &DeploymentContext, plan: &RolloutPlan) -> Result<()> {
        let deployment_id = &plan.deployment.id;
        let bg = Self::section(&plan.configuration)?;
        let blue = plan.stable_version();
        let green = plan.version.id.clone();

        ctx.traffic
            .prepare_target(deployment_id, &plan.version, &plan.environment)
            .await?;
        ctx.log_version(&green, VersionLogEntry::info("green target ready"))
            .await;

        if let Some(hook) = &bg.pre_traffic_hook {
            ctx.run_hook(deployment_id, hook).await?;
        }
        ctx.checkpoint(deployment_id).await?;

        ctx.shift_traffic(
            deployment_id,
            TrafficSplit::new(blue.clone(), green.clone(), 100),
        )
        .await?;
        info!(
            deployment_id = %deployment_id,
            green = %green,
            "Traffic switched to green"
        );

        if let Some(hook) = &bg.post_traffic_hook {
            ctx.run_hook(deployment_id, hook).await?;
        }

        if let Some(blue) = blue {
            ctx.log_version(
                &blue,
                VersionLogEntry::info(format!(
                    "blue target scheduled for termination in {} minutes",
                    bg.termination_wait_time_in_minutes
                )),
            )
            .await;
        }
        Ok(())
    }

    async fn execute_rollback(&self, ctx: &DeploymentContext, plan: &RollbackPlan) -> Result<()> {
        let deployment_id = &plan.deployment.id;
        let wait = plan
            .deployment
            .configuration
            .blue_green
            .as_ref()
            .map(|bg| bg.termination_wait_time_in_minutes)
            .unwrap_or_default();

        ctx.traffic
            .prepare_target(deployment_id, &plan.target, &plan.environment)
            .await?;
        ctx.shift_traffic(
            deployment_id,
            TrafficSplit::new(plan.from.clone(), plan.target.id.clone(), 100),
        )
        .await?;
        info!(
            deployment_id = %deployment_id,
            target = %plan.target.id,
            "Traffic switched back"
        );

        if let Some(from) = &plan.from {
            ctx.log_version(
                from,
                VersionLogEntry::info(format!(
                    "target scheduled for termination in {} minutes",
                    wait
                )),
            )
            .await;
        }
        Ok(())
    }
}
