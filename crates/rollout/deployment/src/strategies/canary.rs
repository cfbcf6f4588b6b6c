//! Canary strategy
//!
//! Walks a schedule of traffic steps. After each shift the configured
//! alarms are polled, then the step interval elapses before the next shift.
//! A breach or a stop request ends the rollout at the current step.

use super::base::{minutes, RollbackPlan, RolloutPlan};
use super::Strategy;
use crate::context::DeploymentContext;
use crate::error::{DeploymentError, Result};
use crate::routing::TrafficSplit;
use async_trait::async_trait;
use rollout_types::{
    CanaryConfiguration, DeploymentConfiguration, DeploymentId, DeploymentStatus, StrategyType,
    TrafficRouting, VersionLogEntry,
};
use tracing::{info, instrument};

/// Gradual, alarm-gated traffic shifting
pub struct CanaryStrategy;

impl CanaryStrategy {
    pub fn new() -> Self {
        Self
    }

    fn section(config: &DeploymentConfiguration) -> Result<&CanaryConfiguration> {
        config
            .canary
            .as_ref()
            .ok_or_else(|| DeploymentError::ValidationFailed("missing canary configuration".into()))
    }
}

impl Default for CanaryStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Strategy for CanaryStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Canary
    }

    fn name(&self) -> &str {
        "canary"
    }

    fn validate_configuration(&self, config: &DeploymentConfiguration) -> bool {
        config
            .canary
            .as_ref()
            .map(|c| c.violations().is_empty())
            .unwrap_or(false)
    }

    fn default_configuration(&self) -> DeploymentConfiguration {
        DeploymentConfiguration::canary(CanaryConfiguration::default())
    }

    #[instrument(skip_all, fields(deployment_id = %plan.deployment.id, version_id = %plan.version.id))]
    async fn execute_rollout(&self, ctx: &DeploymentContext, plan: &RolloutPlan) -> Result<()> {
        let deployment_id = &plan.deployment.id;
        let canary = Self::section(&plan.configuration)?;
        let split = TrafficSplit::new(plan.stable_version(), plan.version.id.clone(), 0);

        ctx.traffic
            .prepare_target(deployment_id, &plan.version, &plan.environment)
            .await?;
        if let Some(hook) = &canary.pre_traffic_hook {
            ctx.run_hook(deployment_id, hook).await?;
        }

        let steps = canary.effective_steps();
        let total = steps.len();
        let mut reached = 0;
        for (i, step) in steps.iter().enumerate() {
            ctx.checkpoint(deployment_id).await?;

            let pct = step.traffic_percentage.clamp(0, 100) as u32;
            ctx.shift_traffic(deployment_id, split.with_percentage(pct))
                .await?;
            reached = pct;
            ctx.log_version(
                &plan.version.id,
                VersionLogEntry::info(format!(
                    "canary step {}/{}: {}% of traffic",
                    i + 1,
                    total,
                    pct
                )),
            )
            .await;
            info!(step = i + 1, of = total, percentage = pct, "Canary step applied");

            ctx.check_alarms(deployment_id, &canary.alarms).await?;
            ctx.wait_interval(deployment_id, minutes(step.interval_in_minutes))
                .await?;
        }

        if reached < 100 {
            ctx.shift_traffic(deployment_id, split.with_percentage(100))
                .await?;
        }

        if let Some(hook) = &canary.post_traffic_hook {
            ctx.run_hook(deployment_id, hook).await?;
        }
        Ok(())
    }

    async fn execute_rollback(&self, ctx: &DeploymentContext, plan: &RollbackPlan) -> Result<()> {
        let deployment_id = &plan.deployment.id;
        ctx.traffic
            .prepare_target(deployment_id, &plan.target, &plan.environment)
            .await?;
        ctx.shift_traffic(
            deployment_id,
            TrafficSplit::new(plan.from.clone(), plan.target.id.clone(), 100),
        )
        .await?;

        if let Some(from) = &plan.from {
            ctx.traffic.release_target(deployment_id, from).await?;
            ctx.log_version(from, VersionLogEntry::info("canary target terminated"))
                .await;
        }
        Ok(())
    }

    /// Persist a new routing and apply its percentage to a live rollout
    async fn update_traffic_routing(
        &self,
        ctx: &DeploymentContext,
        deployment_id: &DeploymentId,
        routing: &TrafficRouting,
    ) -> Result<DeploymentStatus> {
        let violations = routing.violations();
        if !violations.is_empty() {
            return Err(DeploymentError::ValidationFailed(violations.join("; ")));
        }

        let updated = routing.clone();
        let deployment = ctx
            .deployments
            .modify(
                deployment_id,
                Box::new(move |d| {
                    if let (
                        Some(canary),
                        TrafficRouting::TimeBased {
                            canary_percentage,
                            canary_interval_minutes,
                        },
                    ) = (d.configuration.canary.as_mut(), &updated)
                    {
                        canary.canary_percentage = *canary_percentage;
                        canary.canary_interval_minutes = *canary_interval_minutes;
                    }
                    d.configuration.traffic_routing = updated;
                    Ok(())
                }),
            )
            .await?;

        if deployment.status == DeploymentStatus::Deploying {
            if let Some(split) = ctx.traffic.current_split(deployment_id).await {
                let pct = routing.target_percentage().clamp(0, 100) as u32;
                ctx.shift_traffic(deployment_id, split.with_percentage(pct))
                    .await?;
                info!(
                    deployment_id = %deployment_id,
                    percentage = pct,
                    "Live canary split updated"
                );
            }
        }
        Ok(deployment.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHookInvoker;
    use crate::signal::StopSignal;
    use crate::strategies::testing::{harness, harness_with, BreachOnPoll, BrokenAlarms};
    use rollout_types::{AlarmConfiguration, RollbackEvent, TrafficStep, VersionStatus};
    use std::sync::Arc;
    use std::time::Duration;

    fn stepped(steps: &[(i32, i64)]) -> DeploymentConfiguration {
        DeploymentConfiguration::canary(CanaryConfiguration::with_steps(
            steps
                .iter()
                .map(|(pct, wait)| TrafficStep::new(*pct, *wait))
                .collect(),
        ))
    }

    fn alarmed(config: DeploymentConfiguration, ignore_failures: bool) -> DeploymentConfiguration {
        let mut config = config;
        if let Some(canary) = config.canary.as_mut() {
            canary.alarms = AlarmConfiguration {
                enabled: true,
                alarms: vec!["errors-high".into()],
                ignore_poll_alarm_failure: ignore_failures,
            };
        }
        config
    }

    fn percentages(h: &crate::strategies::testing::Harness) -> Vec<u32> {
        h.router
            .history(&h.deployment_id)
            .iter()
            .map(|s| s.candidate_percentage)
            .collect()
    }

    #[test]
    fn test_validate_configuration() {
        let strategy = CanaryStrategy::new();
        assert!(strategy.validate_configuration(&stepped(&[(10, 1), (50, 1), (100, 0)])));
        assert!(!strategy.validate_configuration(&stepped(&[(50, 1), (70, 1)])));
        assert!(!strategy.validate_configuration(&stepped(&[(120, 1), (100, 0)])));
        assert!(!strategy.validate_configuration(&DeploymentConfiguration::all_at_once()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_walks_every_step() {
        let config = stepped(&[(10, 5), (50, 5), (100, 0)]);
        let h = harness(config.clone()).await;
        let v1 = h.new_version().await;

        let started = tokio::time::Instant::now();
        let outcome = CanaryStrategy::new()
            .deploy(&h.ctx, &h.deployment_id, &v1, &config)
            .await;

        assert!(outcome.is_success(), "{:?}", outcome);
        assert_eq!(percentages(&h), vec![10, 50, 100]);
        assert!(started.elapsed() >= Duration::from_secs(600));
        let logs = h.version(&v1).await.logs;
        assert!(logs.iter().any(|l| l.message == "canary step 2/3: 50% of traffic"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_schedule() {
        let config = CanaryStrategy::new().default_configuration();
        let h = harness(config.clone()).await;
        let v1 = h.new_version().await;

        let outcome = CanaryStrategy::new()
            .deploy(&h.ctx, &h.deployment_id, &v1, &config)
            .await;
        assert!(outcome.is_success());
        assert_eq!(percentages(&h), vec![10, 100]);
    }

    #[tokio::test]
    async fn test_incomplete_schedule_never_passes_validating() {
        let h = harness(stepped(&[(10, 1), (100, 0)])).await;
        let v1 = h.new_version().await;

        let outcome = CanaryStrategy::new()
            .deploy(&h.ctx, &h.deployment_id, &v1, &stepped(&[(50, 1), (70, 1)]))
            .await;

        assert_eq!(outcome.status, DeploymentStatus::Failed);
        assert!(!outcome.should_rollback());
        assert!(outcome.reason().unwrap().contains("final step must reach 100%"));
        assert_eq!(h.deployment().await.status, DeploymentStatus::Failed);
        assert!(percentages(&h).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_breach_stops_at_current_step() {
        let config = alarmed(stepped(&[(10, 1), (50, 1), (100, 0)]), false);
        let h = harness_with(
            config.clone(),
            Arc::new(NoopHookInvoker),
            Arc::new(BreachOnPoll::new(2)),
        )
        .await;
        let v1 = h.new_version().await;

        let outcome = CanaryStrategy::new()
            .deploy(&h.ctx, &h.deployment_id, &v1, &config)
            .await;

        assert_eq!(outcome.status, DeploymentStatus::Failed);
        let failure = outcome.failure.clone().unwrap();
        assert_eq!(failure.event, RollbackEvent::AlarmThreshold);
        assert!(failure.rollback_recommended);
        assert!(failure.reason.contains("errors-high"));
        assert_eq!(percentages(&h), vec![10, 50]);
        assert_eq!(h.version(&v1).await.status, VersionStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_poll_failures() {
        let strict = alarmed(stepped(&[(20, 1), (100, 0)]), false);
        let h = harness_with(strict.clone(), Arc::new(NoopHookInvoker), Arc::new(BrokenAlarms)).await;
        let v1 = h.new_version().await;
        let outcome = CanaryStrategy::new()
            .deploy(&h.ctx, &h.deployment_id, &v1, &strict)
            .await;
        assert_eq!(outcome.status, DeploymentStatus::Failed);
        assert_eq!(outcome.failure.unwrap().event, RollbackEvent::DeploymentFailure);

        let lenient = alarmed(stepped(&[(20, 1), (100, 0)]), true);
        let h = harness_with(lenient.clone(), Arc::new(NoopHookInvoker), Arc::new(BrokenAlarms)).await;
        let v1 = h.new_version().await;
        let outcome = CanaryStrategy::new()
            .deploy(&h.ctx, &h.deployment_id, &v1, &lenient)
            .await;
        assert!(outcome.is_success(), "{:?}", outcome);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_interval() {
        let config = stepped(&[(10, 30), (100, 0)]);
        let h = harness(config.clone()).await;
        let v1 = h.new_version().await;
        let (handle, signal) = StopSignal::channel();
        let ctx = h.ctx.with_stop(signal);
        let deployment_id = h.deployment_id.clone();

        let rollout = tokio::spawn(async move {
            CanaryStrategy::new()
                .deploy(&ctx, &deployment_id, &v1, &config)
                .await
        });
        tokio::time::sleep(Duration::from_secs(60)).await;
        h.ctx
            .deployments
            .transition_status(
                &h.deployment_id,
                &[DeploymentStatus::Deploying],
                DeploymentStatus::Stopped,
            )
            .await
            .unwrap();
        handle.raise();

        let outcome = rollout.await.unwrap();
        assert_eq!(outcome.status, DeploymentStatus::Stopped);
        assert_eq!(outcome.failure.unwrap().event, RollbackEvent::DeploymentStop);
        assert_eq!(h.deployment().await.status, DeploymentStatus::Stopped);
        assert_eq!(percentages(&h), vec![10]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_rollout() {
        let config = stepped(&[(10, 30), (100, 0)]).with_timeout(60);
        let h = harness(config.clone()).await;
        let v1 = h.new_version().await;

        let outcome = CanaryStrategy::new()
            .deploy(&h.ctx, &h.deployment_id, &v1, &config)
            .await;

        assert_eq!(outcome.status, DeploymentStatus::Failed);
        assert!(outcome.reason().unwrap().contains("Timeout"));
        assert!(outcome.should_rollback());
        assert_eq!(h.deployment().await.status, DeploymentStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_after_failed_canary_restores_stable() {
        let config = alarmed(stepped(&[(10, 1), (100, 0)]), false);
        let h = harness_with(
            config.clone(),
            Arc::new(NoopHookInvoker),
            Arc::new(BreachOnPoll::new(5)),
        )
        .await;
        let strategy = CanaryStrategy::new();

        let v0 = h.new_version().await;
        assert!(strategy.deploy(&h.ctx, &h.deployment_id, &v0, &config).await.is_success());
        let v1 = h.new_version().await;
        assert!(strategy.deploy(&h.ctx, &h.deployment_id, &v1, &config).await.is_success());
        let v2 = h.new_version().await;
        let outcome = strategy.deploy(&h.ctx, &h.deployment_id, &v2, &config).await;
        assert_eq!(outcome.failure.unwrap().event, RollbackEvent::AlarmThreshold);

        let outcome = strategy.rollback(&h.ctx, &h.deployment_id).await;
        assert_eq!(outcome.status, DeploymentStatus::RolledBack);
        let last = h.router.history(&h.deployment_id).pop().unwrap();
        assert_eq!(last.candidate, v1);
        assert_eq!(last.candidate_percentage, 100);
        assert!(!h.router.has_target(&h.deployment_id, &v2));
        let d = h.deployment().await;
        assert_eq!(d.current_version_id, Some(v1));
        assert_eq!(d.previous_version_id, Some(v0));
    }

    #[tokio::test]
    async fn test_update_traffic_routing() {
        let h = harness(stepped(&[(10, 1), (100, 0)])).await;
        let strategy = CanaryStrategy::new();

        let rejected = strategy
            .update_traffic_routing(
                &h.ctx,
                &h.deployment_id,
                &TrafficRouting::TimeBased {
                    canary_percentage: 150,
                    canary_interval_minutes: 1,
                },
            )
            .await;
        assert!(matches!(rejected, Err(DeploymentError::ValidationFailed(_))));

        let status = strategy
            .update_traffic_routing(
                &h.ctx,
                &h.deployment_id,
                &TrafficRouting::TimeBased {
                    canary_percentage: 25,
                    canary_interval_minutes: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(status, DeploymentStatus::Pending);

        let config = h.config().await;
        assert_eq!(config.traffic_routing.target_percentage(), 25);
        assert_eq!(config.canary.unwrap().canary_percentage, 25);
        assert!(percentages(&h).is_empty());
    }
}
