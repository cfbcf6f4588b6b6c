//! All-at-once strategy
//!
//! Provisions the new version's target and moves all traffic in one step.

use super::base::{RollbackPlan, RolloutPlan};
use super::Strategy;
use crate::context::DeploymentContext;
use crate::error::Result;
use crate::routing::TrafficSplit;
use async_trait::async_trait;
use rollout_types::{DeploymentConfiguration, StrategyType, VersionLogEntry};
use tracing::info;

/// Immediate cutover
pub struct AllAtOnceStrategy;

impl AllAtOnceStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AllAtOnceStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Strategy for AllAtOnceStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::AllAtOnce
    }

    fn name(&self) -> &str {
        "all_at_once"
    }

    fn validate_configuration(&self, _config: &DeploymentConfiguration) -> bool {
        true
    }

    fn default_configuration(&self) -> DeploymentConfiguration {
        DeploymentConfiguration::all_at_once()
    }

    async fn execute_rollout(&self, ctx: &DeploymentContext, plan: &RolloutPlan) -> Result<()> {
        let deployment_id = &plan.deployment.id;
        ctx.traffic
            .prepare_target(deployment_id, &plan.version, &plan.environment)
            .await?;
        ctx.checkpoint(deployment_id).await?;

        ctx.shift_traffic(
            deployment_id,
            TrafficSplit::new(plan.stable_version(), plan.version.id.clone(), 100),
        )
        .await?;
        ctx.log_version(
            &plan.version.id,
            VersionLogEntry::info("shifted 100% of traffic"),
        )
        .await;

        info!(
            deployment_id = %deployment_id,
            version_id = %plan.version.id,
            "All traffic shifted"
        );
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
        ctx.log_version(
            &plan.target.id,
            VersionLogEntry::info("shifted 100% of traffic back"),
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::{harness, harness_with, FailingHookInvoker};
    use crate::hooks::QuietAlarmEvaluator;
    use rollout_types::{
        DeploymentStatus, HookDescriptor, HookType, RollbackEvent, VersionStatus,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_rollout() {
        let h = harness(DeploymentConfiguration::all_at_once()).await;
        let v1 = h.new_version().await;
        let strategy = AllAtOnceStrategy::new();

        let outcome = strategy
            .deploy(&h.ctx, &h.deployment_id, &v1, &h.config().await)
            .await;

        assert!(outcome.is_success(), "{:?}", outcome);
        assert_eq!(outcome.status, DeploymentStatus::Deployed);
        let d = h.deployment().await;
        assert_eq!(d.status, DeploymentStatus::Deployed);
        assert_eq!(d.current_version_id, Some(v1.clone()));
        assert!(d.previous_version_id.is_none());
        assert_eq!(h.version(&v1).await.status, VersionStatus::Deployed);

        let history = h.router.history(&h.deployment_id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].candidate_percentage, 100);
        assert!(history[0].stable.is_none());
    }

    #[tokio::test]
    async fn test_deploy_deploy_rollback_returns_to_first() {
        let h = harness(DeploymentConfiguration::all_at_once()).await;
        let strategy = AllAtOnceStrategy::new();
        let config = h.config().await;

        let v1 = h.new_version().await;
        assert!(strategy.deploy(&h.ctx, &h.deployment_id, &v1, &config).await.is_success());
        let v2 = h.new_version().await;
        assert!(strategy.deploy(&h.ctx, &h.deployment_id, &v2, &config).await.is_success());

        let d = h.deployment().await;
        assert_eq!(d.current_version_id, Some(v2.clone()));
        assert_eq!(d.previous_version_id, Some(v1.clone()));

        let outcome = strategy.rollback(&h.ctx, &h.deployment_id).await;
        assert_eq!(outcome.status, DeploymentStatus::RolledBack);
        let d = h.deployment().await;
        assert_eq!(d.status, DeploymentStatus::RolledBack);
        assert_eq!(d.current_version_id, Some(v1.clone()));
        assert_eq!(d.previous_version_id, Some(v2));

        let split = h.router.history(&h.deployment_id).pop().unwrap();
        assert_eq!(split.candidate, v1);
        assert_eq!(split.candidate_percentage, 100);
    }

    #[tokio::test]
    async fn test_rollback_without_previous_fails_without_mutation() {
        let h = harness(DeploymentConfiguration::all_at_once()).await;
        let strategy = AllAtOnceStrategy::new();
        let v1 = h.new_version().await;
        strategy
            .deploy(&h.ctx, &h.deployment_id, &v1, &h.config().await)
            .await;

        let outcome = strategy.rollback(&h.ctx, &h.deployment_id).await;
        assert_eq!(outcome.status, DeploymentStatus::Failed);
        assert!(!outcome.should_rollback());
        assert_eq!(h.deployment().await.status, DeploymentStatus::Deployed);
    }

    #[tokio::test]
    async fn test_missing_version_fails_fast() {
        let h = harness(DeploymentConfiguration::all_at_once()).await;
        let outcome = AllAtOnceStrategy::new()
            .deploy(
                &h.ctx,
                &h.deployment_id,
                &rollout_types::VersionId::generate(),
                &h.config().await,
            )
            .await;
        assert_eq!(outcome.status, DeploymentStatus::Failed);
        assert_eq!(h.deployment().await.status, DeploymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_failing_pre_hook_fails_rollout() {
        let config = DeploymentConfiguration::all_at_once().with_hooks(
            vec![HookDescriptor::new("migrate", HookType::PreDeployment, "arn:migrate")],
            Vec::new(),
        );
        let h = harness_with(
            config.clone(),
            Arc::new(FailingHookInvoker("migrate")),
            Arc::new(QuietAlarmEvaluator),
        )
        .await;
        let v1 = h.new_version().await;

        let outcome = AllAtOnceStrategy::new()
            .deploy(&h.ctx, &h.deployment_id, &v1, &config)
            .await;

        assert_eq!(outcome.status, DeploymentStatus::Failed);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.event, RollbackEvent::DeploymentFailure);
        assert!(failure.reason.contains("migrate"));
        assert_eq!(h.deployment().await.status, DeploymentStatus::Failed);
        assert_eq!(h.version(&v1).await.status, VersionStatus::Failed);
        assert!(h.router.history(&h.deployment_id).is_empty());
    }

    #[tokio::test]
    async fn test_failed_rollout_restores_current() {
        let h = harness_with(
            DeploymentConfiguration::all_at_once(),
            Arc::new(FailingHookInvoker("smoke")),
            Arc::new(QuietAlarmEvaluator),
        )
        .await;
        let strategy = AllAtOnceStrategy::new();
        let v0 = h.new_version().await;
        let v1 = h.new_version().await;
        for version in [&v0, &v1] {
            assert!(strategy
                .deploy(&h.ctx, &h.deployment_id, version, &h.config().await)
                .await
                .is_success());
        }

        let v2 = h.new_version().await;
        let outcome = strategy
            .deploy(&h.ctx, &h.deployment_id, &v2, &smoke_tested())
            .await;
        assert_eq!(outcome.status, DeploymentStatus::Failed);
        assert!(outcome.should_rollback());
        assert_eq!(h.deployment().await.current_version_id, Some(v1.clone()));

        let outcome = strategy.rollback(&h.ctx, &h.deployment_id).await;
        assert_eq!(outcome.status, DeploymentStatus::RolledBack);
        let d = h.deployment().await;
        assert_eq!(d.current_version_id, Some(v1.clone()));
        assert_eq!(d.previous_version_id, Some(v0));

        let last = h.router.history(&h.deployment_id).pop().unwrap();
        assert_eq!(last.candidate, v1);
        assert_eq!(last.stable, Some(v2));
    }

    #[tokio::test]
    async fn test_failed_first_rollout_cannot_roll_back() {
        let h = harness_with(
            DeploymentConfiguration::all_at_once(),
            Arc::new(FailingHookInvoker("smoke")),
            Arc::new(QuietAlarmEvaluator),
        )
        .await;
        let strategy = AllAtOnceStrategy::new();
        let v1 = h.new_version().await;
        assert!(strategy
            .deploy(&h.ctx, &h.deployment_id, &v1, &h.config().await)
            .await
            .is_success());

        let v2 = h.new_version().await;
        let outcome = strategy
            .deploy(&h.ctx, &h.deployment_id, &v2, &smoke_tested())
            .await;
        assert_eq!(outcome.status, DeploymentStatus::Failed);
        let shifts = h.router.history(&h.deployment_id).len();

        let outcome = strategy.rollback(&h.ctx, &h.deployment_id).await;
        assert_eq!(outcome.status, DeploymentStatus::Failed);
        assert!(outcome.reason().unwrap().contains("no previous version"));
        let d = h.deployment().await;
        assert_eq!(d.status, DeploymentStatus::Failed);
        assert_eq!(d.current_version_id, Some(v1));
        assert!(d.previous_version_id.is_none());
        assert_eq!(h.router.history(&h.deployment_id).len(), shifts);
    }

    fn smoke_tested() -> DeploymentConfiguration {
        DeploymentConfiguration::all_at_once().with_hooks(
            Vec::new(),
            vec![HookDescriptor::new("smoke", HookType::PostDeployment, "arn:smoke")],
        )
    }
}
