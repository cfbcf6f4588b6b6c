//! Concurrent operations against the orchestrator

mod common;

use common::fixture;
use futures::future::join_all;
use proptest::prelude::*;
use rollout_control::{ControlPlaneError, CreateDeploymentRequest};
use rollout_types::*;
use std::collections::HashSet;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_deploys_share_one_deployment() {
    let f = fixture().await;
    let deploys = (0..2).map(|_| {
        f.orchestrator.deploy_function(
            &f.function.id,
            &f.env.id,
            DeploymentConfiguration::all_at_once(),
        )
    });
    let reports: Vec<_> = join_all(deploys)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    for report in &reports {
        assert!(report.outcome.is_success(), "{:?}", report.outcome);
    }
    let deployments = f
        .orchestrator
        .list_deployments_by_function(&f.function.id)
        .await
        .unwrap();
    assert_eq!(deployments.len(), 1);
    let deployment = &deployments[0];

    let versions = f.orchestrator.list_versions(&deployment.id).await.unwrap();
    assert_eq!(versions.len(), 2);
    let numbers: HashSet<u64> = versions.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers.len(), 2);

    let ids: HashSet<VersionId> = reports.iter().map(|r| r.version_id.clone()).collect();
    let pointers: HashSet<VersionId> = [
        deployment.current_version_id.clone().unwrap(),
        deployment.previous_version_id.clone().unwrap(),
    ]
    .into_iter()
    .collect();
    assert_eq!(ids, pointers);
    assert_eq!(deployment.metrics.total_rollouts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_canary_between_steps() {
    let f = fixture().await;
    let (deployment_id, v0) = f.deploy(DeploymentConfiguration::all_at_once()).await;
    let (_, v1) = f.deploy(DeploymentConfiguration::all_at_once()).await;

    let task = {
        let orchestrator = f.orchestrator.clone();
        let function_id = f.function.id.clone();
        let env_id = f.env.id.clone();
        tokio::spawn(async move {
            orchestrator
                .deploy_function(
                    &function_id,
                    &env_id,
                    DeploymentConfiguration::canary(CanaryConfiguration::default()),
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        f.orchestrator.get_deployment_status(&deployment_id).await.unwrap(),
        DeploymentStatus::Deploying
    );
    let stopped = f.orchestrator.stop_deployment(&deployment_id).await.unwrap();
    assert_eq!(stopped.status, DeploymentStatus::Stopped);

    let report = task.await.unwrap().unwrap();
    assert_eq!(report.status(), DeploymentStatus::Stopped);
    assert_eq!(
        report.outcome.failure.as_ref().map(|failure| failure.event),
        Some(RollbackEvent::DeploymentStop)
    );
    assert!(report.auto_rollback.is_none());
    assert_eq!(report.deployment.current_version_id.as_ref(), Some(&v1));

    let percentages: Vec<u32> = f
        .router
        .history(&deployment_id)
        .iter()
        .filter(|s| s.candidate == report.version_id)
        .map(|s| s.candidate_percentage)
        .collect();
    assert_eq!(percentages, vec![10]);

    let again = f.orchestrator.stop_deployment(&deployment_id).await;
    assert!(matches!(again, Err(ControlPlaneError::InvalidStateTransition { .. })));

    let rollback = f.orchestrator.rollback_deployment(&deployment_id).await.unwrap();
    assert!(rollback.outcome.is_success(), "{:?}", rollback.outcome);
    assert_eq!(rollback.deployment.status, DeploymentStatus::RolledBack);
    assert_eq!(rollback.deployment.current_version_id, Some(v1));
    assert_eq!(rollback.deployment.previous_version_id, Some(v0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_scale_persists_only_consistent_counts(min in -2i32..6, max in -2i32..6, desired in -2i32..8) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let f = fixture().await;
            let deployment = f
                .orchestrator
                .create_deployment(CreateDeploymentRequest::new(
                    f.function.id.clone(),
                    f.env.id.clone(),
                    "resize-prod",
                ))
                .await
                .unwrap();

            let result = f
                .orchestrator
                .scale_deployment(&deployment.id, min, max, desired)
                .await;
            let expected = min >= 0 && max > 0 && max >= min && desired >= min && desired <= max;
            prop_assert_eq!(result.is_ok(), expected);

            let stored = f.orchestrator.get_deployment(&deployment.id).await.unwrap();
            match stored.configuration.scaling {
                Some(scaling) => {
                    prop_assert!(scaling.is_consistent());
                    prop_assert_eq!(scaling, ScalingConfiguration::new(min, max, desired));
                }
                None => prop_assert!(!expected),
            }
            Ok(())
        })?;
    }
}
