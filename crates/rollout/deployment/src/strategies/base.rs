//! Shared deploy and rollback sequence
//!
//! Both sequences run under the configuration's wall-clock deadline and
//! settle the deployment and version statuses however the strategy body
//! ends. Errors never escape: they become a [`RolloutOutcome`].

use super::{RolloutOutcome, Strategy};
use crate::context::DeploymentContext;
use crate::error::{DeploymentError, Result};
use crate::state::RepositoryError;
use rollout_types::{
    Deployment, DeploymentConfiguration, DeploymentEnvironment, DeploymentId, DeploymentStatus,
    DeploymentVersion, RollbackEvent, ValidationResult, VersionId, VersionLogEntry, VersionStatus,
};
use std::time::Duration;
use tracing::{info, warn};

/// Everything a strategy body needs for one rollout
#[derive(Debug, Clone)]
pub struct RolloutPlan {
    /// Deployment as of entering `Deploying`
    pub deployment: Deployment,
    pub version: DeploymentVersion,
    pub environment: DeploymentEnvironment,
    pub configuration: DeploymentConfiguration,
}

impl RolloutPlan {
    /// Version currently serving traffic, if any and if different
    pub fn stable_version(&self) -> Option<VersionId> {
        self.deployment
            .current_version_id
            .clone()
            .filter(|id| id != &self.version.id)
    }
}

/// Which pointer a rollback returns to
///
/// Either mode requires `previous_version_id` to be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackMode {
    /// After a completed rollout: back to `previous`, then swap pointers
    Swap,
    /// After a failed or stopped rollout: back to `current`, pointers kept
    Restore,
}

impl RollbackMode {
    pub fn for_status(status: DeploymentStatus) -> Option<Self> {
        match status {
            DeploymentStatus::Deployed | DeploymentStatus::RolledBack => Some(RollbackMode::Swap),
            DeploymentStatus::Failed | DeploymentStatus::Stopped => Some(RollbackMode::Restore),
            _ => None,
        }
    }

    /// Version id the rollback routes to
    pub fn target(&self, deployment: &Deployment) -> Option<VersionId> {
        match self {
            RollbackMode::Swap => deployment.previous_version_id.clone(),
            RollbackMode::Restore => deployment.current_version_id.clone(),
        }
    }
}

/// Everything a strategy body needs for one rollback
#[derive(Debug, Clone)]
pub struct RollbackPlan {
    pub deployment: Deployment,
    pub mode: RollbackMode,
    /// Version traffic returns to
    pub target: DeploymentVersion,
    /// Version traffic leaves, when known
    pub from: Option<VersionId>,
    pub environment: DeploymentEnvironment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    /// Nothing mutated yet
    Preflight,
    /// Statuses moved, traffic untouched
    Validating,
    /// Traffic may have moved
    Traffic,
}

const ROLLOUT_SOURCES: [DeploymentStatus; 5] = [
    DeploymentStatus::Pending,
    DeploymentStatus::Deployed,
    DeploymentStatus::Failed,
    DeploymentStatus::RolledBack,
    DeploymentStatus::Stopped,
];

fn deadline(timeout_seconds: i64) -> Duration {
    Duration::from_secs(timeout_seconds.max(1) as u64)
}

fn gate(result: ValidationResult, what: &str) -> Result<()> {
    if result.passed {
        Ok(())
    } else {
        Err(DeploymentError::ValidationFailed(format!(
            "{} checks failed: {}",
            what,
            result.summary()
        )))
    }
}

fn conflict_as_state(err: RepositoryError, current: DeploymentStatus, expected: &[DeploymentStatus]) -> DeploymentError {
    match err {
        RepositoryError::Conflict(_) => DeploymentError::InvalidState {
            current: current.to_string(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
        },
        other => other.into(),
    }
}

fn conflict_as_stop(err: RepositoryError) -> DeploymentError {
    match err {
        RepositoryError::Conflict(_) => DeploymentError::Stopped,
        other => other.into(),
    }
}

fn event_for(err: &DeploymentError) -> RollbackEvent {
    match err {
        DeploymentError::Stopped => RollbackEvent::DeploymentStop,
        DeploymentError::AlarmBreached { .. } => RollbackEvent::AlarmThreshold,
        _ => RollbackEvent::DeploymentFailure,
    }
}

pub(crate) async fn deploy<S: Strategy + ?Sized>(
    strategy: &S,
    ctx: &DeploymentContext,
    deployment_id: &DeploymentId,
    version_id: &VersionId,
    config: &DeploymentConfiguration,
) -> RolloutOutcome {
    let started = tokio::time::Instant::now();
    let mut progress = Progress::Preflight;

    let result = tokio::time::timeout(
        deadline(config.timeout_seconds),
        run_rollout(strategy, ctx, deployment_id, version_id, config, &mut progress),
    )
    .await
    .unwrap_or_else(|_| {
        Err(DeploymentError::Timeout {
            operation: format!("{} rollout", strategy.name()),
        })
    });

    match result {
        Ok(()) => {
            info!(
                deployment_id = %deployment_id,
                version_id = %version_id,
                strategy = strategy.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Rollout completed"
            );
            RolloutOutcome::completed(DeploymentStatus::Deployed)
        }
        Err(err) => settle_failed_rollout(ctx, deployment_id, version_id, err, progress).await,
    }
}

async fn run_rollout<S: Strategy + ?Sized>(
    strategy: &S,
    ctx: &DeploymentContext,
    deployment_id: &DeploymentId,
    version_id: &VersionId,
    config: &DeploymentConfiguration,
    progress: &mut Progress,
) -> Result<()> {
    let deployment = ctx.deployment(deployment_id).await?;
    let version = ctx.version(version_id).await?;
    if version.deployment_id != deployment.id {
        return Err(DeploymentError::ValidationFailed(format!(
            "{} does not belong to {}",
            version.id, deployment.id
        )));
    }
    if !version.status.is_deployable() {
        return Err(DeploymentError::InvalidState {
            current: version.status.to_string(),
            expected: vec![
                VersionStatus::Created.to_string(),
                VersionStatus::Built.to_string(),
                VersionStatus::Failed.to_string(),
            ],
        });
    }

    let deployment = ctx
        .deployments
        .transition_status(deployment_id, &ROLLOUT_SOURCES, DeploymentStatus::Validating)
        .await
        .map_err(|e| conflict_as_state(e, deployment.status, &ROLLOUT_SOURCES))?;
    *progress = Progress::Validating;
    ctx.versions
        .transition_status(version_id, VersionStatus::Validating)
        .await?;
    info!(
        deployment_id = %deployment_id,
        version_id = %version_id,
        strategy = strategy.name(),
        "Validating rollout"
    );

    if !strategy.validate_configuration(config) {
        return Err(DeploymentError::ValidationFailed(format!(
            "configuration rejected by {} strategy: {}",
            strategy.name(),
            config.strategy_violations().join("; ")
        )));
    }
    gate(ctx.validator.validate_version(&version), "version")?;

    let mut candidate = deployment.clone();
    candidate.strategy = config.strategy;
    candidate.configuration = config.clone();
    gate(ctx.validator.validate_deployment(&candidate), "deployment")?;

    let environment = ctx.environment(&deployment.environment_id).await?;
    gate(
        ctx.validator
            .validate_hosting(&version.configuration, &environment),
        "compatibility",
    )?;

    for status in [
        VersionStatus::Building,
        VersionStatus::Built,
        VersionStatus::Deploying,
    ] {
        ctx.versions.transition_status(version_id, status).await?;
    }
    let deployment = ctx
        .deployments
        .transition_status(
            deployment_id,
            &[DeploymentStatus::Validating],
            DeploymentStatus::Deploying,
        )
        .await?;
    *progress = Progress::Traffic;

    ctx.run_hooks(deployment_id, &config.pre_deployment_hooks)
        .await?;
    ctx.checkpoint(deployment_id).await?;

    let plan = RolloutPlan {
        deployment,
        version: ctx.version(version_id).await?,
        environment,
        configuration: config.clone(),
    };
    strategy.execute_rollout(ctx, &plan).await?;

    ctx.checkpoint(deployment_id).await?;
    ctx.run_hooks(deployment_id, &config.post_deployment_hooks)
        .await?;

    ctx.deployments
        .complete_rollout(deployment_id, version_id)
        .await
        .map_err(conflict_as_stop)?;
    ctx.versions
        .transition_status(version_id, VersionStatus::Deployed)
        .await?;
    ctx.log_version(version_id, VersionLogEntry::info("rollout completed"))
        .await;
    Ok(())
}

async fn settle_failed_rollout(
    ctx: &DeploymentContext,
    deployment_id: &DeploymentId,
    version_id: &VersionId,
    err: DeploymentError,
    progress: Progress,
) -> RolloutOutcome {
    let reason = err.to_string();
    let traffic_moved = progress == Progress::Traffic;

    if progress == Progress::Preflight {
        warn!(
            deployment_id = %deployment_id,
            version_id = %version_id,
            reason = %reason,
            "Rollout rejected before start"
        );
        return RolloutOutcome::failed(DeploymentStatus::Failed, event_for(&err), reason, false);
    }

    mark_version_failed(ctx, version_id, &reason).await;

    let status = if matches!(err, DeploymentError::Stopped) {
        DeploymentStatus::Stopped
    } else {
        fail_deployment(
            ctx,
            deployment_id,
            &[DeploymentStatus::Validating, DeploymentStatus::Deploying],
        )
        .await
    };
    let event = if status == DeploymentStatus::Stopped {
        RollbackEvent::DeploymentStop
    } else {
        event_for(&err)
    };

    warn!(
        deployment_id = %deployment_id,
        version_id = %version_id,
        status = %status,
        event = %event,
        reason = %reason,
        "Rollout did not complete"
    );
    RolloutOutcome::failed(status, event, reason, traffic_moved)
}

/// Move to `Failed`, unless a concurrent stop got there first
async fn fail_deployment(
    ctx: &DeploymentContext,
    deployment_id: &DeploymentId,
    from: &[DeploymentStatus],
) -> DeploymentStatus {
    match ctx
        .deployments
        .transition_status(deployment_id, from, DeploymentStatus::Failed)
        .await
    {
        Ok(_) => DeploymentStatus::Failed,
        Err(e) => match ctx.deployments.get(deployment_id).await {
            Ok(Some(d)) if d.status == DeploymentStatus::Stopped => DeploymentStatus::Stopped,
            _ => {
                warn!(deployment_id = %deployment_id, error = %e, "Failed to mark deployment failed");
                DeploymentStatus::Failed
            }
        },
    }
}

async fn mark_version_failed(ctx: &DeploymentContext, version_id: &VersionId, reason: &str) {
    let can_fail = match ctx.versions.get(version_id).await {
        Ok(Some(v)) => v.status.can_transition_to(VersionStatus::Failed),
        _ => false,
    };
    if can_fail {
        if let Err(e) = ctx
            .versions
            .transition_status(version_id, VersionStatus::Failed)
            .await
        {
            warn!(version_id = %version_id, error = %e, "Failed to mark version failed");
        }
    }
    ctx.log_version(version_id, VersionLogEntry::error(reason))
        .await;
}

pub(crate) async fn rollback<S: Strategy + ?Sized>(
    strategy: &S,
    ctx: &DeploymentContext,
    deployment_id: &DeploymentId,
) -> RolloutOutcome {
    let timeout_seconds = match ctx.deployment(deployment_id).await {
        Ok(d) => d.configuration.timeout_seconds,
        Err(e) => {
            return RolloutOutcome::failed(
                DeploymentStatus::Failed,
                RollbackEvent::DeploymentFailure,
                e.to_string(),
                false,
            )
        }
    };
    let mut progress = Progress::Preflight;

    let result = tokio::time::timeout(
        deadline(timeout_seconds),
        run_rollback(strategy, ctx, deployment_id, &mut progress),
    )
    .await
    .unwrap_or_else(|_| {
        Err(DeploymentError::Timeout {
            operation: format!("{} rollback", strategy.name()),
        })
    });

    match result {
        Ok(()) => {
            info!(deployment_id = %deployment_id, strategy = strategy.name(), "Rollback completed");
            RolloutOutcome::completed(DeploymentStatus::RolledBack)
        }
        Err(err) => {
            let reason = err.to_string();
            let event = event_for(&err);
            let status = match progress {
                Progress::Preflight => DeploymentStatus::Failed,
                _ if matches!(err, DeploymentError::Stopped) => DeploymentStatus::Stopped,
                _ => fail_deployment(ctx, deployment_id, &[DeploymentStatus::RollingBack]).await,
            };
            warn!(
                deployment_id = %deployment_id,
                status = %status,
                reason = %reason,
                "Rollback did not complete"
            );
            RolloutOutcome::failed(status, event, reason, false)
        }
    }
}

async fn run_rollback<S: Strategy + ?Sized>(
    strategy: &S,
    ctx: &DeploymentContext,
    deployment_id: &DeploymentId,
    progress: &mut Progress,
) -> Result<()> {
    let deployment = ctx.deployment(deployment_id).await?;
    let mode = RollbackMode::for_status(deployment.status).ok_or_else(|| {
        DeploymentError::InvalidState {
            current: deployment.status.to_string(),
            expected: vec![
                DeploymentStatus::Deployed.to_string(),
                DeploymentStatus::RolledBack.to_string(),
                DeploymentStatus::Failed.to_string(),
                DeploymentStatus::Stopped.to_string(),
            ],
        }
    })?;
    if deployment.previous_version_id.is_none() {
        return Err(DeploymentError::ValidationFailed(format!(
            "{} has no previous version",
            deployment.id
        )));
    }
    let target_id = mode.target(&deployment).ok_or_else(|| {
        DeploymentError::ValidationFailed(format!(
            "{} has no version to roll back to",
            deployment.id
        ))
    })?;
    let target = ctx.version(&target_id).await?;
    let environment = ctx.environment(&deployment.environment_id).await?;
    let from = match mode {
        RollbackMode::Swap => deployment.current_version_id.clone(),
        RollbackMode::Restore => ctx
            .traffic
            .current_split(deployment_id)
            .await
            .map(|s| s.candidate)
            .filter(|candidate| candidate != &target_id),
    };

    let deployment = ctx
        .deployments
        .transition_status(deployment_id, &[deployment.status], DeploymentStatus::RollingBack)
        .await
        .map_err(|e| conflict_as_state(e, deployment.status, &[deployment.status]))?;
    *progress = Progress::Traffic;
    info!(
        deployment_id = %deployment_id,
        target = %target_id,
        mode = ?mode,
        strategy = strategy.name(),
        "Rolling back"
    );
    ctx.log_version(
        &target_id,
        VersionLogEntry::info(format!("rollback to this version started ({:?})", mode)),
    )
    .await;

    let plan = RollbackPlan {
        deployment,
        mode,
        target,
        from,
        environment,
    };
    strategy.execute_rollback(ctx, &plan).await?;
    ctx.checkpoint(deployment_id).await?;

    ctx.deployments
        .complete_rollback(deployment_id, mode == RollbackMode::Swap)
        .await
        .map_err(conflict_as_stop)?;
    ctx.log_version(&target_id, VersionLogEntry::info("rollback completed"))
        .await;
    Ok(())
}

/// Whole minutes as a duration; negative values clamp to zero
pub(crate) fn minutes(value: i64) -> Duration {
    Duration::from_secs((value.max(0) as u64).saturating_mul(60))
}
