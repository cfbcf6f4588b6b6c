//! Deployment Context - Execution environment for rollout strategies
//!
//! Bundles the repositories and collaborators a strategy talks to, plus the
//! stop signal of the operation in flight. Strategies never reach storage or
//! the traffic layer except through this context.

use crate::catalog::FunctionLookup;
use crate::error::{DeploymentError, Result};
use crate::hooks::{AlarmEvaluator, AlarmState, HookInvoker};
use crate::routing::{TrafficController, TrafficSplit};
use crate::signal::StopSignal;
use crate::state::{DeploymentRepository, EnvironmentRepository, VersionRepository};
use rollout_types::{
    AlarmConfiguration, Deployment, DeploymentEnvironment, DeploymentId, DeploymentStatus,
    DeploymentVersion, EnvironmentId, HookDescriptor, VersionId, VersionLogEntry,
};
use rollout_validator::Validator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Context provided to strategies for one operation
#[derive(Clone)]
pub struct DeploymentContext {
    pub deployments: Arc<dyn DeploymentRepository>,
    pub versions: Arc<dyn VersionRepository>,
    pub environments: Arc<dyn EnvironmentRepository>,
    pub functions: Arc<dyn FunctionLookup>,
    pub hooks: Arc<dyn HookInvoker>,
    pub alarms: Arc<dyn AlarmEvaluator>,
    pub traffic: Arc<dyn TrafficController>,
    pub validator: Validator,
    stop: StopSignal,
}

impl DeploymentContext {
    pub fn new(
        deployments: Arc<dyn DeploymentRepository>,
        versions: Arc<dyn VersionRepository>,
        environments: Arc<dyn EnvironmentRepository>,
        functions: Arc<dyn FunctionLookup>,
        hooks: Arc<dyn HookInvoker>,
        alarms: Arc<dyn AlarmEvaluator>,
        traffic: Arc<dyn TrafficController>,
    ) -> Self {
        Self {
            deployments,
            versions,
            environments,
            functions,
            hooks,
            alarms,
            traffic,
            validator: Validator::new(),
            stop: StopSignal::never(),
        }
    }

    /// Same collaborators, observing `stop`
    pub fn with_stop(&self, stop: StopSignal) -> Self {
        Self {
            stop,
            ..self.clone()
        }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub async fn deployment(&self, id: &DeploymentId) -> Result<Deployment> {
        self.deployments
            .get(id)
            .await?
            .ok_or_else(|| DeploymentError::not_found("deployment", id))
    }

    pub async fn version(&self, id: &VersionId) -> Result<DeploymentVersion> {
        self.versions
            .get(id)
            .await?
            .ok_or_else(|| DeploymentError::not_found("version", id))
    }

    pub async fn environment(&self, id: &EnvironmentId) -> Result<DeploymentEnvironment> {
        self.environments
            .get(id)
            .await?
            .ok_or_else(|| DeploymentError::not_found("environment", id))
    }

    /// Fail with `Stopped` if a stop was requested
    pub async fn checkpoint(&self, deployment_id: &DeploymentId) -> Result<()> {
        if self.stop.is_raised() {
            return Err(DeploymentError::Stopped);
        }
        let deployment = self.deployment(deployment_id).await?;
        if deployment.status == DeploymentStatus::Stopped {
            return Err(DeploymentError::Stopped);
        }
        Ok(())
    }

    /// Sleep for `duration` unless stopped first
    pub async fn wait_interval(&self, deployment_id: &DeploymentId, duration: Duration) -> Result<()> {
        if !duration.is_zero() {
            debug!(
                deployment_id = %deployment_id,
                seconds = duration.as_secs(),
                "Waiting before next step"
            );
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = self.stop.raised() => return Err(DeploymentError::Stopped),
            }
        }
        self.checkpoint(deployment_id).await
    }

    /// Run hooks in order, stopping at the first failure
    #[instrument(skip_all, fields(deployment_id = %deployment_id))]
    pub async fn run_hooks(&self, deployment_id: &DeploymentId, hooks: &[HookDescriptor]) -> Result<()> {
        for hook in hooks {
            self.run_hook(deployment_id, hook).await?;
        }
        Ok(())
    }

    pub async fn run_hook(&self, deployment_id: &DeploymentId, hook: &HookDescriptor) -> Result<()> {
        self.checkpoint(deployment_id).await?;
        self.hooks.invoke(deployment_id, hook).await.map_err(|e| {
            warn!(deployment_id = %deployment_id, hook = %hook.name, error = %e, "Hook failed");
            DeploymentError::from(e)
        })?;
        info!(deployment_id = %deployment_id, hook = %hook.name, "Hook completed");
        Ok(())
    }

    /// Poll alarms; a breach fails the step
    pub async fn check_alarms(
        &self,
        deployment_id: &DeploymentId,
        alarms: &AlarmConfiguration,
    ) -> Result<()> {
        if !alarms.enabled {
            return Ok(());
        }
        match self.alarms.evaluate(deployment_id, alarms).await {
            Ok(AlarmState::Ok) => Ok(()),
            Ok(AlarmState::Alarm { breached }) => {
                warn!(deployment_id = %deployment_id, alarms = ?breached, "Alarm threshold breached");
                Err(DeploymentError::AlarmBreached { alarms: breached })
            }
            Err(e) if alarms.ignore_poll_alarm_failure => {
                warn!(deployment_id = %deployment_id, error = %e, "Alarm poll failed, ignoring");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn shift_traffic(&self, deployment_id: &DeploymentId, split: TrafficSplit) -> Result<()> {
        self.traffic.shift_traffic(deployment_id, split).await?;
        Ok(())
    }

    /// Append to a version's log; failures are logged, not raised
    pub async fn log_version(&self, version_id: &VersionId, entry: VersionLogEntry) {
        if let Err(e) = self.versions.append_log(version_id, entry).await {
            warn!(version_id = %version_id, error = %e, "Failed to append version log");
        }
    }
}
