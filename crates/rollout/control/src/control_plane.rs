//! Main DeploymentOrchestrator implementation
//!
//! The orchestrator is the single entry point for rollout operations. It
//! owns the Deployment, DeploymentVersion and DeploymentEnvironment
//! lifecycles, selects a strategy per deployment and delegates the rollout
//! mechanics to it, then records metrics and applies the rollback policy.

use crate::config::RolloutSettings;
use crate::error::{ControlPlaneError, Result};
use crate::locks::KeyedLocks;
use crate::policy::RollbackPolicy;
use chrono::Utc;
use dashmap::DashMap;
use rollout_deployment::strategies::RollbackMode;
use rollout_deployment::{
    create_strategy, DeploymentContext, RepositoryError, RolloutOutcome, StopHandle, StopSignal,
    Strategy,
};
use rollout_types::*;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, instrument, warn};

/// Request for creating a deployment without rolling anything out
#[derive(Debug, Clone)]
pub struct CreateDeploymentRequest {
    pub function_id: FunctionId,
    pub environment_id: EnvironmentId,
    pub name: String,
    pub description: String,
    /// Falls back to the configured default strategy
    pub configuration: Option<DeploymentConfiguration>,
}

impl CreateDeploymentRequest {
    pub fn new(function_id: FunctionId, environment_id: EnvironmentId, name: impl Into<String>) -> Self {
        Self {
            function_id,
            environment_id,
            name: name.into(),
            description: String::new(),
            configuration: None,
        }
    }

    pub fn with_configuration(mut self, configuration: DeploymentConfiguration) -> Self {
        self.configuration = Some(configuration);
        self
    }
}

/// Result of a rollout request
#[derive(Debug, Clone)]
pub struct RolloutReport {
    /// Deployment after the rollout (and any automatic rollback)
    pub deployment: Deployment,
    pub version_id: VersionId,
    pub outcome: RolloutOutcome,
    /// Present when the rollback policy fired
    pub auto_rollback: Option<RolloutOutcome>,
}

impl RolloutReport {
    pub fn status(&self) -> DeploymentStatus {
        self.deployment.status
    }
}

/// Result of a rollback request
#[derive(Debug, Clone)]
pub struct RollbackReport {
    pub deployment: Deployment,
    pub outcome: RolloutOutcome,
}

/// Unified entry point for deployment operations
pub struct DeploymentOrchestrator {
    pub(crate) ctx: DeploymentContext,
    policy: RollbackPolicy,
    settings: RolloutSettings,
    /// Serializes rollout-mutating operations per deployment
    locks: KeyedLocks<DeploymentId>,
    /// Serializes deployment creation per (function, environment)
    pair_locks: KeyedLocks<(FunctionId, EnvironmentId)>,
    /// Serializes version numbering per deployment
    version_locks: KeyedLocks<DeploymentId>,
    /// Stop handles of in-flight operations
    stops: DashMap<DeploymentId, StopHandle>,
}

impl DeploymentOrchestrator {
    pub fn new(ctx: DeploymentContext, settings: RolloutSettings) -> Self {
        Self {
            ctx,
            policy: RollbackPolicy::new(settings.auto_rollback_enabled),
            settings,
            locks: KeyedLocks::new(),
            pair_locks: KeyedLocks::new(),
            version_locks: KeyedLocks::new(),
            stops: DashMap::new(),
        }
    }

    /// Collaborators this orchestrator runs strategies against
    pub fn context(&self) -> &DeploymentContext {
        &self.ctx
    }

    pub fn settings(&self) -> &RolloutSettings {
        &self.settings
    }

    /// Configuration used when none is supplied
    pub fn default_configuration(&self) -> DeploymentConfiguration {
        create_strategy(self.settings.default_strategy)
            .default_configuration()
            .with_timeout(self.settings.default_timeout_seconds)
    }

    // ========== Deployment Operations ==========

    /// Create a deployment binding a function to an environment
    #[instrument(skip(self, request), fields(function_id = %request.function_id, environment_id = %request.environment_id))]
    pub async fn create_deployment(&self, request: CreateDeploymentRequest) -> Result<Deployment> {
        let function = self.function(&request.function_id).await?;
        let env = self.load_environment(&request.environment_id).await?;
        let configuration = request
            .configuration
            .unwrap_or_else(|| self.default_configuration());
        self.check_configuration(&configuration)?;

        let _pair = self
            .pair_locks
            .lock(&(function.id.clone(), env.id.clone()))
            .await;
        if let Some(existing) = self
            .ctx
            .deployments
            .find_by_function_and_environment(&function.id, &env.id)
            .await?
        {
            return Err(ControlPlaneError::ValidationFailed {
                context: "deployment".into(),
                checks: vec![ValidationCheck::fail(
                    "environment_id",
                    Severity::Error,
                    format!("{} already deploys {} to {}", existing.id, function.id, env.id),
                )],
            });
        }

        let deployment = Deployment::new(
            function.account_id.clone(),
            function.id.clone(),
            env.id.clone(),
            request.name,
            configuration,
        )
        .with_description(request.description);
        self.insert_deployment(&deployment).await?;
        Ok(deployment)
    }

    pub async fn get_deployment(&self, deployment_id: &DeploymentId) -> Result<Deployment> {
        self.ctx
            .deployments
            .get(deployment_id)
            .await?
            .ok_or_else(|| ControlPlaneError::deployment_not_found(deployment_id))
    }

    pub async fn list_deployments_by_account(&self, account_id: &AccountId) -> Result<Vec<Deployment>> {
        Ok(self.ctx.deployments.list_by_account(account_id).await?)
    }

    pub async fn list_deployments_by_function(&self, function_id: &FunctionId) -> Result<Vec<Deployment>> {
        Ok(self.ctx.deployments.list_by_function(function_id).await?)
    }

    pub async fn list_deployments_by_environment(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Deployment>> {
        Ok(self.ctx.deployments.list_by_environment(environment_id).await?)
    }

    /// Replace the user-editable fields of a deployment
    ///
    /// Identity, status, version pointers, timestamps, metrics and health
    /// stay as stored.
    #[instrument(skip(self, update), fields(deployment_id = %update.id))]
    pub async fn update_deployment(&self, update: Deployment) -> Result<Deployment> {
        let _guard = self.locks.lock(&update.id).await;
        let stored = self.get_deployment(&update.id).await?;
        self.check_configuration(&update.configuration)?;

        let mut candidate = stored.clone();
        candidate.name = update.name;
        candidate.description = update.description;
        candidate.strategy = update.configuration.strategy;
        candidate.configuration = update.configuration;
        ControlPlaneError::check("deployment", self.ctx.validator.validate_deployment(&candidate))?;

        let updated = self
            .ctx
            .deployments
            .modify(
                &stored.id,
                Box::new(move |d| {
                    d.name = candidate.name;
                    d.description = candidate.description;
                    d.strategy = candidate.strategy;
                    d.configuration = candidate.configuration;
                    Ok(())
                }),
            )
            .await?;
        info!(deployment_id = %updated.id, "Deployment updated");
        Ok(updated)
    }

    /// Delete a deployment, its versions and its environment back-reference
    #[instrument(skip(self), fields(deployment_id = %deployment_id))]
    pub async fn delete_deployment(&self, deployment_id: &DeploymentId) -> Result<()> {
        let guard = self.locks.lock(deployment_id).await;
        let deployment = self.get_deployment(deployment_id).await?;
        if deployment.status.is_stoppable() {
            return Err(ControlPlaneError::invalid_state(deployment.status, "delete deployment"));
        }

        for version_id in [&deployment.current_version_id, &deployment.previous_version_id]
            .into_iter()
            .flatten()
        {
            if let Err(e) = self.ctx.traffic.release_target(deployment_id, version_id).await {
                warn!(deployment_id = %deployment_id, version_id = %version_id, error = %e, "Failed to release target");
            }
        }

        let removed = self.ctx.versions.delete_by_deployment(deployment_id).await?;
        let id = deployment_id.clone();
        match self
            .ctx
            .environments
            .modify(
                &deployment.environment_id,
                Box::new(move |env| {
                    env.deployments.remove(&id);
                    Ok(())
                }),
            )
            .await
        {
            Ok(_) | Err(RepositoryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.ctx.deployments.delete(deployment_id).await?;

        drop(guard);
        self.locks.remove(deployment_id);
        self.version_locks.remove(deployment_id);
        self.pair_locks
            .remove(&(deployment.function_id.clone(), deployment.environment_id.clone()));
        info!(deployment_id = %deployment_id, versions = removed, "Deployment deleted");
        Ok(())
    }

    // ========== Rollout Operations ==========

    /// Deploy the function's current definition to an environment
    ///
    /// Creates the deployment on first use of the pair, snapshots a new
    /// version and rolls it out with the configuration's strategy.
    #[instrument(skip(self, configuration), fields(function_id = %function_id, environment_id = %environment_id, strategy = %configuration.strategy))]
    pub async fn deploy_function(
        &self,
        function_id: &FunctionId,
        environment_id: &EnvironmentId,
        configuration: DeploymentConfiguration,
    ) -> Result<RolloutReport> {
        let function = self.function(function_id).await?;
        let env = self.load_environment(environment_id).await?;
        ControlPlaneError::check(
            "compatibility",
            self.ctx.validator.validate_compatibility(&function, &env),
        )?;
        self.check_configuration(&configuration)?;

        let (deployment, version) = {
            let _pair = self
                .pair_locks
                .lock(&(function.id.clone(), env.id.clone()))
                .await;
            let deployment = match self
                .ctx
                .deployments
                .find_by_function_and_environment(&function.id, &env.id)
                .await?
            {
                Some(existing) => existing,
                None => {
                    let deployment = Deployment::new(
                        function.account_id.clone(),
                        function.id.clone(),
                        env.id.clone(),
                        format!("{}-{}", function.id.as_str(), env.name),
                        configuration.clone(),
                    );
                    self.insert_deployment(&deployment).await?;
                    deployment
                }
            };
            let version = self.snapshot_version(&deployment.id, &function).await?;
            (deployment, version)
        };

        self.rollout(&deployment.id, &version.id, configuration).await
    }

    /// Snapshot the function into a new version without deploying it
    #[instrument(skip(self), fields(deployment_id = %deployment_id))]
    pub async fn create_version(&self, deployment_id: &DeploymentId) -> Result<DeploymentVersion> {
        let deployment = self.get_deployment(deployment_id).await?;
        let function = self.function(&deployment.function_id).await?;
        self.snapshot_version(deployment_id, &function).await
    }

    /// Roll out an existing version, under its deployment's stored
    /// configuration unless one is given
    #[instrument(skip(self, configuration), fields(deployment_id = %deployment_id, version_id = %version_id))]
    pub async fn deploy_version(
        &self,
        deployment_id: &DeploymentId,
        version_id: &VersionId,
        configuration: Option<DeploymentConfiguration>,
    ) -> Result<RolloutReport> {
        let deployment = self.get_deployment(deployment_id).await?;
        let version = self.get_version(version_id).await?;
        if version.deployment_id != deployment.id {
            return Err(ControlPlaneError::ValidationFailed {
                context: "version".into(),
                checks: vec![ValidationCheck::fail(
                    "deployment_id",
                    Severity::Error,
                    format!("{} belongs to {}", version.id, version.deployment_id),
                )],
            });
        }
        let configuration = configuration.unwrap_or(deployment.configuration);
        self.check_configuration(&configuration)?;
        self.rollout(deployment_id, version_id, configuration).await
    }

    /// Stop the in-flight rollout or rollback of a deployment
    #[instrument(skip(self), fields(deployment_id = %deployment_id))]
    pub async fn stop_deployment(&self, deployment_id: &DeploymentId) -> Result<Deployment> {
        let deployment = self.get_deployment(deployment_id).await?;
        if !deployment.status.is_stoppable() {
            return Err(ControlPlaneError::invalid_state(deployment.status, "stop deployment"));
        }

        let stopped = self
            .ctx
            .deployments
            .transition_status(
                deployment_id,
                &[DeploymentStatus::Deploying, DeploymentStatus::RollingBack],
                DeploymentStatus::Stopped,
            )
            .await
            .map_err(|e| conflict_as_state(e, deployment.status, "stop deployment"))?;

        if let Some(handle) = self.stops.get(deployment_id) {
            handle.raise();
        }
        info!(deployment_id = %deployment_id, was = %deployment.status, "Deployment stopped");
        Ok(stopped)
    }

    /// Roll back to the last known good version
    #[instrument(skip(self), fields(deployment_id = %deployment_id))]
    pub async fn rollback_deployment(&self, deployment_id: &DeploymentId) -> Result<RollbackReport> {
        let _guard = self.locks.lock(deployment_id).await;
        let deployment = self.get_deployment(deployment_id).await?;
        Self::check_rollback(&deployment)?;

        let strategy = create_strategy(deployment.strategy);
        let outcome = self.run_rollback(strategy.as_ref(), deployment_id).await;
        Ok(RollbackReport {
            deployment: self.get_deployment(deployment_id).await?,
            outcome,
        })
    }

    /// Deploy the current version of a deployment into another environment
    ///
    /// The promoted deployment is new: it copies the source configuration
    /// and a clone of the current version, then rolls that out.
    #[instrument(skip(self), fields(deployment_id = %deployment_id, target = %target_environment_id))]
    pub async fn promote_deployment(
        &self,
        deployment_id: &DeploymentId,
        target_environment_id: &EnvironmentId,
    ) -> Result<RolloutReport> {
        let source = self.get_deployment(deployment_id).await?;
        let current_id = source
            .current_version_id
            .clone()
            .ok_or_else(|| ControlPlaneError::invalid_state(source.status, "promote without a current version"))?;
        let current = self.get_version(&current_id).await?;
        let target = self.load_environment(target_environment_id).await?;
        ControlPlaneError::check(
            "compatibility",
            self.ctx
                .validator
                .validate_hosting(&current.configuration, &target),
        )?;

        let (promoted, version) = {
            let _pair = self
                .pair_locks
                .lock(&(source.function_id.clone(), target.id.clone()))
                .await;
            if let Some(existing) = self
                .ctx
                .deployments
                .find_by_function_and_environment(&source.function_id, &target.id)
                .await?
            {
                return Err(ControlPlaneError::ValidationFailed {
                    context: "promotion".into(),
                    checks: vec![ValidationCheck::fail(
                        "target_environment",
                        Severity::Error,
                        format!("{} already deploys {} to {}", existing.id, source.function_id, target.id),
                    )],
                });
            }

            let promoted = Deployment::new(
                source.account_id.clone(),
                source.function_id.clone(),
                target.id.clone(),
                format!("{}-{}", source.function_id.as_str(), target.name),
                source.configuration.clone(),
            )
            .with_description(format!("promoted from {}", source.id));
            self.insert_deployment(&promoted).await?;

            let now = Utc::now();
            let number = next_version_number(None, now);
            let version = DeploymentVersion {
                id: VersionId::generate(),
                deployment_id: promoted.id.clone(),
                version_number: number,
                version_label: format!("v{}", number),
                status: VersionStatus::Created,
                logs: vec![VersionLogEntry::info(format!(
                    "promoted from {} ({})",
                    current.id, source.id
                ))],
                created_at: now,
                updated_at: now,
                ..current.clone()
            };
            self.ctx.versions.create(&version).await?;
            (promoted, version)
        };

        info!(source = %source.id, promoted = %promoted.id, "Deployment promoted");
        self.rollout(&promoted.id, &version.id, promoted.configuration.clone())
            .await
    }

    /// Override the instance counts of a deployment
    #[instrument(skip(self), fields(deployment_id = %deployment_id))]
    pub async fn scale_deployment(
        &self,
        deployment_id: &DeploymentId,
        min_instances: i32,
        max_instances: i32,
        desired_instances: i32,
    ) -> Result<Deployment> {
        ControlPlaneError::check(
            "scaling",
            self.ctx
                .validator
                .validate_scaling(min_instances, max_instances, desired_instances),
        )?;
        let _guard = self.locks.lock(deployment_id).await;
        self.get_deployment(deployment_id).await?;

        let scaling = ScalingConfiguration::new(min_instances, max_instances, desired_instances);
        let updated = self
            .ctx
            .deployments
            .modify(
                deployment_id,
                Box::new(move |d| {
                    d.configuration.scaling = Some(scaling);
                    Ok(())
                }),
            )
            .await?;
        info!(
            deployment_id = %deployment_id,
            min = min_instances,
            max = max_instances,
            desired = desired_instances,
            "Deployment scaled"
        );
        Ok(updated)
    }

    /// Change how traffic moves; applies to a live canary immediately
    #[instrument(skip(self, routing), fields(deployment_id = %deployment_id))]
    pub async fn update_traffic_routing(
        &self,
        deployment_id: &DeploymentId,
        routing: TrafficRouting,
    ) -> Result<DeploymentStatus> {
        let deployment = self.get_deployment(deployment_id).await?;
        let strategy = create_strategy(deployment.strategy);
        Ok(strategy
            .update_traffic_routing(&self.ctx, deployment_id, &routing)
            .await?)
    }

    /// Assess and persist the health of a deployment
    #[instrument(skip(self), fields(deployment_id = %deployment_id))]
    pub async fn run_health_check(&self, deployment_id: &DeploymentId) -> Result<DeploymentHealth> {
        let deployment = self.get_deployment(deployment_id).await?;
        let current = match &deployment.current_version_id {
            Some(id) => self.ctx.versions.get(id).await?,
            None => None,
        };
        let env = self.ctx.environments.get(&deployment.environment_id).await?;

        let result = self
            .ctx
            .validator
            .validate_health(&deployment, current.as_ref(), env.as_ref());
        let health = DeploymentHealth {
            status: health_status(&result),
            checks: result.checks,
            last_checked: Some(Utc::now()),
        };

        let snapshot = health.clone();
        self.ctx
            .deployments
            .modify(
                deployment_id,
                Box::new(move |d| {
                    d.health = snapshot;
                    Ok(())
                }),
            )
            .await?;
        info!(deployment_id = %deployment_id, health = %health.status, "Health check completed");
        Ok(health)
    }

    pub async fn get_deployment_metrics(&self, deployment_id: &DeploymentId) -> Result<DeploymentMetrics> {
        Ok(self.get_deployment(deployment_id).await?.metrics)
    }

    pub async fn get_deployment_health(&self, deployment_id: &DeploymentId) -> Result<DeploymentHealth> {
        Ok(self.get_deployment(deployment_id).await?.health)
    }

    pub async fn get_deployment_status(&self, deployment_id: &DeploymentId) -> Result<DeploymentStatus> {
        Ok(self.get_deployment(deployment_id).await?.status)
    }

    /// Log entries of every version of a deployment, oldest first
    pub async fn get_deployment_logs(&self, deployment_id: &DeploymentId) -> Result<Vec<VersionLogEntry>> {
        self.get_deployment(deployment_id).await?;
        let mut logs: Vec<VersionLogEntry> = self
            .ctx
            .versions
            .list_by_deployment(deployment_id)
            .await?
            .into_iter()
            .flat_map(|v| v.logs)
            .collect();
        logs.sort_by_key(|entry| entry.timestamp);
        Ok(logs)
    }

    // ========== Internals ==========

    pub(crate) async fn function(&self, function_id: &FunctionId) -> Result<FunctionDescriptor> {
        self.ctx
            .functions
            .get_function(function_id)
            .await?
            .ok_or_else(|| ControlPlaneError::function_not_found(function_id))
    }

    pub(crate) async fn load_environment(&self, environment_id: &EnvironmentId) -> Result<DeploymentEnvironment> {
        self.ctx
            .environments
            .get(environment_id)
            .await?
            .ok_or_else(|| ControlPlaneError::environment_not_found(environment_id))
    }

    /// Strategy shape first, then the general configuration rules
    fn check_configuration(&self, configuration: &DeploymentConfiguration) -> Result<()> {
        let strategy = create_strategy(configuration.strategy);
        if !strategy.validate_configuration(configuration) {
            return Err(ControlPlaneError::StrategyMisconfigured(format!(
                "{} strategy: {}",
                strategy.name(),
                configuration.strategy_violations().join("; ")
            )));
        }
        ControlPlaneError::check(
            "configuration",
            self.ctx.validator.validate_configuration(configuration),
        )?;
        Ok(())
    }

    /// Persist a new deployment and its environment back-reference
    async fn insert_deployment(&self, deployment: &Deployment) -> Result<()> {
        ControlPlaneError::check("deployment", self.ctx.validator.validate_deployment(deployment))?;
        self.ctx.deployments.create(deployment).await?;

        let id = deployment.id.clone();
        self.ctx
            .environments
            .modify(
                &deployment.environment_id,
                Box::new(move |env| {
                    env.deployments.insert(id);
                    Ok(())
                }),
            )
            .await?;
        info!(
            deployment_id = %deployment.id,
            function_id = %deployment.function_id,
            environment_id = %deployment.environment_id,
            strategy = %deployment.strategy,
            "Deployment created"
        );
        Ok(())
    }

    async fn snapshot_version(
        &self,
        deployment_id: &DeploymentId,
        function: &FunctionDescriptor,
    ) -> Result<DeploymentVersion> {
        let _numbering = self.version_locks.lock(deployment_id).await;
        let latest = self.ctx.versions.latest_version_number(deployment_id).await?;
        let version = DeploymentVersion::snapshot(
            deployment_id.clone(),
            function,
            next_version_number(latest, Utc::now()),
        );
        ControlPlaneError::check("version", self.ctx.validator.validate_version(&version))?;
        self.ctx.versions.create(&version).await?;
        info!(
            deployment_id = %deployment_id,
            version_id = %version.id,
            version_number = version.version_number,
            "Version created"
        );
        Ok(version)
    }

    /// Run a rollout under the deployment lock, then record metrics and
    /// apply the rollback policy
    async fn rollout(
        &self,
        deployment_id: &DeploymentId,
        version_id: &VersionId,
        configuration: DeploymentConfiguration,
    ) -> Result<RolloutReport> {
        let _guard: OwnedMutexGuard<()> = self.locks.lock(deployment_id).await;
        let deployment = self.get_deployment(deployment_id).await?;
        if !deployment.status.accepts_rollout() {
            return Err(ControlPlaneError::invalid_state(deployment.status, "start a rollout"));
        }

        let persisted = configuration.clone();
        self.ctx
            .deployments
            .modify(
                deployment_id,
                Box::new(move |d| {
                    d.strategy = persisted.strategy;
                    d.configuration = persisted;
                    Ok(())
                }),
            )
            .await?;

        let strategy = create_strategy(configuration.strategy);
        let ctx = self.ctx.with_stop(self.register_stop(deployment_id));
        let started = tokio::time::Instant::now();
        let outcome = strategy
            .deploy(&ctx, deployment_id, version_id, &configuration)
            .await;
        self.stops.remove(deployment_id);

        let elapsed = started.elapsed();
        let succeeded = outcome.is_success();
        self.ctx
            .deployments
            .modify(
                deployment_id,
                Box::new(move |d| {
                    d.metrics.record_rollout(succeeded, elapsed);
                    Ok(())
                }),
            )
            .await?;

        let auto_rollback = if self.policy.should_rollback(&configuration, &outcome) {
            self.auto_rollback(strategy.as_ref(), deployment_id, &outcome)
                .await
        } else {
            None
        };

        Ok(RolloutReport {
            deployment: self.get_deployment(deployment_id).await?,
            version_id: version_id.clone(),
            outcome,
            auto_rollback,
        })
    }

    async fn auto_rollback(
        &self,
        strategy: &dyn Strategy,
        deployment_id: &DeploymentId,
        trigger: &RolloutOutcome,
    ) -> Option<RolloutOutcome> {
        let deployment = match self.get_deployment(deployment_id).await {
            Ok(d) => d,
            Err(e) => {
                warn!(deployment_id = %deployment_id, error = %e, "Automatic rollback skipped");
                return None;
            }
        };
        if let Err(e) = Self::check_rollback(&deployment) {
            warn!(deployment_id = %deployment_id, reason = %e, "Automatic rollback not possible");
            return None;
        }

        info!(
            deployment_id = %deployment_id,
            trigger = ?trigger.failure.as_ref().map(|f| f.event),
            "Automatic rollback triggered"
        );
        let outcome = self.run_rollback(strategy, deployment_id).await;
        if !outcome.is_success() {
            warn!(
                deployment_id = %deployment_id,
                reason = outcome.reason().unwrap_or_default(),
                "Automatic rollback failed"
            );
        }
        Some(outcome)
    }

    /// Caller holds the deployment lock
    async fn run_rollback(&self, strategy: &dyn Strategy, deployment_id: &DeploymentId) -> RolloutOutcome {
        let ctx = self.ctx.with_stop(self.register_stop(deployment_id));
        let started = tokio::time::Instant::now();
        let outcome = strategy.rollback(&ctx, deployment_id).await;
        self.stops.remove(deployment_id);

        let elapsed = started.elapsed();
        let succeeded = outcome.is_success();
        let recorded = self
            .ctx
            .deployments
            .modify(
                deployment_id,
                Box::new(move |d| {
                    if succeeded {
                        d.metrics.record_rollback(elapsed);
                    } else {
                        d.metrics.last_updated = Some(Utc::now());
                    }
                    Ok(())
                }),
            )
            .await;
        if let Err(e) = recorded {
            warn!(deployment_id = %deployment_id, error = %e, "Failed to record rollback metrics");
        }
        outcome
    }

    fn register_stop(&self, deployment_id: &DeploymentId) -> StopSignal {
        let (handle, signal) = StopSignal::channel();
        self.stops.insert(deployment_id.clone(), handle);
        signal
    }

    /// Preconditions shared by explicit and automatic rollback
    fn check_rollback(deployment: &Deployment) -> Result<RollbackMode> {
        let mode = RollbackMode::for_status(deployment.status)
            .ok_or_else(|| ControlPlaneError::invalid_state(deployment.status, "roll back"))?;
        if deployment.previous_version_id.is_none() {
            return Err(ControlPlaneError::invalid_state(
                deployment.status,
                "roll back without a previous version",
            ));
        }
        if mode.target(deployment).is_none() {
            return Err(ControlPlaneError::invalid_state(
                deployment.status,
                "roll back without a current version",
            ));
        }
        Ok(mode)
    }
}

fn conflict_as_state(err: RepositoryError, current: DeploymentStatus, operation: &str) -> ControlPlaneError {
    match err {
        RepositoryError::Conflict(_) => ControlPlaneError::invalid_state(current, operation),
        other => other.into(),
    }
}

/// Blocking failures make a deployment unhealthy, other failures degraded
fn health_status(result: &ValidationResult) -> HealthStatus {
    if !result.blocking_failures().is_empty() {
        HealthStatus::Unhealthy
    } else if result.failures().next().is_some() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
