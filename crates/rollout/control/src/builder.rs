//! Builder for DeploymentOrchestrator
//!
//! Storage and collaborators default to their in-memory or no-op versions;
//! only the function lookup has no sensible default and must be supplied.

use crate::config::ControlConfig;
use crate::control_plane::DeploymentOrchestrator;
use crate::error::{ControlPlaneError, Result};
use rollout_deployment::catalog::FunctionLookup;
use rollout_deployment::hooks::{AlarmEvaluator, HookInvoker, NoopHookInvoker, QuietAlarmEvaluator};
use rollout_deployment::routing::{InMemoryTrafficRouter, TrafficController};
use rollout_deployment::state::{
    InMemoryDeploymentRepository, InMemoryEnvironmentRepository, InMemoryVersionRepository,
};
use rollout_deployment::{DeploymentContext, DeploymentRepository, EnvironmentRepository, VersionRepository};
use std::sync::Arc;

/// Builder for constructing a DeploymentOrchestrator with its collaborators
#[derive(Default)]
pub struct DeploymentOrchestratorBuilder {
    deployments: Option<Arc<dyn DeploymentRepository>>,
    versions: Option<Arc<dyn VersionRepository>>,
    environments: Option<Arc<dyn EnvironmentRepository>>,
    functions: Option<Arc<dyn FunctionLookup>>,
    hooks: Option<Arc<dyn HookInvoker>>,
    alarms: Option<Arc<dyn AlarmEvaluator>>,
    traffic: Option<Arc<dyn TrafficController>>,
    config: Option<ControlConfig>,
}

impl DeploymentOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deployment repository
    pub fn with_deployment_repository(mut self, repository: Arc<dyn DeploymentRepository>) -> Self {
        self.deployments = Some(repository);
        self
    }

    /// Set the version repository
    pub fn with_version_repository(mut self, repository: Arc<dyn VersionRepository>) -> Self {
        self.versions = Some(repository);
        self
    }

    /// Set the environment repository
    pub fn with_environment_repository(mut self, repository: Arc<dyn EnvironmentRepository>) -> Self {
        self.environments = Some(repository);
        self
    }

    /// Set the function lookup
    pub fn with_function_lookup(mut self, functions: Arc<dyn FunctionLookup>) -> Self {
        self.functions = Some(functions);
        self
    }

    /// Set the hook invoker
    pub fn with_hook_invoker(mut self, hooks: Arc<dyn HookInvoker>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Set the alarm evaluator
    pub fn with_alarm_evaluator(mut self, alarms: Arc<dyn AlarmEvaluator>) -> Self {
        self.alarms = Some(alarms);
        self
    }

    /// Set the traffic controller
    pub fn with_traffic_controller(mut self, traffic: Arc<dyn TrafficController>) -> Self {
        self.traffic = Some(traffic);
        self
    }

    /// Set the orchestrator configuration
    pub fn with_config(mut self, config: ControlConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<DeploymentOrchestrator> {
        let functions = self
            .functions
            .ok_or_else(|| ControlPlaneError::Config("function_lookup required".into()))?;
        let config = self.config.unwrap_or_default();
        if config.rollout.default_timeout_seconds <= 0 {
            return Err(ControlPlaneError::Config(format!(
                "default_timeout_seconds must be positive, got {}",
                config.rollout.default_timeout_seconds
            )));
        }

        let ctx = DeploymentContext::new(
            self.deployments
                .unwrap_or_else(|| Arc::new(InMemoryDeploymentRepository::new())),
            self.versions
                .unwrap_or_else(|| Arc::new(InMemoryVersionRepository::new())),
            self.environments
                .unwrap_or_else(|| Arc::new(InMemoryEnvironmentRepository::new())),
            functions,
            self.hooks.unwrap_or_else(|| Arc::new(NoopHookInvoker)),
            self.alarms.unwrap_or_else(|| Arc::new(QuietAlarmEvaluator)),
            self.traffic
                .unwrap_or_else(|| Arc::new(InMemoryTrafficRouter::new())),
        );

        Ok(DeploymentOrchestrator::new(ctx, config.rollout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout_deployment::catalog::InMemoryFunctionCatalog;

    #[test]
    fn test_builder_missing_function_lookup() {
        let result = DeploymentOrchestratorBuilder::new().build();
        assert!(matches!(result, Err(ControlPlaneError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_non_positive_timeout() {
        let mut config = ControlConfig::default();
        config.rollout.default_timeout_seconds = 0;
        let result = DeploymentOrchestratorBuilder::new()
            .with_function_lookup(Arc::new(InMemoryFunctionCatalog::new()))
            .with_config(config)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_complete() {
        let orchestrator = DeploymentOrchestratorBuilder::new()
            .with_function_lookup(Arc::new(InMemoryFunctionCatalog::new()))
            .with_traffic_controller(Arc::new(InMemoryTrafficRouter::new()))
            .build()
            .unwrap();

        assert_eq!(orchestrator.settings().default_timeout_seconds, 900);
        assert_eq!(orchestrator.default_configuration().timeout_seconds, 900);
    }
}
