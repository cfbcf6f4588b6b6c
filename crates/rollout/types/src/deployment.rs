//! Deployment entity and its aggregate metrics and health

use crate::configuration::{DeploymentConfiguration, StrategyType};
use crate::ids::{AccountId, DeploymentId, EnvironmentId, FunctionId, VersionId};
use crate::status::DeploymentStatus;
use crate::validation::ValidationCheck;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Aggregate rollout counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeploymentMetrics {
    pub total_rollouts: u64,
    pub successful_rollouts: u64,
    pub failed_rollouts: u64,
    pub rollbacks: u64,
    pub last_rollout_duration_ms: Option<u64>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DeploymentMetrics {
    pub fn record_rollout(&mut self, succeeded: bool, duration: Duration) {
        self.total_rollouts += 1;
        if succeeded {
            self.successful_rollouts += 1;
        } else {
            self.failed_rollouts += 1;
        }
        self.last_rollout_duration_ms = Some(duration.as_millis() as u64);
        self.last_updated = Some(Utc::now());
    }

    pub fn record_rollback(&mut self, duration: Duration) {
        self.rollbacks += 1;
        self.last_rollout_duration_ms = Some(duration.as_millis() as u64);
        self.last_updated = Some(Utc::now());
    }

    /// Share of rollouts that succeeded, 0.0 when none ran
    pub fn success_rate(&self) -> f64 {
        if self.total_rollouts == 0 {
            0.0
        } else {
            self.successful_rollouts as f64 / self.total_rollouts as f64
        }
    }
}

/// Overall health of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    Unknown,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot produced by a health check run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeploymentHealth {
    pub status: HealthStatus,
    #[serde(default)]
    pub checks: Vec<ValidationCheck>,
    pub last_checked: Option<DateTime<Utc>>,
}

/// A function bound to an environment under a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub name: String,
    pub description: String,
    pub account_id: AccountId,
    pub function_id: FunctionId,
    pub environment_id: EnvironmentId,
    pub strategy: StrategyType,
    pub configuration: DeploymentConfiguration,
    pub status: DeploymentStatus,
    pub current_version_id: Option<VersionId>,
    pub previous_version_id: Option<VersionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_deployed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: DeploymentMetrics,
    #[serde(default)]
    pub health: DeploymentHealth,
}

impl Deployment {
    pub fn new(
        account_id: AccountId,
        function_id: FunctionId,
        environment_id: EnvironmentId,
        name: impl Into<String>,
        configuration: DeploymentConfiguration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: DeploymentId::generate(),
            name: name.into(),
            description: String::new(),
            account_id,
            function_id,
            environment_id,
            strategy: configuration.strategy,
            configuration,
            status: DeploymentStatus::Pending,
            current_version_id: None,
            previous_version_id: None,
            created_at: now,
            updated_at: now,
            last_deployed_at: None,
            metrics: DeploymentMetrics::default(),
            health: DeploymentHealth::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Rotate version pointers after a successful rollout
    pub fn promote_version(&mut self, version_id: VersionId) {
        if self.current_version_id.as_ref() != Some(&version_id) {
            self.previous_version_id = self.current_version_id.take();
        }
        self.current_version_id = Some(version_id);
        let now = Utc::now();
        self.last_deployed_at = Some(now);
        self.updated_at = now;
    }

    /// Swap current and previous after a rollback
    pub fn swap_versions(&mut self) {
        std::mem::swap(&mut self.current_version_id, &mut self.previous_version_id);
        self.updated_at = Utc::now();
    }

    /// Whether the version is referenced as current or previous
    pub fn references(&self, version_id: &VersionId) -> bool {
        self.current_version_id.as_ref() == Some(version_id)
            || self.previous_version_id.as_ref() == Some(version_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment() -> Deployment {
        Deployment::new(
            AccountId::new("acme"),
            FunctionId::new("resize"),
            EnvironmentId::generate(),
            "resize-prod",
            DeploymentConfiguration::all_at_once(),
        )
    }

    #[test]
    fn test_new_deployment_is_pending() {
        let d = deployment();
        assert_eq!(d.status, DeploymentStatus::Pending);
        assert_eq!(d.strategy, StrategyType::AllAtOnce);
        assert!(d.current_version_id.is_none());
    }

    #[test]
    fn test_pointer_rotation() {
        let mut d = deployment();
        let v1 = VersionId::generate();
        let v2 = VersionId::generate();

        d.promote_version(v1.clone());
        assert_eq!(d.current_version_id, Some(v1.clone()));
        assert!(d.previous_version_id.is_none());

        d.promote_version(v2.clone());
        assert_eq!(d.current_version_id, Some(v2.clone()));
        assert_eq!(d.previous_version_id, Some(v1.clone()));

        d.swap_versions();
        assert_eq!(d.current_version_id, Some(v1));
        assert_eq!(d.previous_version_id, Some(v2));
    }

    #[test]
    fn test_redeploying_current_keeps_previous() {
        let mut d = deployment();
        let v1 = VersionId::generate();
        let v2 = VersionId::generate();
        d.promote_version(v1.clone());
        d.promote_version(v2.clone());
        d.promote_version(v2.clone());
        assert_eq!(d.previous_version_id, Some(v1));
    }

    #[test]
    fn test_metrics_counters() {
        let mut metrics = DeploymentMetrics::default();
        metrics.record_rollout(true, Duration::from_millis(1500));
        metrics.record_rollout(false, Duration::from_millis(10));
        metrics.record_rollback(Duration::from_millis(20));
        assert_eq!(metrics.total_rollouts, 2);
        assert_eq!(metrics.failed_rollouts, 1);
        assert_eq!(metrics.rollbacks, 1);
        assert_eq!(metrics.last_rollout_duration_ms, Some(20));
        assert!((metrics.success_rate() - 0.5).abs() < f64::EPSILON);
    }
}
