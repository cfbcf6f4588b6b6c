//! Deployment environments
//!
//! An environment describes a deployable target: its network placement,
//! scaling bounds, security posture, and the runtimes it can host.

use crate::ids::{AccountId, DeploymentId, EnvironmentId};
use crate::status::EnvironmentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Load balancer health check block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    pub path: String,
    pub protocol: String,
    pub interval_seconds: i32,
    pub timeout_seconds: i32,
    pub healthy_threshold: i32,
    pub unhealthy_threshold: i32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            protocol: "HTTP".to_string(),
            interval_seconds: 30,
            timeout_seconds: 5,
            healthy_threshold: 3,
            unhealthy_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    #[serde(rename = "type")]
    pub lb_type: String,
    pub target_group_arn: String,
    pub listener_arn: String,
    #[serde(default)]
    pub health_check: Option<HealthCheckConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Network {
    pub vpc_id: String,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    #[serde(default)]
    pub load_balancer: Option<LoadBalancer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    pub min_instances: i32,
    pub max_instances: i32,
    pub desired_instances: i32,
    /// Target CPU utilization, percent
    pub target_cpu_utilization: f64,
    /// Target memory utilization, percent
    pub target_memory_utilization: f64,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            min_instances: 1,
            max_instances: 1,
            desired_instances: 1,
            target_cpu_utilization: 70.0,
            target_memory_utilization: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Security {
    pub iam_role_arn: String,
    pub kms_key_arn: String,
}

/// A named reference to a secret held elsewhere. Never the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub reference: String,
}

/// Upper bounds on what a function may request in this environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_memory_mb: u32,
    pub max_cpu: f64,
    pub max_timeout_seconds: u32,
}

/// A deployable target environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEnvironment {
    pub id: EnvironmentId,
    pub account_id: AccountId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub network: Option<Network>,
    #[serde(default)]
    pub scaling: Option<Scaling>,
    #[serde(default)]
    pub security: Option<Security>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub secrets: Vec<Secret>,
    pub status: EnvironmentStatus,
    /// Deployments hosted here
    #[serde(default)]
    pub deployments: BTreeSet<DeploymentId>,
    /// Runtimes this environment can host; empty means any
    #[serde(default)]
    pub supported_runtimes: Vec<String>,
    #[serde(default)]
    pub resource_limits: Option<ResourceLimits>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentEnvironment {
    pub fn new(
        account_id: AccountId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EnvironmentId::generate(),
            account_id,
            name: name.into(),
            description: description.into(),
            network: None,
            scaling: None,
            security: None,
            variables: BTreeMap::new(),
            secrets: Vec::new(),
            status: EnvironmentStatus::Creating,
            deployments: BTreeSet::new(),
            supported_runtimes: Vec::new(),
            resource_limits: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = Some(scaling);
        self
    }

    pub fn with_security(mut self, security: Security) -> Self {
        self.security = Some(security);
        self
    }

    pub fn with_runtimes<I, S>(mut self, runtimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_runtimes = runtimes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.resource_limits = Some(limits);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == EnvironmentStatus::Active
    }

    pub fn supports_runtime(&self, runtime: &str) -> bool {
        self.supported_runtimes.is_empty() || self.supported_runtimes.iter().any(|r| r == runtime)
    }

    pub fn secret(&self, name: &str) -> Option<&Secret> {
        self.secrets.iter().find(|s| s.name == name)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn secret(name: &str, reference: &str) -> Secret {
        Secret {
            name: name.into(),
            reference: reference.into(),
        }
    }

    #[test]
    fn test_new_environment_is_creating_and_empty() {
        let env = DeploymentEnvironment::new(AccountId::new("acme"), "prod", "prod fleet");
        assert_eq!(env.status, EnvironmentStatus::Creating);
        assert!(!env.is_active());
        assert!(env.network.is_none());
        assert!(env.deployments.is_empty());
        assert_eq!(env.created_at, env.updated_at);
    }

    #[test]
    fn test_status_transitions() {
        let mut env = DeploymentEnvironment::new(AccountId::new("acme"), "prod", "prod fleet");
        assert!(env.status.can_transition_to(EnvironmentStatus::Active));
        env.status = EnvironmentStatus::Active;
        assert!(env.is_active());

        assert!(!env.status.can_transition_to(EnvironmentStatus::Creating));
        assert!(env.status.can_transition_to(EnvironmentStatus::Updating));
        assert!(env.status.can_transition_to(EnvironmentStatus::Deleting));
        assert!(!EnvironmentStatus::Creating.can_transition_to(EnvironmentStatus::Deleting));
        assert!(EnvironmentStatus::Failed.can_transition_to(EnvironmentStatus::Updating));
    }

    #[test]
    fn test_supports_runtime() {
        let open = DeploymentEnvironment::new(AccountId::new("acme"), "dev", "dev");
        assert!(open.supports_runtime("python3.12"));

        let pinned = open.with_runtimes(["nodejs18.x", "nodejs20.x"]);
        assert!(pinned.supports_runtime("nodejs20.x"));
        assert!(!pinned.supports_runtime("python3.12"));
    }

    #[test]
    fn test_secret_lookup() {
        let mut env = DeploymentEnvironment::new(AccountId::new("acme"), "prod", "prod fleet");
        assert!(env.secret("db").is_none());

        env.secrets = vec![secret("db", "arn:secret:db"), secret("api", "arn:secret:api")];
        assert_eq!(env.secret("api").map(|s| s.reference.as_str()), Some("arn:secret:api"));
        assert!(env.secret("DB").is_none());
    }

    #[test]
    fn test_load_balancer_type_field_name() {
        let lb = LoadBalancer {
            lb_type: "application".into(),
            target_group_arn: "arn:tg".into(),
            listener_arn: "arn:listener".into(),
            health_check: None,
        };
        let json = serde_json::to_value(&lb).unwrap();
        assert_eq!(json["type"], "application");

        let parsed: LoadBalancer = serde_json::from_str(
            r#"{"type":"network","target_group_arn":"arn:tg","listener_arn":"arn:l"}"#,
        )
        .unwrap();
        assert_eq!(parsed.lb_type, "network");
        assert!(parsed.health_check.is_none());
    }
}
