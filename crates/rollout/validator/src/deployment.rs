use crate::configuration::check_identity;
use crate::{non_empty, Validator};
use rollout_types::{
    Deployment, DeploymentEnvironment, DeploymentStatus, DeploymentVersion, ScalingConfiguration,
    Severity, ValidationResult, VersionStatus,
};
use tracing::debug;

impl Validator {
    /// Validate a deployment as a whole, including its configuration
    pub fn validate_deployment(&self, deployment: &Deployment) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.check(
            "id",
            !deployment.id.as_uuid().is_nil(),
            Severity::Error,
            "deployment id is required",
        );
        result.check(
            "name",
            non_empty(&deployment.name),
            Severity::Error,
            "deployment name is required",
        );
        check_identity(&mut result, "account_id", deployment.account_id.as_str());
        check_identity(&mut result, "function_id", deployment.function_id.as_str());
        result.check(
            "environment_id",
            !deployment.environment_id.as_uuid().is_nil(),
            Severity::Error,
            "environment id is required",
        );
        result.check(
            "strategy",
            deployment.configuration.strategy == deployment.strategy,
            Severity::Error,
            format!(
                "configuration strategy {} does not match deployment strategy {}",
                deployment.configuration.strategy, deployment.strategy
            ),
        );

        result.merge(
            "configuration",
            self.validate_configuration(&deployment.configuration),
        );

        debug!(
            deployment_id = %deployment.id,
            passed = result.passed,
            "Deployment validated"
        );
        result
    }

    /// Assess the health of a deployment's serving state
    pub fn validate_health(
        &self,
        deployment: &Deployment,
        current: Option<&DeploymentVersion>,
        env: Option<&DeploymentEnvironment>,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();

        match deployment.status {
            DeploymentStatus::Deployed => {
                result.check("status", true, Severity::Info, "deployment is deployed")
            }
            DeploymentStatus::Failed => result.check(
                "status",
                false,
                Severity::Critical,
                "deployment is in a failed state",
            ),
            other => result.check(
                "status",
                false,
                Severity::Warning,
                format!("deployment is {}", other),
            ),
        }

        match current {
            Some(version) => result.check(
                "current_version",
                version.status == VersionStatus::Deployed,
                Severity::Error,
                format!("current version {} is {}", version.id, version.status),
            ),
            None => result.check(
                "current_version",
                false,
                Severity::Error,
                "no current version is serving traffic",
            ),
        }

        match env {
            Some(env) => result.check(
                "environment",
                env.is_active(),
                Severity::Error,
                format!("environment {} is {}", env.id, env.status),
            ),
            None => result.check(
                "environment",
                false,
                Severity::Error,
                "environment not found",
            ),
        }

        let scaling = deployment.configuration.scaling.or_else(|| {
            env.and_then(|e| e.scaling.as_ref()).map(|s| {
                ScalingConfiguration::new(s.min_instances, s.max_instances, s.desired_instances)
            })
        });
        if let Some(scaling) = scaling {
            result.check(
                "scaling",
                scaling.is_consistent(),
                Severity::Warning,
                format!(
                    "effective scaling min={} desired={} max={}",
                    scaling.min_instances, scaling.desired_instances, scaling.max_instances
                ),
            );
        }

        result.check(
            "traffic",
            deployment.last_deployed_at.is_some(),
            Severity::Info,
            match deployment.last_deployed_at {
                Some(at) => format!("last traffic shift at {}", at.to_rfc3339()),
                None => "traffic has never been shifted".to_string(),
            },
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{active_environment, deployment, version};
    use rollout_types::{DeploymentConfiguration, StrategyType};

    #[test]
    fn test_fresh_deployment_passes() {
        let d = deployment(DeploymentConfiguration::all_at_once());
        let result = Validator::new().validate_deployment(&d);
        assert!(result.passed, "{}", result.summary());
    }

    #[test]
    fn test_strategy_mismatch_fails() {
        let mut d = deployment(DeploymentConfiguration::all_at_once());
        d.strategy = StrategyType::Canary;
        let result = Validator::new().validate_deployment(&d);
        assert!(!result.find("strategy").unwrap().passed);
    }

    #[test]
    fn test_configuration_findings_are_prefixed() {
        let d = deployment(DeploymentConfiguration::all_at_once().with_timeout(-5));
        let result = Validator::new().validate_deployment(&d);
        assert!(!result.passed);
        assert!(!result.find("configuration.timeout_seconds").unwrap().passed);
    }

    #[test]
    fn test_healthy_deployment() {
        let mut d = deployment(DeploymentConfiguration::all_at_once());
        let mut v = version();
        v.status = VersionStatus::Deployed;
        d.status = DeploymentStatus::Deployed;
        d.promote_version(v.id.clone());
        let env = active_environment();

        let result = Validator::new().validate_health(&d, Some(&v), Some(&env));
        assert!(result.passed, "{}", result.summary());
        assert_eq!(result.failures().count(), 0);
    }

    #[test]
    fn test_failed_deployment_is_critical() {
        let mut d = deployment(DeploymentConfiguration::all_at_once());
        d.status = DeploymentStatus::Failed;
        let result = Validator::new().validate_health(&d, None, Some(&active_environment()));
        assert!(!result.passed);
        assert_eq!(result.find("status").unwrap().severity, Severity::Critical);
    }

    #[test]
    fn test_pending_deployment_only_warns_on_status() {
        let d = deployment(DeploymentConfiguration::all_at_once());
        let result = Validator::new().validate_health(&d, None, Some(&active_environment()));
        let status = result.find("status").unwrap();
        assert!(!status.passed);
        assert_eq!(status.severity, Severity::Warning);
        assert!(!result.find("current_version").unwrap().passed);
    }
}
