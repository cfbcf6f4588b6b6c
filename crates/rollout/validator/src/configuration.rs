use crate::{non_empty, Validator};
use rollout_types::{DeploymentConfiguration, Severity, ValidationResult};

impl Validator {
    /// Validate a deployment configuration and its strategy shape
    pub fn validate_configuration(&self, config: &DeploymentConfiguration) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.check(
            "timeout_seconds",
            config.timeout_seconds > 0,
            Severity::Error,
            format!("timeout must be positive, got {}", config.timeout_seconds),
        );

        let violations = config.strategy_violations();
        if violations.is_empty() {
            result.check(
                "strategy",
                true,
                Severity::Error,
                format!("{} configuration is well formed", config.strategy),
            );
        }
        for violation in violations {
            result.check("strategy", false, Severity::Error, violation);
        }

        for violation in config.traffic_routing.violations() {
            result.check("traffic_routing", false, Severity::Error, violation);
        }

        for (i, hook) in config.hooks().enumerate() {
            result.check(
                &format!("hooks[{}]", i),
                hook.is_complete(),
                Severity::Error,
                "hook requires both a name and a target",
            );
        }

        if config.rollback.enabled {
            result.check(
                "rollback.events",
                !config.rollback.events.is_empty(),
                Severity::Warning,
                "rollback is enabled but no triggering events are configured",
            );
        }

        if let Some(scaling) = &config.scaling {
            result.check(
                "scaling",
                scaling.is_consistent(),
                Severity::Error,
                format!(
                    "scaling override min={} desired={} max={} is inconsistent",
                    scaling.min_instances, scaling.desired_instances, scaling.max_instances
                ),
            );
        }

        result
    }

    /// Validate a scaling request: `0 <= min <= desired <= max`, `max > 0`
    pub fn validate_scaling(&self, min: i32, max: i32, desired: i32) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check(
            "min_instances",
            min >= 0,
            Severity::Error,
            format!("min instances must not be negative, got {}", min),
        );
        result.check(
            "max_instances",
            max > 0 && max >= min,
            Severity::Error,
            format!("max instances {} must be positive and at least min {}", max, min),
        );
        result.check(
            "desired_instances",
            desired >= min && desired <= max,
            Severity::Error,
            format!("desired instances {} outside [{}, {}]", desired, min, max),
        );
        result
    }
}

pub(crate) fn check_identity(result: &mut ValidationResult, name: &str, value: &str) {
    result.check(
        name,
        non_empty(value),
        Severity::Error,
        format!("{} is required", name),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout_types::{
        BlueGreenConfiguration, CanaryConfiguration, HookDescriptor, HookType,
        RollbackConfiguration, ScalingConfiguration, TrafficStep,
    };

    #[test]
    fn test_default_configuration_passes() {
        let result = Validator::new().validate_configuration(&DeploymentConfiguration::default());
        assert!(result.passed, "{}", result.summary());
    }

    #[test]
    fn test_canary_steps_not_reaching_full_traffic() {
        let config = DeploymentConfiguration::canary(CanaryConfiguration::with_steps(vec![
            TrafficStep::new(50, 10),
            TrafficStep::new(70, 10),
        ]));
        let result = Validator::new().validate_configuration(&config);
        assert!(!result.passed);
        assert!(result.failures().any(|c| c.name == "strategy"));
    }

    #[test]
    fn test_negative_blue_green_wait() {
        let config = DeploymentConfiguration::blue_green(BlueGreenConfiguration {
            termination_wait_time_in_minutes: -1,
            ..Default::default()
        });
        assert!(!Validator::new().validate_configuration(&config).passed);
    }

    #[test]
    fn test_zero_timeout_fails() {
        let config = DeploymentConfiguration::default().with_timeout(0);
        let result = Validator::new().validate_configuration(&config);
        assert!(!result.find("timeout_seconds").unwrap().passed);
    }

    #[test]
    fn test_rollback_without_events_is_warning() {
        let config = DeploymentConfiguration::default().with_rollback(RollbackConfiguration {
            enabled: true,
            events: Vec::new(),
        });
        let result = Validator::new().validate_configuration(&config);
        assert!(result.passed);
        assert_eq!(result.find("rollback.events").unwrap().severity, Severity::Warning);
    }

    #[test]
    fn test_incomplete_hook_fails() {
        let config = DeploymentConfiguration::default().with_hooks(
            vec![HookDescriptor::new("migrate", HookType::PreDeployment, "")],
            Vec::new(),
        );
        assert!(!Validator::new().validate_configuration(&config).passed);
    }

    #[test]
    fn test_inconsistent_scaling_override() {
        let mut config = DeploymentConfiguration::default();
        config.scaling = Some(ScalingConfiguration::new(3, 2, 2));
        assert!(!Validator::new().validate_configuration(&config).passed);
    }

    #[test]
    fn test_scaling_request_rules() {
        let v = Validator::new();
        assert!(v.validate_scaling(0, 3, 1).passed);
        assert!(v.validate_scaling(2, 2, 2).passed);
        assert!(!v.validate_scaling(-1, 3, 1).passed);
        assert!(!v.validate_scaling(0, 0, 0).passed);
        let result = v.validate_scaling(2, 5, 1);
        assert!(!result.find("desired_instances").unwrap().passed);
    }
}
