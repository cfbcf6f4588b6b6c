use crate::{non_empty, Validator};
use rollout_types::{
    DeploymentEnvironment, FunctionDescriptor, Severity, ValidationResult, VersionConfiguration,
};

impl Validator {
    /// Check that an environment can host a function
    pub fn validate_compatibility(
        &self,
        function: &FunctionDescriptor,
        env: &DeploymentEnvironment,
    ) -> ValidationResult {
        self.validate_hosting(&VersionConfiguration::from(function), env)
    }

    /// Check that an environment can host a version's frozen configuration
    pub fn validate_hosting(
        &self,
        config: &VersionConfiguration,
        env: &DeploymentEnvironment,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.check(
            "environment.status",
            env.is_active(),
            Severity::Error,
            format!("environment {} is {}, expected active", env.id, env.status),
        );
        result.check(
            "runtime",
            env.supports_runtime(&config.runtime),
            Severity::Error,
            format!(
                "runtime {} not supported by environment {}",
                config.runtime, env.name
            ),
        );
        result.check(
            "entry_point",
            non_empty(&config.entry_point),
            Severity::Error,
            "function entry point is required",
        );

        if let Some(limits) = &env.resource_limits {
            result.check(
                "memory_mb",
                config.memory_mb <= limits.max_memory_mb,
                Severity::Error,
                format!(
                    "memory {}MB exceeds limit {}MB",
                    config.memory_mb, limits.max_memory_mb
                ),
            );
            result.check(
                "cpu",
                config.cpu <= limits.max_cpu,
                Severity::Error,
                format!("cpu {} exceeds limit {}", config.cpu, limits.max_cpu),
            );
            result.check(
                "timeout_seconds",
                config.timeout_seconds <= limits.max_timeout_seconds,
                Severity::Error,
                format!(
                    "timeout {}s exceeds limit {}s",
                    config.timeout_seconds, limits.max_timeout_seconds
                ),
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{active_environment, function, valid_environment};
    use rollout_types::ResourceLimits;

    #[test]
    fn test_compatible_function_passes() {
        let env = active_environment().with_runtimes(["nodejs18.x", "python3.12"]);
        let result = Validator::new().validate_compatibility(&function(), &env);
        assert!(result.passed, "{}", result.summary());
    }

    #[test]
    fn test_inactive_environment_fails() {
        let result = Validator::new().validate_compatibility(&function(), &valid_environment());
        assert!(!result.find("environment.status").unwrap().passed);
    }

    #[test]
    fn test_unsupported_runtime_fails() {
        let env = active_environment().with_runtimes(["python3.12"]);
        let result = Validator::new().validate_compatibility(&function(), &env);
        assert!(!result.passed);
        assert!(!result.find("runtime").unwrap().passed);
    }

    #[test]
    fn test_resource_limits_enforced() {
        let env = active_environment().with_limits(ResourceLimits {
            max_memory_mb: 64,
            max_cpu: 4.0,
            max_timeout_seconds: 900,
        });
        let result = Validator::new().validate_compatibility(&function(), &env);
        assert!(!result.find("memory_mb").unwrap().passed);
        assert!(result.find("cpu").unwrap().passed);
        assert_eq!(result.blocking_failures().len(), 1);
    }
}
