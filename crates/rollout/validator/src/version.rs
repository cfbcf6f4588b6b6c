use crate::{non_empty, Validator};
use rollout_types::{DeploymentVersion, Severity, ValidationResult};

impl Validator {
    /// Validate a version's identity, source and frozen configuration
    pub fn validate_version(&self, version: &DeploymentVersion) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.check(
            "id",
            !version.id.as_uuid().is_nil(),
            Severity::Error,
            "version id is required",
        );
        result.check(
            "function_id",
            non_empty(version.function_id.as_str()),
            Severity::Error,
            "function id is required",
        );
        result.check(
            "version_number",
            version.version_number > 0,
            Severity::Error,
            "version number is required",
        );
        result.check(
            "source_url",
            non_empty(&version.source_url),
            Severity::Error,
            "source package URL is required",
        );
        result.check(
            "configuration.runtime",
            non_empty(&version.configuration.runtime),
            Severity::Error,
            "runtime is required",
        );
        result.check(
            "configuration.entry_point",
            non_empty(&version.configuration.entry_point),
            Severity::Error,
            "entry point is required",
        );

        for (i, dep) in version.dependencies.iter().enumerate() {
            result.check(
                &format!("dependencies[{}]", i),
                non_empty(&dep.name) && non_empty(&dep.version),
                Severity::Error,
                "dependency requires both a name and a version",
            );
        }

        result
    }
}
