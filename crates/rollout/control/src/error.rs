//! Error types for the orchestrator

use rollout_deployment::{CollaboratorError, DeploymentError, RepositoryError};
use rollout_types::{DeploymentId, EnvironmentId, FunctionId, ValidationCheck, ValidationResult, VersionId};
use thiserror::Error;

/// Orchestrator error type
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Referenced entity does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// One or more blocking validation checks failed
    #[error("Validation failed for {context}: {}", summarize(.checks))]
    ValidationFailed {
        context: String,
        checks: Vec<ValidationCheck>,
    },

    /// Operation is not legal in the entity's current state
    #[error("Cannot {operation} while {current}")]
    InvalidStateTransition { current: String, operation: String },

    /// Configuration does not fit the selected strategy
    #[error("Strategy misconfigured: {0}")]
    StrategyMisconfigured(String),

    #[error("Strategy execution failed: {0}")]
    StrategyExecutionFailed(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, ControlPlaneError>;

fn summarize(checks: &[ValidationCheck]) -> String {
    checks
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ControlPlaneError {
    pub fn deployment_not_found(id: &DeploymentId) -> Self {
        Self::NotFound {
            kind: "deployment",
            id: id.to_string(),
        }
    }

    pub fn version_not_found(id: &VersionId) -> Self {
        Self::NotFound {
            kind: "version",
            id: id.to_string(),
        }
    }

    pub fn environment_not_found(id: &EnvironmentId) -> Self {
        Self::NotFound {
            kind: "environment",
            id: id.to_string(),
        }
    }

    pub fn function_not_found(id: &FunctionId) -> Self {
        Self::NotFound {
            kind: "function",
            id: id.to_string(),
        }
    }

    pub fn invalid_state(current: impl ToString, operation: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            current: current.to_string(),
            operation: operation.into(),
        }
    }

    /// Fail with the result's failed checks unless it passed
    pub fn check(context: &str, result: ValidationResult) -> Result<ValidationResult> {
        if result.passed {
            Ok(result)
        } else {
            Err(Self::ValidationFailed {
                context: context.to_string(),
                checks: result.failures().cloned().collect(),
            })
        }
    }

    /// Failed checks carried by a `ValidationFailed`
    pub fn checks(&self) -> &[ValidationCheck] {
        match self {
            Self::ValidationFailed { checks, .. } => checks,
            _ => &[],
        }
    }
}

impl From<DeploymentError> for ControlPlaneError {
    fn from(err: DeploymentError) -> Self {
        match err {
            DeploymentError::NotFound { kind, id } => Self::NotFound { kind, id },
            DeploymentError::InvalidState { current, expected } => Self::InvalidStateTransition {
                current,
                operation: format!("proceed (expected one of {})", expected.join(", ")),
            },
            DeploymentError::ValidationFailed(reason) => Self::StrategyMisconfigured(reason),
            DeploymentError::Repository(e) => Self::Repository(e),
            DeploymentError::Collaborator(e) => Self::Collaborator(e),
            other => Self::StrategyExecutionFailed(other.to_string()),
        }
    }
}
