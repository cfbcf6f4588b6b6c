//! Deployment error types

use crate::state::RepositoryError;
use thiserror::Error;

/// Errors raised by external collaborators
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Hook {name} failed: {reason}")]
    HookFailed { name: String, reason: String },

    #[error("Alarm evaluation failed: {0}")]
    AlarmEvaluation(String),

    #[error("Traffic controller error: {0}")]
    Traffic(String),

    #[error("Function lookup failed: {0}")]
    FunctionLookup(String),
}

/// Deployment errors
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid deployment state: {current}, expected one of: {expected:?}")]
    InvalidState {
        current: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Alarm threshold breached: {alarms:?}")]
    AlarmBreached { alarms: Vec<String> },

    #[error("Deployment stopped")]
    Stopped,

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
}

impl DeploymentError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        DeploymentError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result type for deployment operations
pub type Result<T> = std::result::Result<T, DeploymentError>;
