//! Lifecycle hooks and alarm evaluation

use crate::error::CollaboratorError;
use async_trait::async_trait;
use rollout_types::{AlarmConfiguration, DeploymentId, HookDescriptor};
use tracing::debug;

/// Executes lifecycle hooks
#[async_trait]
pub trait HookInvoker: Send + Sync {
    async fn invoke(
        &self,
        deployment_id: &DeploymentId,
        hook: &HookDescriptor,
    ) -> Result<(), CollaboratorError>;
}

/// Hook invoker that accepts every hook without running anything
pub struct NoopHookInvoker;

#[async_trait]
impl HookInvoker for NoopHookInvoker {
    async fn invoke(
        &self,
        deployment_id: &DeploymentId,
        hook: &HookDescriptor,
    ) -> Result<(), CollaboratorError> {
        debug!(
            deployment_id = %deployment_id,
            hook = %hook.name,
            target = %hook.target,
            "Hook skipped (noop invoker)"
        );
        Ok(())
    }
}

/// Outcome of polling the configured alarms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmState {
    Ok,
    Alarm { breached: Vec<String> },
}

/// Evaluates health alarms between canary steps
#[async_trait]
pub trait AlarmEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        deployment_id: &DeploymentId,
        alarms: &AlarmConfiguration,
    ) -> Result<AlarmState, CollaboratorError>;
}

/// Alarm evaluator that never fires
pub struct QuietAlarmEvaluator;

#[async_trait]
impl AlarmEvaluator for QuietAlarmEvaluator {
    async fn evaluate(
        &self,
        _deployment_id: &DeploymentId,
        _alarms: &AlarmConfiguration,
    ) -> Result<AlarmState, CollaboratorError> {
        Ok(AlarmState::Ok)
    }
}
