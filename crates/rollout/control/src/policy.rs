//! Automatic rollback policy

use rollout_deployment::RolloutOutcome;
use rollout_types::{DeploymentConfiguration, RollbackEvent};

/// Decides whether a failed rollout is rolled back without being asked
#[derive(Debug, Clone, Copy)]
pub struct RollbackPolicy {
    enabled: bool,
}

impl RollbackPolicy {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `outcome` of a rollout under `config` warrants a rollback
    pub fn should_rollback(&self, config: &DeploymentConfiguration, outcome: &RolloutOutcome) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(failure) = &outcome.failure else {
            return false;
        };
        if !failure.rollback_recommended {
            return false;
        }
        config.rollback.triggers_on(failure.event)
            || (config.auto_rollback && failure.event == RollbackEvent::DeploymentFailure)
    }
}

impl Default for RollbackPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout_types::{DeploymentStatus, RollbackConfiguration};

    fn failed(event: RollbackEvent, recommended: bool) -> RolloutOutcome {
        RolloutOutcome::failed(DeploymentStatus::Failed, event, "boom", recommended)
    }

    #[test]
    fn test_configured_events_trigger() {
        let policy = RollbackPolicy::default();
        let config = DeploymentConfiguration::all_at_once()
            .with_rollback(RollbackConfiguration::on([RollbackEvent::AlarmThreshold]));

        assert!(policy.should_rollback(&config, &failed(RollbackEvent::AlarmThreshold, true)));
        assert!(!policy.should_rollback(&config, &failed(RollbackEvent::DeploymentFailure, true)));
        assert!(!policy.should_rollback(&config, &failed(RollbackEvent::AlarmThreshold, false)));
    }

    #[test]
    fn test_auto_rollback_flag_covers_failures() {
        let config = DeploymentConfiguration::all_at_once().with_auto_rollback(true);
        let policy = RollbackPolicy::default();

        assert!(policy.should_rollback(&config, &failed(RollbackEvent::DeploymentFailure, true)));
        assert!(!policy.should_rollback(&config, &failed(RollbackEvent::DeploymentStop, true)));
        assert!(!RollbackPolicy::disabled()
            .should_rollback(&config, &failed(RollbackEvent::DeploymentFailure, true)));
    }

    #[test]
    fn test_success_never_rolls_back() {
        let config = DeploymentConfiguration::all_at_once().with_auto_rollback(true);
        assert!(!RollbackPolicy::default().should_rollback(
            &config,
            &RolloutOutcome::completed(DeploymentStatus::Deployed)
        ));
    }
}
