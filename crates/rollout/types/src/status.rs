//! Lifecycle state machines
//!
//! Every status write in the system is checked against `can_transition_to`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Created, no rollout attempted yet
    Pending,
    /// Pre-flight validation in progress
    Validating,
    /// Strategy body is moving traffic
    Deploying,
    /// Rollout completed
    Deployed,
    /// Rollout or rollback failed
    Failed,
    /// Traffic is moving back to an earlier version
    RollingBack,
    /// Rollback completed
    RolledBack,
    /// Explicitly stopped by an operator
    Stopped,
}

impl DeploymentStatus {
    /// Check whether moving to `next` is a legal edge
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, Deploying)
                | (Validating, Failed)
                | (Deploying, Deployed)
                | (Deploying, Failed)
                | (Deploying, Stopped)
                | (Deployed, RollingBack)
                | (Deployed, Validating)
                | (RollingBack, RolledBack)
                | (RollingBack, Failed)
                | (RollingBack, Stopped)
                | (RolledBack, RollingBack)
                | (RolledBack, Validating)
                | (Failed, Validating)
                | (Failed, RollingBack)
                | (Stopped, Validating)
                | (Stopped, RollingBack)
        )
    }

    /// An operation is moving traffic for this deployment
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Validating
                | DeploymentStatus::Deploying
                | DeploymentStatus::RollingBack
        )
    }

    /// Statuses from which an explicit stop is legal
    pub fn is_stoppable(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Deploying | DeploymentStatus::RollingBack
        )
    }

    /// Statuses from which a new rollout may start
    pub fn accepts_rollout(&self) -> bool {
        self.can_transition_to(DeploymentStatus::Validating)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Validating => "validating",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Deployed => "deployed",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::RollingBack => "rolling_back",
            DeploymentStatus::RolledBack => "rolled_back",
            DeploymentStatus::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Version build/deploy status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Created,
    Validating,
    Building,
    Built,
    Deploying,
    Deployed,
    Failed,
    Archived,
}

impl VersionStatus {
    /// Check whether moving to `next` is a legal edge
    pub fn can_transition_to(&self, next: VersionStatus) -> bool {
        use VersionStatus::*;
        if next == Archived {
            return !matches!(self, Deploying | Archived);
        }
        matches!(
            (self, next),
            (Created, Validating)
                | (Created, Building)
                | (Validating, Building)
                | (Validating, Failed)
                | (Building, Built)
                | (Building, Failed)
                | (Built, Validating)
                | (Built, Deploying)
                | (Built, Failed)
                | (Deploying, Deployed)
                | (Deploying, Failed)
                | (Failed, Validating)
        )
    }

    /// Versions that may be handed to a strategy for rollout
    pub fn is_deployable(&self) -> bool {
        matches!(
            self,
            VersionStatus::Created | VersionStatus::Built | VersionStatus::Failed
        )
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionStatus::Created => "created",
            VersionStatus::Validating => "validating",
            VersionStatus::Building => "building",
            VersionStatus::Built => "built",
            VersionStatus::Deploying => "deploying",
            VersionStatus::Deployed => "deployed",
            VersionStatus::Failed => "failed",
            VersionStatus::Archived => "archived",
        };
        write!(f, "{}", s)
    }
}

/// Environment provisioning status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentStatus {
    Creating,
    Active,
    Updating,
    Failed,
    Deleting,
}

impl EnvironmentStatus {
    pub fn can_transition_to(&self, next: EnvironmentStatus) -> bool {
        use EnvironmentStatus::*;
        matches!(
            (self, next),
            (Creating, Active)
                | (Creating, Failed)
                | (Active, Updating)
                | (Active, Deleting)
                | (Updating, Active)
                | (Updating, Failed)
                | (Failed, Updating)
                | (Failed, Deleting)
        )
    }
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnvironmentStatus::Creating => "creating",
            EnvironmentStatus::Active => "active",
            EnvironmentStatus::Updating => "updating",
            EnvironmentStatus::Failed => "failed",
            EnvironmentStatus::Deleting => "deleting",
        };
        write!(f, "{}", s)
    }
}
