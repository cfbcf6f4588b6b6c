//! Traffic routing
//!
//! "Traffic" is the share of invocations a deployment sends to each of its
//! versions. Strategies decide the split; a [`TrafficController`] applies it.

use crate::error::CollaboratorError;
use async_trait::async_trait;
use dashmap::DashMap;
use rollout_types::{DeploymentEnvironment, DeploymentId, DeploymentVersion, VersionId};
use std::collections::HashSet;
use tracing::info;

/// Split of traffic between the serving version and a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficSplit {
    /// Version receiving the remainder; `None` on a first rollout
    pub stable: Option<VersionId>,
    pub candidate: VersionId,
    /// Percentage routed to `candidate`
    pub candidate_percentage: u32,
}

impl TrafficSplit {
    pub fn new(stable: Option<VersionId>, candidate: VersionId, candidate_percentage: u32) -> Self {
        Self {
            stable,
            candidate,
            candidate_percentage: candidate_percentage.min(100),
        }
    }

    /// Route everything to one version
    pub fn full(version: VersionId) -> Self {
        Self::new(None, version, 100)
    }

    pub fn with_percentage(&self, candidate_percentage: u32) -> Self {
        Self::new(
            self.stable.clone(),
            self.candidate.clone(),
            candidate_percentage,
        )
    }

    pub fn stable_percentage(&self) -> u32 {
        match self.stable {
            Some(_) => 100 - self.candidate_percentage,
            None => 0,
        }
    }
}

/// Applies traffic splits and provisions version targets
#[async_trait]
pub trait TrafficController: Send + Sync {
    /// Stand up a target able to serve `version`
    async fn prepare_target(
        &self,
        deployment_id: &DeploymentId,
        version: &DeploymentVersion,
        env: &DeploymentEnvironment,
    ) -> Result<(), CollaboratorError>;

    async fn shift_traffic(
        &self,
        deployment_id: &DeploymentId,
        split: TrafficSplit,
    ) -> Result<(), CollaboratorError>;

    async fn current_split(&self, deployment_id: &DeploymentId) -> Option<TrafficSplit>;

    /// Tear down the target serving `version_id`
    async fn release_target(
        &self,
        deployment_id: &DeploymentId,
        version_id: &VersionId,
    ) -> Result<(), CollaboratorError>;
}

/// Splits kept per deployment in [`InMemoryTrafficRouter::history`]
pub const HISTORY_LIMIT: usize = 256;

/// Records splits in memory; the development stand-in for a load balancer
pub struct InMemoryTrafficRouter {
    splits: DashMap<DeploymentId, TrafficSplit>,
    history: DashMap<DeploymentId, Vec<TrafficSplit>>,
    targets: DashMap<DeploymentId, HashSet<VersionId>>,
}

impl InMemoryTrafficRouter {
    pub fn new() -> Self {
        Self {
            splits: DashMap::new(),
            history: DashMap::new(),
            targets: DashMap::new(),
        }
    }

    /// Most recent splits applied to a deployment, oldest first
    ///
    /// At most [`HISTORY_LIMIT`] entries are retained.
    pub fn history(&self, deployment_id: &DeploymentId) -> Vec<TrafficSplit> {
        self.history
            .get(deployment_id)
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn has_target(&self, deployment_id: &DeploymentId, version_id: &VersionId) -> bool {
        self.targets
            .get(deployment_id)
            .map(|t| t.contains(version_id))
            .unwrap_or(false)
    }

    /// Drop all routing state for a deployment
    pub fn clear(&self, deployment_id: &DeploymentId) {
        self.splits.remove(deployment_id);
        self.history.remove(deployment_id);
        self.targets.remove(deployment_id);
    }
}

impl Default for InMemoryTrafficRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrafficController for InMemoryTrafficRouter {
    async fn prepare_target(
        &self,
        deployment_id: &DeploymentId,
        version: &DeploymentVersion,
        env: &DeploymentEnvironment,
    ) -> Result<(), CollaboratorError> {
        self.targets
            .entry(deployment_id.clone())
            .or_default()
            .insert(version.id.clone());

        info!(
            deployment_id = %deployment_id,
            version_id = %version.id,
            environment_id = %env.id,
            "Target prepared"
        );
        Ok(())
    }

    async fn shift_traffic(
        &self,
        deployment_id: &DeploymentId,
        split: TrafficSplit,
    ) -> Result<(), CollaboratorError> {
        if !self.has_target(deployment_id, &split.candidate) {
            return Err(CollaboratorError::Traffic(format!(
                "no target prepared for {}",
                split.candidate
            )));
        }

        info!(
            deployment_id = %deployment_id,
            candidate = %split.candidate,
            candidate_percentage = split.candidate_percentage,
            "Traffic split updated"
        );

        {
            let mut history = self.history.entry(deployment_id.clone()).or_default();
            history.push(split.clone());
            if history.len() > HISTORY_LIMIT {
                let excess = history.len() - HISTORY_LIMIT;
                history.drain(..excess);
            }
        }
        self.splits.insert(deployment_id.clone(), split);
        Ok(())
    }

    async fn current_split(&self, deployment_id: &DeploymentId) -> Option<TrafficSplit> {
        self.splits.get(deployment_id).map(|s| s.clone())
    }

    async fn release_target(
        &self,
        deployment_id: &DeploymentId,
        version_id: &VersionId,
    ) -> Result<(), CollaboratorError> {
        if let Some(mut targets) = self.targets.get_mut(deployment_id) {
            targets.remove(version_id);
        }
        info!(
            deployment_id = %deployment_id,
            version_id = %version_id,
            "Target released"
        );
        Ok(())
    }
}
