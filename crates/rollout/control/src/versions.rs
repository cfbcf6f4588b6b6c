//! Version operations

use crate::control_plane::DeploymentOrchestrator;
use crate::error::{ControlPlaneError, Result};
use rollout_deployment::RepositoryError;
use rollout_types::{DeploymentId, DeploymentVersion, ValidationResult, VersionId, VersionLogEntry, VersionStatus};
use tracing::{info, instrument};

impl DeploymentOrchestrator {
    // ========== Version Operations ==========

    pub async fn get_version(&self, version_id: &VersionId) -> Result<DeploymentVersion> {
        self.ctx
            .versions
            .get(version_id)
            .await?
            .ok_or_else(|| ControlPlaneError::version_not_found(version_id))
    }

    /// Versions of a deployment, oldest first
    pub async fn list_versions(&self, deployment_id: &DeploymentId) -> Result<Vec<DeploymentVersion>> {
        self.get_deployment(deployment_id).await?;
        let mut versions = self.ctx.versions.list_by_deployment(deployment_id).await?;
        versions.sort_by_key(|v| v.version_number);
        Ok(versions)
    }

    /// Build a freshly created version ahead of its rollout
    #[instrument(skip(self), fields(version_id = %version_id))]
    pub async fn build_version(&self, version_id: &VersionId) -> Result<DeploymentVersion> {
        let version = self.get_version(version_id).await?;
        if version.status != VersionStatus::Created {
            return Err(ControlPlaneError::invalid_state(version.status, "build version"));
        }
        ControlPlaneError::check("version", self.ctx.validator.validate_version(&version))?;

        for to in [VersionStatus::Building, VersionStatus::Built] {
            self.ctx
                .versions
                .transition_status(version_id, to)
                .await
                .map_err(|e| match e {
                    RepositoryError::Conflict(_) => ControlPlaneError::invalid_state(version.status, "build version"),
                    other => other.into(),
                })?;
        }
        info!(version_id = %version_id, deployment_id = %version.deployment_id, "Version built");
        self.get_version(version_id).await
    }

    /// Retire a version nothing serves or references
    #[instrument(skip(self), fields(version_id = %version_id))]
    pub async fn archive_version(&self, version_id: &VersionId) -> Result<DeploymentVersion> {
        let version = self.get_version(version_id).await?;
        if version.status == VersionStatus::Deploying {
            return Err(ControlPlaneError::invalid_state(version.status, "archive version"));
        }
        if let Some(deployment) = self.ctx.deployments.get(&version.deployment_id).await? {
            if deployment.references(version_id) {
                return Err(ControlPlaneError::invalid_state(
                    format!("referenced by {}", deployment.id),
                    "archive version",
                ));
            }
        }

        let archived = self
            .ctx
            .versions
            .transition_status(version_id, VersionStatus::Archived)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ControlPlaneError::invalid_state(version.status, "archive version"),
                other => other.into(),
            })?;
        info!(version_id = %version_id, "Version archived");
        Ok(archived)
    }

    /// Run the version rules against the stored record
    pub async fn validate_version(&self, version_id: &VersionId) -> Result<ValidationResult> {
        let version = self.get_version(version_id).await?;
        Ok(self.ctx.validator.validate_version(&version))
    }

    pub async fn get_version_logs(&self, version_id: &VersionId) -> Result<Vec<VersionLogEntry>> {
        Ok(self.get_version(version_id).await?.logs)
    }
}
