//! Deployment state persistence
//!
//! Repositories give per-record read-modify-write atomicity through
//! `modify`. Status changes are compare-and-set operations built on top of
//! it, so a concurrent stop can never be overwritten by a stale writer.

mod memory;

pub use memory::{
    InMemoryDeploymentRepository, InMemoryEnvironmentRepository, InMemoryVersionRepository,
};

use async_trait::async_trait;
use rollout_types::{
    AccountId, Deployment, DeploymentEnvironment, DeploymentId, DeploymentStatus,
    DeploymentVersion, EnvironmentId, FunctionId, VersionId, VersionLogEntry, VersionStatus,
};

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// An in-place edit applied atomically to one record
pub type Mutation<T> = Box<dyn FnOnce(&mut T) -> Result<(), RepositoryError> + Send>;

/// Storage for deployments
#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    /// Insert a new deployment; fails with `Conflict` if the id exists
    async fn create(&self, deployment: &Deployment) -> Result<(), RepositoryError>;

    async fn get(&self, id: &DeploymentId) -> Result<Option<Deployment>, RepositoryError>;

    async fn delete(&self, id: &DeploymentId) -> Result<(), RepositoryError>;

    async fn list_by_account(&self, account_id: &AccountId)
        -> Result<Vec<Deployment>, RepositoryError>;

    async fn list_by_function(
        &self,
        function_id: &FunctionId,
    ) -> Result<Vec<Deployment>, RepositoryError>;

    async fn list_by_environment(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Deployment>, RepositoryError>;

    /// Apply a mutation atomically and return the stored result
    async fn modify(
        &self,
        id: &DeploymentId,
        mutation: Mutation<Deployment>,
    ) -> Result<Deployment, RepositoryError>;

    async fn find_by_function_and_environment(
        &self,
        function_id: &FunctionId,
        environment_id: &EnvironmentId,
    ) -> Result<Option<Deployment>, RepositoryError> {
        Ok(self
            .list_by_function(function_id)
            .await?
            .into_iter()
            .find(|d| &d.environment_id == environment_id))
    }

    /// Move to `to` only if the current status is one of `from`
    async fn transition_status(
        &self,
        id: &DeploymentId,
        from: &[DeploymentStatus],
        to: DeploymentStatus,
    ) -> Result<Deployment, RepositoryError> {
        let from = from.to_vec();
        self.modify(
            id,
            Box::new(move |d| {
                check_transition(d.status, &from, to)?;
                d.status = to;
                Ok(())
            }),
        )
        .await
    }

    /// Deploying -> Deployed with pointer rotation, in one step
    async fn complete_rollout(
        &self,
        id: &DeploymentId,
        version_id: &VersionId,
    ) -> Result<Deployment, RepositoryError> {
        let version_id = version_id.clone();
        self.modify(
            id,
            Box::new(move |d| {
                check_transition(
                    d.status,
                    &[DeploymentStatus::Deploying],
                    DeploymentStatus::Deployed,
                )?;
                d.status = DeploymentStatus::Deployed;
                d.promote_version(version_id);
                Ok(())
            }),
        )
        .await
    }

    /// RollingBack -> RolledBack, swapping pointers when `swap` is set
    async fn complete_rollback(
        &self,
        id: &DeploymentId,
        swap: bool,
    ) -> Result<Deployment, RepositoryError> {
        self.modify(
            id,
            Box::new(move |d| {
                check_transition(
                    d.status,
                    &[DeploymentStatus::RollingBack],
                    DeploymentStatus::RolledBack,
                )?;
                d.status = DeploymentStatus::RolledBack;
                if swap {
                    d.swap_versions();
                }
                Ok(())
            }),
        )
        .await
    }
}

fn check_transition(
    current: DeploymentStatus,
    from: &[DeploymentStatus],
    to: DeploymentStatus,
) -> Result<(), RepositoryError> {
    if from.contains(&current) && current.can_transition_to(to) {
        Ok(())
    } else {
        Err(RepositoryError::Conflict(format!(
            "status is {}, cannot move to {}",
            current, to
        )))
    }
}

/// Storage for deployment versions
#[async_trait]
pub trait VersionRepository: Send + Sync {
    async fn create(&self, version: &DeploymentVersion) -> Result<(), RepositoryError>;

    async fn get(&self, id: &VersionId) -> Result<Option<DeploymentVersion>, RepositoryError>;

    /// Versions of a deployment ordered by version number
    async fn list_by_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<Vec<DeploymentVersion>, RepositoryError>;

    async fn delete(&self, id: &VersionId) -> Result<(), RepositoryError>;

    async fn modify(
        &self,
        id: &VersionId,
        mutation: Mutation<DeploymentVersion>,
    ) -> Result<DeploymentVersion, RepositoryError>;

    /// Remove every version of a deployment, returning how many were removed
    async fn delete_by_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<usize, RepositoryError> {
        let versions = self.list_by_deployment(deployment_id).await?;
        for version in &versions {
            self.delete(&version.id).await?;
        }
        Ok(versions.len())
    }

    /// Move along a legal edge and record the change in the version log
    async fn transition_status(
        &self,
        id: &VersionId,
        to: VersionStatus,
    ) -> Result<DeploymentVersion, RepositoryError> {
        self.modify(
            id,
            Box::new(move |v| {
                if !v.status.can_transition_to(to) {
                    return Err(RepositoryError::Conflict(format!(
                        "version status is {}, cannot move to {}",
                        v.status, to
                    )));
                }
                v.logs.push(VersionLogEntry::info(format!(
                    "status {} -> {}",
                    v.status, to
                )));
                v.status = to;
                Ok(())
            }),
        )
        .await
    }

    async fn append_log(
        &self,
        id: &VersionId,
        entry: VersionLogEntry,
    ) -> Result<DeploymentVersion, RepositoryError> {
        self.modify(
            id,
            Box::new(move |v| {
                v.logs.push(entry);
                Ok(())
            }),
        )
        .await
    }

    async fn latest_version_number(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<Option<u64>, RepositoryError> {
        Ok(self
            .list_by_deployment(deployment_id)
            .await?
            .iter()
            .map(|v| v.version_number)
            .max())
    }
}

/// Storage for deployment environments
#[async_trait]
pub trait EnvironmentRepository: Send + Sync {
    async fn create(&self, env: &DeploymentEnvironment) -> Result<(), RepositoryError>;

    async fn get(
        &self,
        id: &EnvironmentId,
    ) -> Result<Option<DeploymentEnvironment>, RepositoryError>;

    async fn delete(&self, id: &EnvironmentId) -> Result<(), RepositoryError>;

    async fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<DeploymentEnvironment>, RepositoryError>;

    async fn modify(
        &self,
        id: &EnvironmentId,
        mutation: Mutation<DeploymentEnvironment>,
    ) -> Result<DeploymentEnvironment, RepositoryError>;
}
