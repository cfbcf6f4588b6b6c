//! In-memory repositories for development and tests

use super::{
    DeploymentRepository, EnvironmentRepository, Mutation, RepositoryError, VersionRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rollout_types::{
    AccountId, Deployment, DeploymentEnvironment, DeploymentId, DeploymentVersion, EnvironmentId,
    FunctionId, VersionId,
};

/// In-memory deployment store
pub struct InMemoryDeploymentRepository {
    deployments: DashMap<DeploymentId, Deployment>,
}

impl InMemoryDeploymentRepository {
    pub fn new() -> Self {
        Self {
            deployments: DashMap::new(),
        }
    }
}

impl Default for InMemoryDeploymentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeploymentRepository for InMemoryDeploymentRepository {
    async fn create(&self, deployment: &Deployment) -> Result<(), RepositoryError> {
        match self.deployments.entry(deployment.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "{} already exists",
                deployment.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(deployment.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &DeploymentId) -> Result<Option<Deployment>, RepositoryError> {
        Ok(self.deployments.get(id).map(|d| d.clone()))
    }

    async fn delete(&self, id: &DeploymentId) -> Result<(), RepositoryError> {
        self.deployments
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<Deployment>, RepositoryError> {
        Ok(self.collect(|d| &d.account_id == account_id))
    }

    async fn list_by_function(
        &self,
        function_id: &FunctionId,
    ) -> Result<Vec<Deployment>, RepositoryError> {
        Ok(self.collect(|d| &d.function_id == function_id))
    }

    async fn list_by_environment(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Deployment>, RepositoryError> {
        Ok(self.collect(|d| &d.environment_id == environment_id))
    }

    async fn modify(
        &self,
        id: &DeploymentId,
        mutation: Mutation<Deployment>,
    ) -> Result<Deployment, RepositoryError> {
        let mut entry = self
            .deployments
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        let mut draft = entry.clone();
        mutation(&mut draft)?;
        draft.updated_at = Utc::now();
        *entry = draft.clone();
        Ok(draft)
    }
}

impl InMemoryDeploymentRepository {
    fn collect(&self, filter: impl Fn(&Deployment) -> bool) -> Vec<Deployment> {
        let mut out: Vec<Deployment> = self
            .deployments
            .iter()
            .filter(|d| filter(d.value()))
            .map(|d| d.clone())
            .collect();
        out.sort_by_key(|d| d.created_at);
        out
    }
}

/// In-memory version store
pub struct InMemoryVersionRepository {
    versions: DashMap<VersionId, DeploymentVersion>,
}

impl InMemoryVersionRepository {
    pub fn new() -> Self {
        Self {
            versions: DashMap::new(),
        }
    }
}

impl Default for InMemoryVersionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionRepository for InMemoryVersionRepository {
    async fn create(&self, version: &DeploymentVersion) -> Result<(), RepositoryError> {
        if self.versions.contains_key(&version.id) {
            return Err(RepositoryError::Conflict(format!(
                "{} already exists",
                version.id
            )));
        }
        self.versions.insert(version.id.clone(), version.clone());
        Ok(())
    }

    async fn get(&self, id: &VersionId) -> Result<Option<DeploymentVersion>, RepositoryError> {
        Ok(self.versions.get(id).map(|v| v.clone()))
    }

    async fn list_by_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<Vec<DeploymentVersion>, RepositoryError> {
        let mut out: Vec<DeploymentVersion> = self
            .versions
            .iter()
            .filter(|v| &v.deployment_id == deployment_id)
            .map(|v| v.clone())
            .collect();
        out.sort_by_key(|v| v.version_number);
        Ok(out)
    }

    async fn delete(&self, id: &VersionId) -> Result<(), RepositoryError> {
        self.versions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn modify(
        &self,
        id: &VersionId,
        mutation: Mutation<DeploymentVersion>,
    ) -> Result<DeploymentVersion, RepositoryError> {
        let mut entry = self
            .versions
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        let mut draft = entry.clone();
        mutation(&mut draft)?;
        draft.updated_at = Utc::now();
        *entry = draft.clone();
        Ok(draft)
    }
}

/// In-memory environment store
pub struct InMemoryEnvironmentRepository {
    environments: DashMap<EnvironmentId, DeploymentEnvironment>,
}

impl InMemoryEnvironmentRepository {
    pub fn new() -> Self {
        Self {
            environments: DashMap::new(),
        }
    }
}

impl Default for InMemoryEnvironmentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnvironmentRepository for InMemoryEnvironmentRepository {
    async fn create(&self, env: &DeploymentEnvironment) -> Result<(), RepositoryError> {
        if self.environments.contains_key(&env.id) {
            return Err(RepositoryError::Conflict(format!("{} already exists", env.id)));
        }
        self.environments.insert(env.id.clone(), env.clone());
        Ok(())
    }

    async fn get(
        &self,
        id: &EnvironmentId,
    ) -> Result<Option<DeploymentEnvironment>, RepositoryError> {
        Ok(self.environments.get(id).map(|e| e.clone()))
    }

    async fn delete(&self, id: &EnvironmentId) -> Result<(), RepositoryError> {
        self.environments
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<DeploymentEnvironment>, RepositoryError> {
        let mut out: Vec<DeploymentEnvironment> = self
            .environments
            .iter()
            .filter(|e| &e.account_id == account_id)
            .map(|e| e.clone())
            .collect();
        out.sort_by_key(|e| e.created_at);
        Ok(out)
    }

    async fn modify(
        &self,
        id: &EnvironmentId,
        mutation: Mutation<DeploymentEnvironment>,
    ) -> Result<DeploymentEnvironment, RepositoryError> {
        let mut entry = self
            .environments
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        let mut draft = entry.clone();
        mutation(&mut draft)?;
        draft.updated_at = Utc::now();
        *entry = draft.clone();
        Ok(draft)
    }
}
