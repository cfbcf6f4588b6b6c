//! Environment operations

use crate::control_plane::DeploymentOrchestrator;
use crate::error::{ControlPlaneError, Result};
use chrono::Utc;
use rollout_deployment::RepositoryError;
use rollout_types::{
    AccountId, DeploymentEnvironment, EnvironmentId, EnvironmentStatus, Secret, ValidationResult,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, instrument};

impl DeploymentOrchestrator {
    // ========== Environment Operations ==========

    /// Validate and register an environment, then mark it active
    #[instrument(skip(self, env), fields(environment_id = %env.id, name = %env.name))]
    pub async fn create_environment(&self, mut env: DeploymentEnvironment) -> Result<DeploymentEnvironment> {
        ControlPlaneError::check("environment", self.ctx.validator.validate_environment(&env))?;

        env.status = EnvironmentStatus::Creating;
        env.deployments = BTreeSet::new();
        self.ctx.environments.create(&env).await?;

        let created = self
            .ctx
            .environments
            .modify(&env.id, Box::new(|e| set_status(e, EnvironmentStatus::Active)))
            .await?;
        info!(environment_id = %created.id, account_id = %created.account_id, "Environment created");
        Ok(created)
    }

    pub async fn get_environment(&self, environment_id: &EnvironmentId) -> Result<DeploymentEnvironment> {
        self.load_environment(environment_id).await
    }

    pub async fn list_environments_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<DeploymentEnvironment>> {
        Ok(self.ctx.environments.list_by_account(account_id).await?)
    }

    /// Replace the editable fields of an environment
    ///
    /// Identity, status, creation time and hosted deployments stay as stored.
    #[instrument(skip(self, update), fields(environment_id = %update.id))]
    pub async fn update_environment(&self, update: DeploymentEnvironment) -> Result<DeploymentEnvironment> {
        let stored = self.load_environment(&update.id).await?;

        let mut candidate = update;
        candidate.account_id = stored.account_id;
        candidate.status = stored.status;
        candidate.deployments = stored.deployments;
        candidate.created_at = stored.created_at;
        ControlPlaneError::check("environment", self.ctx.validator.validate_environment(&candidate))?;

        let updated = self
            .ctx
            .environments
            .modify(
                &stored.id,
                Box::new(move |e| {
                    e.name = candidate.name;
                    e.description = candidate.description;
                    e.network = candidate.network;
                    e.scaling = candidate.scaling;
                    e.security = candidate.security;
                    e.variables = candidate.variables;
                    e.secrets = candidate.secrets;
                    e.supported_runtimes = candidate.supported_runtimes;
                    e.resource_limits = candidate.resource_limits;
                    e.updated_at = Utc::now();
                    Ok(())
                }),
            )
            .await?;
        info!(environment_id = %updated.id, "Environment updated");
        Ok(updated)
    }

    /// Delete an environment that hosts no deployments
    #[instrument(skip(self), fields(environment_id = %environment_id))]
    pub async fn delete_environment(&self, environment_id: &EnvironmentId) -> Result<()> {
        let env = self.load_environment(environment_id).await?;
        let hosted = self.ctx.deployments.list_by_environment(environment_id).await?;
        if !env.deployments.is_empty() || !hosted.is_empty() {
            return Err(ControlPlaneError::invalid_state(
                format!("hosting {} deployment(s)", env.deployments.len().max(hosted.len())),
                "delete environment",
            ));
        }

        if env.status.can_transition_to(EnvironmentStatus::Deleting) {
            self.ctx
                .environments
                .modify(environment_id, Box::new(|e| set_status(e, EnvironmentStatus::Deleting)))
                .await?;
        }
        self.ctx.environments.delete(environment_id).await?;
        info!(environment_id = %environment_id, "Environment deleted");
        Ok(())
    }

    /// Run the environment rules against the stored record
    pub async fn validate_environment(&self, environment_id: &EnvironmentId) -> Result<ValidationResult> {
        let env = self.load_environment(environment_id).await?;
        Ok(self.ctx.validator.validate_environment(&env))
    }

    /// Add a secret, replacing any secret with the same name
    #[instrument(skip(self, secret), fields(environment_id = %environment_id, secret = %secret.name))]
    pub async fn add_environment_secret(
        &self,
        environment_id: &EnvironmentId,
        secret: Secret,
    ) -> Result<DeploymentEnvironment> {
        let mut candidate = self.load_environment(environment_id).await?;
        upsert_secret(&mut candidate.secrets, secret.clone());
        ControlPlaneError::check("secret", self.ctx.validator.validate_environment(&candidate))?;

        let updated = self
            .ctx
            .environments
            .modify(
                environment_id,
                Box::new(move |e| {
                    upsert_secret(&mut e.secrets, secret);
                    e.updated_at = Utc::now();
                    Ok(())
                }),
            )
            .await?;
        info!(environment_id = %environment_id, "Environment secret stored");
        Ok(updated)
    }

    #[instrument(skip(self), fields(environment_id = %environment_id))]
    pub async fn remove_environment_secret(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
    ) -> Result<DeploymentEnvironment> {
        let env = self.load_environment(environment_id).await?;
        if env.secret(name).is_none() {
            return Err(ControlPlaneError::NotFound {
                kind: "secret",
                id: name.to_string(),
            });
        }

        let owned = name.to_string();
        let updated = self
            .ctx
            .environments
            .modify(
                environment_id,
                Box::new(move |e| {
                    e.secrets.retain(|s| s.name != owned);
                    e.updated_at = Utc::now();
                    Ok(())
                }),
            )
            .await?;
        info!(environment_id = %environment_id, secret = name, "Environment secret removed");
        Ok(updated)
    }

    /// Replace all environment variables
    #[instrument(skip(self, variables), fields(environment_id = %environment_id, count = variables.len()))]
    pub async fn set_environment_variables(
        &self,
        environment_id: &EnvironmentId,
        variables: BTreeMap<String, String>,
    ) -> Result<DeploymentEnvironment> {
        let mut candidate = self.load_environment(environment_id).await?;
        candidate.variables = variables.clone();
        ControlPlaneError::check("variables", self.ctx.validator.validate_environment(&candidate))?;

        Ok(self
            .ctx
            .environments
            .modify(
                environment_id,
                Box::new(move |e| {
                    e.variables = variables;
                    e.updated_at = Utc::now();
                    Ok(())
                }),
            )
            .await?)
    }
}

fn set_status(env: &mut DeploymentEnvironment, to: EnvironmentStatus) -> std::result::Result<(), RepositoryError> {
    if !env.status.can_transition_to(to) {
        return Err(RepositoryError::Conflict(format!(
            "environment status is {}, cannot move to {}",
            env.status, to
        )));
    }
    env.status = to;
    env.updated_at = Utc::now();
    Ok(())
}

fn upsert_secret(secrets: &mut Vec<Secret>, secret: Secret) {
    match secrets.iter_mut().find(|s| s.name == secret.name) {
        Some(existing) => *existing = secret,
        None => secrets.push(secret),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(name: &str, reference: &str) -> Secret {
        Secret {
            name: name.into(),
            reference: reference.into(),
        }
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let mut secrets = vec![secret("db", "arn:1")];
        upsert_secret(&mut secrets, secret("db", "arn:2"));
        upsert_secret(&mut secrets, secret("api", "arn:3"));

        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets[0].reference, "arn:2");
        assert_eq!(secrets[1].name, "api");
    }
}
