//! Shared fixtures for orchestrator integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use rollout_control::{DeploymentOrchestrator, DeploymentOrchestratorBuilder};
use rollout_deployment::catalog::InMemoryFunctionCatalog;
use rollout_deployment::hooks::{AlarmEvaluator, AlarmState, QuietAlarmEvaluator};
use rollout_deployment::routing::InMemoryTrafficRouter;
use rollout_deployment::CollaboratorError;
use rollout_types::*;
use std::sync::Arc;

pub struct Fixture {
    pub orchestrator: Arc<DeploymentOrchestrator>,
    pub catalog: Arc<InMemoryFunctionCatalog>,
    pub router: Arc<InMemoryTrafficRouter>,
    pub function: FunctionDescriptor,
    pub env: DeploymentEnvironment,
}

/// Alarm evaluator that reports every configured alarm as breached
pub struct AlwaysBreached;

#[async_trait]
impl AlarmEvaluator for AlwaysBreached {
    async fn evaluate(
        &self,
        _deployment_id: &DeploymentId,
        alarms: &AlarmConfiguration,
    ) -> Result<AlarmState, CollaboratorError> {
        Ok(AlarmState::Alarm {
            breached: alarms.alarms.clone(),
        })
    }
}

pub fn environment(name: &str) -> DeploymentEnvironment {
    DeploymentEnvironment::new(AccountId::new("acme"), name, format!("{} fleet", name))
        .with_network(Network {
            vpc_id: "vpc-1".into(),
            subnet_ids: vec!["subnet-a".into()],
            security_group_ids: vec!["sg-1".into()],
            load_balancer: Some(LoadBalancer {
                lb_type: "application".into(),
                target_group_arn: "arn:tg".into(),
                listener_arn: "arn:listener".into(),
                health_check: Some(HealthCheckConfig::default()),
            }),
        })
        .with_scaling(Scaling {
            min_instances: 1,
            max_instances: 4,
            desired_instances: 2,
            ..Default::default()
        })
        .with_security(Security {
            iam_role_arn: "arn:role".into(),
            kms_key_arn: "arn:kms".into(),
        })
}

pub async fn fixture() -> Fixture {
    fixture_with_alarms(Arc::new(QuietAlarmEvaluator)).await
}

pub async fn fixture_with_alarms(alarms: Arc<dyn AlarmEvaluator>) -> Fixture {
    let catalog = Arc::new(InMemoryFunctionCatalog::new());
    let router = Arc::new(InMemoryTrafficRouter::new());
    let function =
        FunctionDescriptor::new(FunctionId::new("resize"), AccountId::new("acme"), "nodejs18.x");
    catalog.insert(function.clone());

    let orchestrator = DeploymentOrchestratorBuilder::new()
        .with_function_lookup(catalog.clone())
        .with_traffic_controller(router.clone())
        .with_alarm_evaluator(alarms)
        .build()
        .unwrap();
    let env = orchestrator
        .create_environment(environment("prod"))
        .await
        .unwrap();

    Fixture {
        orchestrator: Arc::new(orchestrator),
        catalog,
        router,
        function,
        env,
    }
}

impl Fixture {
    /// Deploy the function to the fixture environment and expect success
    pub async fn deploy(&self, config: DeploymentConfiguration) -> (DeploymentId, VersionId) {
        let report = self
            .orchestrator
            .deploy_function(&self.function.id, &self.env.id, config)
            .await
            .unwrap();
        assert_eq!(report.status(), DeploymentStatus::Deployed, "{:?}", report.outcome);
        (report.deployment.id, report.version_id)
    }
}
