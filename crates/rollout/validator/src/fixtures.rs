use rollout_types::{
    AccountId, Deployment, DeploymentConfiguration, DeploymentEnvironment, DeploymentId,
    DeploymentVersion, EnvironmentStatus, FunctionDescriptor, FunctionId, HealthCheckConfig,
    LoadBalancer, Network, Scaling, Security,
};

pub fn valid_environment() -> DeploymentEnvironment {
    DeploymentEnvironment::new(AccountId::new("acme"), "prod", "production fleet")
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

pub fn active_environment() -> DeploymentEnvironment {
    let mut env = valid_environment();
    env.status = EnvironmentStatus::Active;
    env
}

pub fn function() -> FunctionDescriptor {
    FunctionDescriptor::new(FunctionId::new("resize"), AccountId::new("acme"), "nodejs18.x")
}

pub fn version() -> DeploymentVersion {
    DeploymentVersion::snapshot(DeploymentId::generate(), &function(), 42)
}

pub fn deployment(configuration: DeploymentConfiguration) -> Deployment {
    Deployment::new(
        AccountId::new("acme"),
        FunctionId::new("resize"),
        active_environment().id,
        "resize-prod",
        configuration,
    )
}
