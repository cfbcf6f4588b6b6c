use crate::{non_empty, Validator};
use rollout_types::{
    DeploymentEnvironment, LoadBalancer, Network, Scaling, Security, Severity, ValidationResult,
};
use tracing::debug;

impl Validator {
    /// Validate an environment's identity, network, scaling and security
    pub fn validate_environment(&self, env: &DeploymentEnvironment) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.check(
            "name",
            non_empty(&env.name),
            Severity::Error,
            "environment name is required",
        );
        result.check(
            "description",
            non_empty(&env.description),
            Severity::Error,
            "environment description is required",
        );

        match &env.network {
            Some(network) => check_network(&mut result, network),
            None => result.check("network", false, Severity::Error, "network is required"),
        }

        match &env.scaling {
            Some(scaling) => check_scaling(&mut result, scaling),
            None => result.check("scaling", false, Severity::Error, "scaling is required"),
        }

        match &env.security {
            Some(security) => check_security(&mut result, security),
            None => result.check("security", false, Severity::Error, "security is required"),
        }

        for key in env.variables.keys() {
            if !non_empty(key) {
                result.check(
                    "variables",
                    false,
                    Severity::Error,
                    "environment variable names must not be empty",
                );
            }
        }

        for (i, secret) in env.secrets.iter().enumerate() {
            result.check(
                &format!("secrets[{}]", i),
                non_empty(&secret.name) && non_empty(&secret.reference),
                Severity::Error,
                "secret requires both a name and a reference",
            );
        }

        debug!(
            environment_id = %env.id,
            passed = result.passed,
            checks = result.checks.len(),
            "Environment validated"
        );
        result
    }
}

fn check_network(result: &mut ValidationResult, network: &Network) {
    result.check(
        "network.vpc_id",
        non_empty(&network.vpc_id),
        Severity::Error,
        "VPC id is required",
    );
    result.check(
        "network.subnet_ids",
        !network.subnet_ids.is_empty(),
        Severity::Error,
        "at least one subnet is required",
    );
    result.check(
        "network.security_group_ids",
        !network.security_group_ids.is_empty(),
        Severity::Error,
        "at least one security group is required",
    );

    match &network.load_balancer {
        Some(lb) => check_load_balancer(result, lb),
        None => result.check(
            "network.load_balancer",
            false,
            Severity::Error,
            "load balancer is required",
        ),
    }
}

fn check_load_balancer(result: &mut ValidationResult, lb: &LoadBalancer) {
    result.check(
        "load_balancer.type",
        non_empty(&lb.lb_type),
        Severity::Error,
        "load balancer type is required",
    );
    result.check(
        "load_balancer.target_group_arn",
        non_empty(&lb.target_group_arn),
        Severity::Error,
        "target group ARN is required",
    );
    result.check(
        "load_balancer.listener_arn",
        non_empty(&lb.listener_arn),
        Severity::Error,
        "listener ARN is required",
    );

    let Some(hc) = &lb.health_check else {
        result.check(
            "load_balancer.health_check",
            false,
            Severity::Error,
            "health check is required",
        );
        return;
    };

    result.check(
        "health_check.path",
        non_empty(&hc.path),
        Severity::Error,
        "health check path is required",
    );
    result.check(
        "health_check.protocol",
        non_empty(&hc.protocol),
        Severity::Error,
        "health check protocol is required",
    );
    for (name, value) in [
        ("health_check.interval_seconds", hc.interval_seconds),
        ("health_check.timeout_seconds", hc.timeout_seconds),
        ("health_check.healthy_threshold", hc.healthy_threshold),
        ("health_check.unhealthy_threshold", hc.unhealthy_threshold),
    ] {
        result.check(
            name,
            value > 0,
            Severity::Error,
            format!("must be positive, got {}", value),
        );
    }
}

fn check_scaling(result: &mut ValidationResult, scaling: &Scaling) {
    result.check(
        "scaling.min_instances",
        scaling.min_instances >= 1,
        Severity::Error,
        format!("min instances must be at least 1, got {}", scaling.min_instances),
    );
    result.check(
        "scaling.max_instances",
        scaling.max_instances >= scaling.min_instances,
        Severity::Error,
        format!(
            "max instances {} is below min instances {}",
            scaling.max_instances, scaling.min_instances
        ),
    );
    result.check(
        "scaling.desired_instances",
        scaling.desired_instances >= scaling.min_instances
            && scaling.desired_instances <= scaling.max_instances,
        Severity::Error,
        format!(
            "desired instances {} outside [{}, {}]",
            scaling.desired_instances, scaling.min_instances, scaling.max_instances
        ),
    );
    for (name, value) in [
        ("scaling.target_cpu_utilization", scaling.target_cpu_utilization),
        ("scaling.target_memory_utilization", scaling.target_memory_utilization),
    ] {
        result.check(
            name,
            value > 0.0 && value <= 100.0,
            Severity::Error,
            format!("utilization target {} outside (0, 100]", value),
        );
    }
}

fn check_security(result: &mut ValidationResult, security: &Security) {
    result.check(
        "security.iam_role_arn",
        non_empty(&security.iam_role_arn),
        Severity::Error,
        "IAM role ARN is required",
    );
    result.check(
        "security.kms_key_arn",
        non_empty(&security.kms_key_arn),
        Severity::Error,
        "KMS key ARN is required",
    );
}
