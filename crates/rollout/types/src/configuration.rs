//! Deployment configuration value objects
//!
//! A [`DeploymentConfiguration`] selects a strategy and carries the
//! strategy-specific sub-configuration. The shape rules for each strategy
//! live here so the validator and the strategies agree on them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default overall rollout deadline
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 900;

/// Rollout algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    /// Shift 100% of traffic in one step
    #[default]
    AllAtOnce,
    /// Stand up a parallel target and switch atomically
    BlueGreen,
    /// Shift traffic through increasing percentages
    Canary,
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyType::AllAtOnce => "all_at_once",
            StrategyType::BlueGreen => "blue_green",
            StrategyType::Canary => "canary",
        };
        write!(f, "{}", s)
    }
}

/// When a hook runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookType {
    PreDeployment,
    PostDeployment,
    PreTraffic,
    PostTraffic,
}

/// Reference to an externally executed lifecycle hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDescriptor {
    pub name: String,
    pub hook_type: HookType,
    /// Opaque target understood by the hook invoker (function ARN, URL, ...)
    pub target: String,
}

impl HookDescriptor {
    pub fn new(name: impl Into<String>, hook_type: HookType, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hook_type,
            target: target.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.target.trim().is_empty()
    }
}

/// One step of a canary traffic schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficStep {
    pub traffic_percentage: i32,
    pub interval_in_minutes: i64,
}

impl TrafficStep {
    pub fn new(traffic_percentage: i32, interval_in_minutes: i64) -> Self {
        Self {
            traffic_percentage,
            interval_in_minutes,
        }
    }

    pub fn is_valid(&self) -> bool {
        (0..=100).contains(&self.traffic_percentage) && self.interval_in_minutes >= 0
    }
}

/// How traffic moves toward a new version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrafficRouting {
    #[default]
    AllAtOnce,
    TimeBased {
        canary_percentage: i32,
        canary_interval_minutes: i64,
    },
    Linear {
        linear_percentage: i32,
        linear_interval_minutes: i64,
        #[serde(default)]
        bake_time_minutes: i64,
    },
}

impl TrafficRouting {
    /// Share of traffic the new version should receive under this routing
    pub fn target_percentage(&self) -> i32 {
        match self {
            TrafficRouting::AllAtOnce => 100,
            TrafficRouting::TimeBased {
                canary_percentage, ..
            } => *canary_percentage,
            TrafficRouting::Linear {
                linear_percentage, ..
            } => *linear_percentage,
        }
    }

    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        match self {
            TrafficRouting::AllAtOnce => {}
            TrafficRouting::TimeBased {
                canary_percentage,
                canary_interval_minutes,
            } => {
                if !(0..=100).contains(canary_percentage) {
                    out.push(format!("canary percentage {} outside 0..=100", canary_percentage));
                }
                if *canary_interval_minutes < 0 {
                    out.push("canary interval must not be negative".to_string());
                }
            }
            TrafficRouting::Linear {
                linear_percentage,
                linear_interval_minutes,
                bake_time_minutes,
            } => {
                if !(0..=100).contains(linear_percentage) {
                    out.push(format!("linear percentage {} outside 0..=100", linear_percentage));
                }
                if *linear_interval_minutes < 0 {
                    out.push("linear interval must not be negative".to_string());
                }
                if *bake_time_minutes < 0 {
                    out.push("bake time must not be negative".to_string());
                }
            }
        }
        out
    }
}

/// Blue-green sub-configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueGreenConfiguration {
    /// Minutes the old (blue) target is kept before termination
    pub termination_wait_time_in_minutes: i64,
    #[serde(default)]
    pub deployment_group_name: String,
    #[serde(default)]
    pub traffic_routing: Option<TrafficRouting>,
    #[serde(default)]
    pub pre_traffic_hook: Option<HookDescriptor>,
    #[serde(default)]
    pub post_traffic_hook: Option<HookDescriptor>,
}

impl Default for BlueGreenConfiguration {
    fn default() -> Self {
        Self {
            termination_wait_time_in_minutes: 5,
            deployment_group_name: String::new(),
            traffic_routing: None,
            pre_traffic_hook: None,
            post_traffic_hook: None,
        }
    }
}

impl BlueGreenConfiguration {
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.termination_wait_time_in_minutes < 0 {
            out.push(format!(
                "termination wait time {} must not be negative",
                self.termination_wait_time_in_minutes
            ));
        }
        if let Some(routing) = &self.traffic_routing {
            out.extend(routing.violations());
        }
        out
    }
}

/// Alarm monitoring applied at each canary step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AlarmConfiguration {
    pub enabled: bool,
    #[serde(default)]
    pub alarms: Vec<String>,
    /// Treat an evaluator error as a pass rather than a breach
    #[serde(default)]
    pub ignore_poll_alarm_failure: bool,
}

/// Canary sub-configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryConfiguration {
    pub canary_percentage: i32,
    pub canary_interval_minutes: i64,
    /// Explicit schedule; when empty one is synthesized from the fields above
    #[serde(default)]
    pub steps: Vec<TrafficStep>,
    #[serde(default)]
    pub alarms: AlarmConfiguration,
    #[serde(default)]
    pub pre_traffic_hook: Option<HookDescriptor>,
    #[serde(default)]
    pub post_traffic_hook: Option<HookDescriptor>,
}

impl Default for CanaryConfiguration {
    fn default() -> Self {
        Self {
            canary_percentage: 10,
            canary_interval_minutes: 5,
            steps: Vec::new(),
            alarms: AlarmConfiguration::default(),
            pre_traffic_hook: None,
            post_traffic_hook: None,
        }
    }
}

impl CanaryConfiguration {
    pub fn with_steps(steps: Vec<TrafficStep>) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    /// The schedule the canary strategy walks
    pub fn effective_steps(&self) -> Vec<TrafficStep> {
        if self.steps.is_empty() {
            vec![
                TrafficStep::new(self.canary_percentage, self.canary_interval_minutes),
                TrafficStep::new(100, 0),
            ]
        } else {
            self.steps.clone()
        }
    }

    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !(0..=100).contains(&self.canary_percentage) {
            out.push(format!(
                "canary percentage {} outside 0..=100",
                self.canary_percentage
            ));
        }
        if self.canary_interval_minutes < 0 {
            out.push("canary interval must not be negative".to_string());
        }
        for (i, step) in self.steps.iter().enumerate() {
            if !step.is_valid() {
                out.push(format!(
                    "step {} ({}% @ {}m) is out of range",
                    i, step.traffic_percentage, step.interval_in_minutes
                ));
            }
        }
        if let Some(last) = self.steps.last() {
            if last.traffic_percentage != 100 {
                out.push(format!(
                    "final step must reach 100% traffic, got {}%",
                    last.traffic_percentage
                ));
            }
        }
        out
    }
}

/// Events that can trigger an automatic rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackEvent {
    DeploymentFailure,
    DeploymentStop,
    AlarmThreshold,
}

impl fmt::Display for RollbackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RollbackEvent::DeploymentFailure => "deployment_failure",
            RollbackEvent::DeploymentStop => "deployment_stop",
            RollbackEvent::AlarmThreshold => "alarm_threshold",
        };
        write!(f, "{}", s)
    }
}

/// Automatic rollback policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RollbackConfiguration {
    pub enabled: bool,
    #[serde(default)]
    pub events: Vec<RollbackEvent>,
}

impl RollbackConfiguration {
    pub fn on(events: impl IntoIterator<Item = RollbackEvent>) -> Self {
        Self {
            enabled: true,
            events: events.into_iter().collect(),
        }
    }

    pub fn triggers_on(&self, event: RollbackEvent) -> bool {
        self.enabled && self.events.contains(&event)
    }
}

/// Instance-count override applied by `scale_deployment`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingConfiguration {
    pub min_instances: i32,
    pub max_instances: i32,
    pub desired_instances: i32,
}

impl ScalingConfiguration {
    pub fn new(min_instances: i32, max_instances: i32, desired_instances: i32) -> Self {
        Self {
            min_instances,
            max_instances,
            desired_instances,
        }
    }

    /// `0 <= min <= desired <= max` and `max > 0`
    pub fn is_consistent(&self) -> bool {
        self.min_instances >= 0
            && self.max_instances > 0
            && self.min_instances <= self.desired_instances
            && self.desired_instances <= self.max_instances
    }
}

/// Configuration attached to a deployment or passed to a single rollout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfiguration {
    pub strategy: StrategyType,
    #[serde(default)]
    pub blue_green: Option<BlueGreenConfiguration>,
    #[serde(default)]
    pub canary: Option<CanaryConfiguration>,
    #[serde(default)]
    pub traffic_routing: TrafficRouting,
    #[serde(default)]
    pub rollback: RollbackConfiguration,
    #[serde(default)]
    pub pre_deployment_hooks: Vec<HookDescriptor>,
    #[serde(default)]
    pub post_deployment_hooks: Vec<HookDescriptor>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: i64,
    #[serde(default)]
    pub auto_rollback: bool,
    #[serde(default)]
    pub scaling: Option<ScalingConfiguration>,
}

fn default_timeout_seconds() -> i64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for DeploymentConfiguration {
    fn default() -> Self {
        Self::all_at_once()
    }
}

impl DeploymentConfiguration {
    pub fn all_at_once() -> Self {
        Self {
            strategy: StrategyType::AllAtOnce,
            blue_green: None,
            canary: None,
            traffic_routing: TrafficRouting::AllAtOnce,
            rollback: RollbackConfiguration::default(),
            pre_deployment_hooks: Vec::new(),
            post_deployment_hooks: Vec::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            auto_rollback: false,
            scaling: None,
        }
    }

    pub fn blue_green(config: BlueGreenConfiguration) -> Self {
        Self {
            strategy: StrategyType::BlueGreen,
            blue_green: Some(config),
            ..Self::all_at_once()
        }
    }

    pub fn canary(config: CanaryConfiguration) -> Self {
        let routing = TrafficRouting::TimeBased {
            canary_percentage: config.canary_percentage,
            canary_interval_minutes: config.canary_interval_minutes,
        };
        Self {
            strategy: StrategyType::Canary,
            canary: Some(config),
            traffic_routing: routing,
            ..Self::all_at_once()
        }
    }

    pub fn with_rollback(mut self, rollback: RollbackConfiguration) -> Self {
        self.rollback = rollback;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: i64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_auto_rollback(mut self, auto_rollback: bool) -> Self {
        self.auto_rollback = auto_rollback;
        self
    }

    pub fn with_hooks(mut self, pre: Vec<HookDescriptor>, post: Vec<HookDescriptor>) -> Self {
        self.pre_deployment_hooks = pre;
        self.post_deployment_hooks = post;
        self
    }

    /// Shape rules of the selected strategy
    pub fn strategy_violations(&self) -> Vec<String> {
        match self.strategy {
            StrategyType::AllAtOnce => Vec::new(),
            StrategyType::BlueGreen => match &self.blue_green {
                Some(bg) => bg.violations(),
                None => vec!["blue-green strategy requires a blue_green section".to_string()],
            },
            StrategyType::Canary => match &self.canary {
                Some(canary) => canary.violations(),
                None => vec!["canary strategy requires a canary section".to_string()],
            },
        }
    }

    /// All hooks a rollout of this configuration may invoke
    pub fn hooks(&self) -> impl Iterator<Item = &HookDescriptor> {
        let strategy_hooks = match self.strategy {
            StrategyType::AllAtOnce => [None, None],
            StrategyType::BlueGreen => self
                .blue_green
                .as_ref()
                .map(|bg| [bg.pre_traffic_hook.as_ref(), bg.post_traffic_hook.as_ref()])
                .unwrap_or([None, None]),
            StrategyType::Canary => self
                .canary
                .as_ref()
                .map(|c| [c.pre_traffic_hook.as_ref(), c.post_traffic_hook.as_ref()])
                .unwrap_or([None, None]),
        };
        self.pre_deployment_hooks
            .iter()
            .chain(self.post_deployment_hooks.iter())
            .chain(strategy_hooks.into_iter().flatten())
    }
}
