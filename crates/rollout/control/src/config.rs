//! Configuration for the orchestrator

use rollout_types::{StrategyType, DEFAULT_TIMEOUT_SECONDS};
use serde::{Deserialize, Serialize};

/// Main orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ControlConfig {
    /// Rollout defaults and policy switches
    #[serde(default)]
    pub rollout: RolloutSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rollout defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutSettings {
    /// Deadline applied to configurations the orchestrator synthesizes
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: i64,

    /// Master switch for automatic rollback
    #[serde(default = "default_true")]
    pub auto_rollback_enabled: bool,

    /// Strategy used when a deployment is created without a configuration
    #[serde(default)]
    pub default_strategy: StrategyType,
}

impl Default for RolloutSettings {
    fn default() -> Self {
        Self {
            default_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            auto_rollback_enabled: true,
            default_strategy: StrategyType::AllAtOnce,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,

    /// Include timestamps
    #[serde(default = "default_true")]
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            timestamps: true,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> i64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ControlConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// Environment variables use the `ROLLOUT_` prefix and `__` between
    /// nested keys, e.g. `ROLLOUT_ROLLOUT__AUTO_ROLLBACK_ENABLED=false`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&ControlConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with ROLLOUT_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("ROLLOUT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ControlConfig::default();
        assert_eq!(config.rollout.default_timeout_seconds, 900);
        assert!(config.rollout.auto_rollback_enabled);
        assert_eq!(config.rollout.default_strategy, StrategyType::AllAtOnce);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.timestamps);
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("rollout-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("control.json");
        std::fs::write(
            &path,
            r#"{ "rollout": { "default_strategy": "canary", "auto_rollback_enabled": false },
                 "logging": { "json": true } }"#,
        )
        .unwrap();

        let config = ControlConfig::load(path.to_str()).unwrap();
        assert_eq!(config.rollout.default_strategy, StrategyType::Canary);
        assert!(!config.rollout.auto_rollback_enabled);
        assert_eq!(config.rollout.default_timeout_seconds, 900);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ControlConfig::load(Some("/nonexistent/rollout-control")).unwrap();
        assert_eq!(config.rollout.default_timeout_seconds, 900);
    }
}
