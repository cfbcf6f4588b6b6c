//! Tracing subscriber setup for binaries embedding the orchestrator

use crate::config::LoggingConfig;
use crate::error::{ControlPlaneError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber; `RUST_LOG` overrides the configured level
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else if config.timestamps {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().without_time())
            .try_init()
    };

    installed.map_err(|e| ControlPlaneError::Config(format!("tracing: {}", e)))
}
