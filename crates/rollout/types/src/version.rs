//! Deployment versions
//!
//! A version freezes a copy of the function's configuration at creation
//! time. Later edits to the function never reach an existing version.

use crate::function::{Dependency, FunctionDescriptor};
use crate::ids::{DeploymentId, FunctionId, VersionId};
use crate::status::VersionStatus;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Frozen runtime configuration of a version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionConfiguration {
    pub runtime: String,
    pub memory_mb: u32,
    pub cpu: f64,
    pub timeout_seconds: u32,
    pub entry_point: String,
    pub handler: String,
}

impl From<&FunctionDescriptor> for VersionConfiguration {
    fn from(function: &FunctionDescriptor) -> Self {
        Self {
            runtime: function.runtime.clone(),
            memory_mb: function.memory_mb,
            cpu: function.cpu,
            timeout_seconds: function.timeout_seconds,
            entry_point: function.entry_point.clone(),
            handler: function.handler.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Append-only log line attached to a version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl VersionLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

/// A build artifact bound to one deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentVersion {
    pub id: VersionId,
    pub deployment_id: DeploymentId,
    pub function_id: FunctionId,
    pub version_number: u64,
    pub version_label: String,
    pub source_url: String,
    pub source_hash: String,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    pub configuration: VersionConfiguration,
    pub status: VersionStatus,
    #[serde(default)]
    pub logs: Vec<VersionLogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentVersion {
    /// Snapshot a function into a new version
    pub fn snapshot(
        deployment_id: DeploymentId,
        function: &FunctionDescriptor,
        version_number: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: VersionId::generate(),
            deployment_id,
            function_id: function.id.clone(),
            version_number,
            version_label: format!("v{}", version_number),
            source_url: function.source_url.clone(),
            source_hash: function.source_hash.clone(),
            dependencies: function.dependencies.clone(),
            configuration: VersionConfiguration::from(function),
            status: VersionStatus::Created,
            logs: vec![VersionLogEntry::info(format!(
                "version created from {}",
                function.id
            ))],
            created_at: now,
            updated_at: now,
        }
    }
}

/// Seconds since 2020-01-01T00:00:00Z, the version number epoch
pub fn version_epoch_seconds(at: DateTime<Utc>) -> u64 {
    let epoch = Utc
        .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
        .single()
        .map(|e| e.timestamp())
        .unwrap_or(1_577_836_800);
    u64::try_from(at.timestamp() - epoch).unwrap_or(0)
}

/// Next version number for a deployment, strictly greater than `latest`
pub fn next_version_number(latest: Option<u64>, at: DateTime<Utc>) -> u64 {
    let candidate = version_epoch_seconds(at);
    match latest {
        Some(latest) if candidate <= latest => latest + 1,
        _ => candidate.max(1),
    }
}
