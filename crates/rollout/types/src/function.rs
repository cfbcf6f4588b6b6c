//! Function descriptors as returned by the function catalog

use crate::ids::{AccountId, FunctionId};
use serde::{Deserialize, Serialize};

/// A declared package dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Read-only view of a function, owned by another service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub id: FunctionId,
    pub account_id: AccountId,
    pub name: String,
    pub runtime: String,
    pub memory_mb: u32,
    pub cpu: f64,
    pub timeout_seconds: u32,
    pub entry_point: String,
    pub handler: String,
    pub source_url: String,
    pub source_hash: String,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl FunctionDescriptor {
    /// Minimal descriptor for the given runtime, mostly useful in tests
    pub fn new(id: FunctionId, account_id: AccountId, runtime: impl Into<String>) -> Self {
        let name = id.as_str().to_string();
        Self {
            source_url: format!("s3://functions/{}.zip", name),
            source_hash: String::new(),
            id,
            account_id,
            name,
            runtime: runtime.into(),
            memory_mb: 128,
            cpu: 0.25,
            timeout_seconds: 30,
            entry_point: "index.js".to_string(),
            handler: "handler".to_string(),
            dependencies: Vec::new(),
        }
    }
}
