//! Rollout Validator
//!
//! Pure rule engine over immutable inputs. Every entry point returns an
//! itemized [`ValidationResult`]; nothing here touches storage.
//!
//! ```
//! use rollout_types::{AccountId, DeploymentEnvironment, Scaling};
//! use rollout_validator::Validator;
//!
//! let env = DeploymentEnvironment::new(AccountId::new("acme"), "prod", "production")
//!     .with_scaling(Scaling {
//!         min_instances: 1,
//!         max_instances: 1,
//!         desired_instances: 2,
//!         ..Default::default()
//!     });
//!
//! let result = Validator::new().validate_environment(&env);
//! assert!(!result.passed);
//! assert!(result.find("scaling.desired_instances").is_some());
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

mod compatibility;
mod configuration;
mod deployment;
mod environment;
mod version;

#[cfg(test)]
mod fixtures;

pub use rollout_types::{Severity, ValidationCheck, ValidationResult};

/// Stateless validation rules
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn non_empty(value: &str) -> bool {
    !value.trim().is_empty()
}
