//! Function lookup

use crate::error::CollaboratorError;
use async_trait::async_trait;
use dashmap::DashMap;
use rollout_types::{FunctionDescriptor, FunctionId};

/// Read-only access to the function catalog
#[async_trait]
pub trait FunctionLookup: Send + Sync {
    async fn get_function(
        &self,
        id: &FunctionId,
    ) -> Result<Option<FunctionDescriptor>, CollaboratorError>;
}

/// In-memory catalog for development
pub struct InMemoryFunctionCatalog {
    functions: DashMap<FunctionId, FunctionDescriptor>,
}

impl InMemoryFunctionCatalog {
    pub fn new() -> Self {
        Self {
            functions: DashMap::new(),
        }
    }

    /// Register or replace a function
    pub fn insert(&self, function: FunctionDescriptor) {
        self.functions.insert(function.id.clone(), function);
    }

    pub fn remove(&self, id: &FunctionId) -> Option<FunctionDescriptor> {
        self.functions.remove(id).map(|(_, f)| f)
    }
}

impl Default for InMemoryFunctionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FunctionLookup for InMemoryFunctionCatalog {
    async fn get_function(
        &self,
        id: &FunctionId,
    ) -> Result<Option<FunctionDescriptor>, CollaboratorError> {
        Ok(self.functions.get(id).map(|f| f.clone()))
    }
}
