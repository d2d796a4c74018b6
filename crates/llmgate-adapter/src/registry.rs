use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::Adapter;

/// Process-wide `api_type` → adapter mapping.
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn Adapter>>>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("no adapter registered for api_type '{0}'")]
    UnknownAdapter(String),
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// Idempotent: re-registering an `api_type` replaces the prior adapter.
    pub fn register(&self, adapter: Arc<dyn Adapter>) {
        let api_type = adapter.api_type().to_string();
        self.adapters.write().unwrap().insert(api_type, adapter);
    }

    pub fn get(&self, api_type: &str) -> Result<Arc<dyn Adapter>, RegistryError> {
        self.adapters
            .read()
            .unwrap()
            .get(api_type)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownAdapter(api_type.to_string()))
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
