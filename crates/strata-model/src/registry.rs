//! The model registry.

use crate::schema::ModelDef;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Thread-safe map from class name to registered model definition.
///
/// Registration replaces an existing definition for the same class name.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<ModelDef>>>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model definition, returning the shared handle.
    pub fn register(&self, def: ModelDef) -> Arc<ModelDef> {
        let def = Arc::new(def);
        self.models
            .write()
            .insert(def.name().to_string(), Arc::clone(&def));
        def
    }

    /// Look up a definition by class name.
    pub fn get(&self, name: &str) -> Option<Arc<ModelDef>> {
        self.models.read().get(name).cloned()
    }

    /// Check whether a class name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.models.read().contains_key(name)
    }

    /// List registered class names.
    pub fn names(&self) -> Vec<String> {
        self.models.read().keys().cloned().collect()
    }
}
