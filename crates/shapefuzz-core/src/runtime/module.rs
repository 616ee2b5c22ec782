//! Loading the module under test.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::value::Value;

/// Resolves a module specifier to its exports value.
#[async_trait(?Send)]
pub trait ModuleLoader {
    async fn load(&self, specifier: &str) -> Result<Value>;
}

/// In-process modules registered ahead of time.
///
/// Each load of a specifier returns the same exports object, so module-level state
/// persists across call plans.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Value>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, specifier: impl Into<String>, exports: Value) -> &mut Self {
        self.modules.insert(specifier.into(), exports);
        self
    }

    pub fn contains(&self, specifier: &str) -> bool {
        self.modules.contains_key(specifier)
    }
}

#[async_trait(?Send)]
impl ModuleLoader for ModuleRegistry {
    async fn load(&self, specifier: &str) -> Result<Value> {
        self.modules
            .get(specifier)
            .cloned()
            .ok_or_else(|| anyhow!("Cannot find module '{}'", specifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_returns_same_exports() {
        let mut registry = ModuleRegistry::new();
        registry.register("lib", Value::object([("version".to_string(), Value::Number(1.0))]));

        let a = registry.load("lib").await.unwrap();
        let b = registry.load("lib").await.unwrap();
        assert!(a.same_value(&b));
        assert!(registry.load("missing").await.is_err());
    }
}
