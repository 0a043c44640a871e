//! Plugin registry.
//!
//! Maps registered plugin names to constructor functions. Each plugin module
//! exposes a `register` function that adds itself; duplicates are rejected.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::PluginEntry;
use crate::plugins::{file, http, static_value, DataSource, SourceError};

/// Builds a data source from its parameters.
pub type Constructor = fn(&toml::Table) -> Result<Arc<dyn DataSource>, SourceError>;

/// Errors raised while registering or instantiating plugins.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate plugin name detected: {0}")]
    Duplicate(String),

    #[error("no plugin registered under '{0}'")]
    NotFound(String),

    #[error("could not load plugin '{name}': {error}")]
    Load { name: String, error: SourceError },
}

/// Registered data-source constructors.
#[derive(Default)]
pub struct PluginRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every compiled-in plugin.
    pub fn with_builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        file::register(&mut registry)?;
        http::register(&mut registry)?;
        static_value::register(&mut registry)?;
        tracing::debug!(plugins = ?registry.names(), "Plugins registered");
        Ok(registry)
    }

    /// Register a constructor under `name`.
    pub fn register(&mut self, name: &str, constructor: Constructor) -> Result<(), RegistryError> {
        if self.constructors.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.constructors.insert(name.to_string(), constructor);
        Ok(())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Build the data source described by a plugin entry.
    pub fn instantiate(&self, entry: &PluginEntry) -> Result<Arc<dyn DataSource>, RegistryError> {
        let constructor = self
            .constructors
            .get(&entry.plugin)
            .ok_or_else(|| RegistryError::NotFound(entry.plugin.clone()))?;

        let source = constructor(&entry.params).map_err(|error| RegistryError::Load {
            name: entry.name.clone(),
            error,
        })?;

        tracing::info!(plugin = %entry.name, kind = source.kind(), target = %source.target(), "Plugin loaded");
        Ok(source)
    }
}
