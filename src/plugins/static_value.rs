//! Static data source.
//!
//! Always yields the configured `value`. Useful to pin a backend's response
//! from configuration alone.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

use crate::plugins::registry::{PluginRegistry, RegistryError};
use crate::plugins::{parse_params, DataSource, SourceError};

pub const NAME: &str = "static";

#[derive(Debug, Deserialize)]
struct StaticParams {
    value: toml::Value,
}

#[derive(Debug, Clone)]
pub struct StaticSource {
    value: Value,
}

impl StaticSource {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    fn from_params(params: &toml::Table) -> Result<Arc<dyn DataSource>, SourceError> {
        let params: StaticParams = parse_params(params)?;
        let value = serde_json::to_value(&params.value)?;
        Ok(Arc::new(Self::new(value)))
    }
}

impl DataSource for StaticSource {
    fn kind(&self) -> &'static str {
        NAME
    }

    fn target(&self) -> String {
        self.value.to_string()
    }

    fn run(&self) -> BoxFuture<'_, Result<Value, SourceError>> {
        Box::pin(async move { Ok(self.value.clone()) })
    }
}

/// Add the static plugin to a registry.
pub fn register(registry: &mut PluginRegistry) -> Result<(), RegistryError> {
    registry.register(NAME, StaticSource::from_params)
}
