//! File data source.
//!
//! Reads the configured file on every run. The contents are returned as a
//! string, or parsed as JSON when `is_json` is set.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

use crate::plugins::registry::{PluginRegistry, RegistryError};
use crate::plugins::{decode, parse_params, DataSource, SourceError};

pub const NAME: &str = "file";

#[derive(Debug, Deserialize)]
struct FileParams {
    file_path: PathBuf,
    #[serde(default)]
    is_json: bool,
}

/// Samples a local file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    is_json: bool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, is_json: bool) -> Self {
        Self {
            path: path.into(),
            is_json,
        }
    }

    fn from_params(params: &toml::Table) -> Result<Arc<dyn DataSource>, SourceError> {
        let params: FileParams = parse_params(params)?;
        Ok(Arc::new(Self::new(params.file_path, params.is_json)))
    }
}

impl DataSource for FileSource {
    fn kind(&self) -> &'static str {
        NAME
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }

    fn run(&self) -> BoxFuture<'_, Result<Value, SourceError>> {
        Box::pin(async move {
            let contents = tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|error| SourceError::Read {
                    path: self.path.clone(),
                    error,
                })?;
            tracing::debug!(path = %self.path.display(), contents = %contents.trim_end(), "Read file");
            decode(contents, self.is_json)
        })
    }
}

/// Add the file plugin to a registry.
pub fn register(registry: &mut PluginRegistry) -> Result<(), RegistryError> {
    registry.register(NAME, FileSource::from_params)
}
