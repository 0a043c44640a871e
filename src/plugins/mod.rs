//! Data-source plugins.
//!
//! # Data Flow
//! ```text
//! PluginEntry { plugin = "file", params = {...} }
//!     → registry.rs (name → constructor)
//!     → Arc<dyn DataSource>
//!     → agent::Scheduler calls run() per sampling cycle
//! ```
//!
//! # Design Decisions
//! - Plugins are compiled in and registered explicitly, no discovery at runtime
//! - Each plugin validates its own parameters at construction
//! - A failed run is an error, never an empty result

pub mod file;
pub mod http;
pub mod registry;
pub mod static_value;

use std::fmt;
use std::path::PathBuf;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use registry::{PluginRegistry, RegistryError};

/// Errors produced by data sources, both at construction and per run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid parameters: {0}")]
    Params(#[from] toml::de::Error),

    #[error("invalid url '{url}': {reason}")]
    Url { url: String, reason: String },

    #[error("could not read {path}: {error}")]
    Read { path: PathBuf, error: std::io::Error },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("json parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Something that can be sampled for a value.
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Registered plugin name.
    fn kind(&self) -> &'static str;

    /// Human readable target, e.g. the file path or url.
    fn target(&self) -> String;

    /// Produce one sample. May suspend on I/O.
    fn run(&self) -> BoxFuture<'_, Result<Value, SourceError>>;
}

/// Deserialize plugin parameters from the entry's `params` table.
pub(crate) fn parse_params<T: DeserializeOwned>(params: &toml::Table) -> Result<T, SourceError> {
    Ok(toml::Value::Table(params.clone()).try_into()?)
}

/// Interpret raw text either verbatim or as a JSON document.
pub(crate) fn decode(text: String, is_json: bool) -> Result<Value, SourceError> {
    if is_json {
        Ok(serde_json::from_str(&text)?)
    } else {
        Ok(Value::String(text))
    }
}
