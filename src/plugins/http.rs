//! HTTP data source.
//!
//! Issues a GET against the configured url on every run. Non-success status
//! codes, transport errors and timeouts all fail the run.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::plugins::registry::{PluginRegistry, RegistryError};
use crate::plugins::{decode, parse_params, DataSource, SourceError};

pub const NAME: &str = "http";

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
struct HttpParams {
    url: String,
    #[serde(default)]
    is_json: bool,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

/// Samples an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: Url,
    is_json: bool,
    client: reqwest::Client,
}

impl HttpSource {
    /// Create a source for `url`. Only http and https urls are accepted.
    pub fn new(url: &str, is_json: bool, timeout: Duration) -> Result<Self, SourceError> {
        let parsed = Url::parse(url).map_err(|e| SourceError::Url {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SourceError::Url {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("herald/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            url: parsed,
            is_json,
            client,
        })
    }

    fn from_params(params: &toml::Table) -> Result<Arc<dyn DataSource>, SourceError> {
        let params: HttpParams = parse_params(params)?;
        let source = Self::new(
            &params.url,
            params.is_json,
            Duration::from_secs(params.timeout_secs),
        )?;
        Ok(Arc::new(source))
    }
}

impl DataSource for HttpSource {
    fn kind(&self) -> &'static str {
        NAME
    }

    fn target(&self) -> String {
        self.url.to_string()
    }

    fn run(&self) -> BoxFuture<'_, Result<Value, SourceError>> {
        Box::pin(async move {
            let response = self.client.get(self.url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                tracing::warn!(url = %self.url, status = %status, "GET failed");
                return Err(SourceError::Status(status.as_u16()));
            }

            let body = response.text().await?;
            tracing::debug!(url = %self.url, body = %body.trim_end(), "Got response");
            decode(body, self.is_json)
        })
    }
}

/// Add the http plugin to a registry.
pub fn register(registry: &mut PluginRegistry) -> Result<(), RegistryError> {
    registry.register(NAME, HttpSource::from_params)
}
