//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the agent.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration for the agent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Listen address, overrides the `--bind` flag when set.
    pub bind: Option<String>,

    /// Listen port, overrides the `--port` flag when set.
    pub port: Option<u16>,

    /// Maximum concurrent agent-check connections (backpressure).
    pub max_connections: usize,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Data-source plugin definitions. One of them is instantiated.
    pub plugins: Vec<PluginEntry>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind: None,
            port: None,
            max_connections: 1024,
            observability: ObservabilityConfig::default(),
            plugins: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Resolve the listen address, preferring values from the file.
    pub fn listen_address(&self, bind: &str, port: u16) -> String {
        let host = self.bind.as_deref().unwrap_or(bind);
        let port = self.port.unwrap_or(port);
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        }
    }
}

/// A single plugin definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginEntry {
    /// Instance name used in logs and metrics.
    pub name: String,

    /// Registered data-source name (`file`, `http`, `static`).
    pub plugin: String,

    /// Marks the entry to instantiate when several are listed.
    #[serde(default)]
    pub default: bool,

    /// Sampling period in seconds. 0 samples inline on every request.
    #[serde(default)]
    pub interval: u64,

    /// Maximum age of the cached response in seconds. 0 disables the check.
    #[serde(default)]
    pub staleness_interval: u64,

    /// Response sent when the cached state is stale ("noop" = empty).
    #[serde(default)]
    pub staleness_response: String,

    /// Seconds to wait for the sampling task on shutdown before aborting it.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: u64,

    /// Response used when no rule matches ("noop" = empty).
    #[serde(default)]
    pub default_response: String,

    /// Ordered threshold rules.
    #[serde(default)]
    pub thresholds: Vec<RuleEntry>,

    /// Expression producing the value fed to threshold rules.
    #[serde(default = "default_metric")]
    pub thresholds_metric: String,

    /// Ordered pattern rules.
    #[serde(default)]
    pub patterns: Vec<RuleEntry>,

    /// Expression producing the value fed to pattern rules.
    #[serde(default = "default_metric")]
    pub patterns_metric: String,

    /// Data-source specific parameters.
    #[serde(default)]
    pub params: toml::Table,
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_metric() -> String {
    "r".to_string()
}

impl PluginEntry {
    /// Create an entry with defaults for everything but the names.
    pub fn new(name: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plugin: plugin.into(),
            default: false,
            interval: 0,
            staleness_interval: 0,
            staleness_response: String::new(),
            stop_timeout: default_stop_timeout(),
            default_response: String::new(),
            thresholds: Vec::new(),
            thresholds_metric: default_metric(),
            patterns: Vec::new(),
            patterns_metric: default_metric(),
            params: toml::Table::new(),
        }
    }
}

/// One rule as written in the config: `{ up = "<7000" }`.
///
/// Percentage rules carry two keys: `{ pct = 7000, min_threshold_response = 5 }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RuleEntry(pub BTreeMap<String, RuleLiteral>);

impl RuleEntry {
    /// Build a single-key rule.
    pub fn new(action: impl Into<String>, literal: impl Into<RuleLiteral>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(action.into(), literal.into());
        Self(map)
    }

    /// Add another key to the rule.
    pub fn with(mut self, key: impl Into<String>, literal: impl Into<RuleLiteral>) -> Self {
        self.0.insert(key.into(), literal.into());
        self
    }
}

/// A rule value. Integers and strings are both accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RuleLiteral {
    Int(i64),
    Text(String),
}

impl fmt::Display for RuleLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleLiteral::Int(i) => write!(f, "{}", i),
            RuleLiteral::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RuleLiteral {
    fn from(i: i64) -> Self {
        RuleLiteral::Int(i)
    }
}

impl From<&str> for RuleLiteral {
    fn from(s: &str) -> Self {
        RuleLiteral::Text(s.to_string())
    }
}

impl From<String> for RuleLiteral {
    fn from(s: String) -> Self {
        RuleLiteral::Text(s)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9555".to_string(),
        }
    }
}
