//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check plugin entries for names and rule sets
//! - Validate value ranges (connection limits, addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AgentConfig → Result<(), Vec<ValidationError>>
//! - Rule literals are parsed later by the rule engine, which owns their grammar

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AgentConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no plugins are defined")]
    NoPlugins,

    #[error("plugin entry #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("plugin name '{0}' is defined more than once")]
    DuplicateName(String),

    #[error("plugin '{0}': both threshold and pattern rules are not defined")]
    NoRules(String),

    #[error("plugin '{0}' does not name a data source")]
    MissingDataSource(String),

    #[error("max_connections must be greater than zero")]
    ZeroConnections,

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.plugins.is_empty() {
        errors.push(ValidationError::NoPlugins);
    }

    let mut seen = HashSet::new();
    for (index, entry) in config.plugins.iter().enumerate() {
        if entry.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName { index });
            continue;
        }
        if !seen.insert(entry.name.as_str()) {
            errors.push(ValidationError::DuplicateName(entry.name.clone()));
        }
        if entry.plugin.trim().is_empty() {
            errors.push(ValidationError::MissingDataSource(entry.name.clone()));
        }
        if entry.thresholds.is_empty() && entry.patterns.is_empty() {
            errors.push(ValidationError::NoRules(entry.name.clone()));
        }
    }

    if config.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
