//! One sampling cycle: run the data source, evaluate rules, store the token.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::agent::settings::PluginSettings;
use crate::agent::state::StateCache;
use crate::observability::metrics::{self, SampleOutcome};
use crate::plugins::{DataSource, SourceError};
use crate::rules::eval::EvalError;
use crate::rules::RuleEngine;

/// Why a cycle did not produce a new state.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("data source failed: {0}")]
    Source(#[from] SourceError),

    #[error("rule evaluation failed: {0}")]
    Rules(#[from] EvalError),
}

impl SampleError {
    fn outcome(&self) -> SampleOutcome {
        match self {
            SampleError::Source(_) => SampleOutcome::SourceError,
            SampleError::Rules(_) => SampleOutcome::RuleError,
        }
    }
}

/// Owns the data source, the rules and the cached state of one plugin.
#[derive(Debug)]
pub struct Sampler {
    name: String,
    source: Arc<dyn DataSource>,
    rules: RuleEngine,
    default_response: String,
    state: StateCache,
}

impl Sampler {
    pub fn new(settings: &PluginSettings, source: Arc<dyn DataSource>, rules: RuleEngine) -> Self {
        Self {
            name: settings.name.clone(),
            source,
            rules,
            default_response: settings.default_response.clone(),
            state: StateCache::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &StateCache {
        &self.state
    }

    /// Run the source and evaluate the rules without touching the state.
    pub async fn sample(&self) -> Result<String, SampleError> {
        let raw = self.source.run().await?;
        match self.rules.evaluate(&raw)? {
            Some(token) => Ok(token),
            None => {
                tracing::debug!(plugin = %self.name, "No rule matched, using default response");
                Ok(self.default_response.clone())
            }
        }
    }

    /// Sample and store the result. On failure the previous state is kept.
    pub async fn cycle(&self) -> Result<(), SampleError> {
        let started = Instant::now();

        match self.sample().await {
            Ok(token) => {
                tracing::debug!(plugin = %self.name, response = %token, "State updated");
                self.state.store(token);
                metrics::record_sample(&self.name, SampleOutcome::Ok, started);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    plugin = %self.name,
                    source = self.source.kind(),
                    target = %self.source.target(),
                    error = %e,
                    "Sampling failed, keeping previous state"
                );
                metrics::record_sample(&self.name, e.outcome(), started);
                Err(e)
            }
        }
    }
}
