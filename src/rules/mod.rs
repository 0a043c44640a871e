//! Rule evaluation subsystem.
//!
//! # Data Flow
//! ```text
//! data-source result (serde_json::Value)
//!     → bound as `r` in an eval::Context
//!     → patterns_metric   → rendered text  → patterns.rs   → pattern action
//!     → thresholds_metric → float          → thresholds.rs → action or "<n>%"
//!     → joined with a space ("ready 50%")
//! ```
//!
//! # Design Decisions
//! - Everything that can be checked is checked at construction
//! - Evaluation is pure: same input and rules give the same token
//! - No match at all is distinct from a matched empty token

pub mod eval;
pub mod expr;
pub mod patterns;
pub mod thresholds;

use serde_json::Value;
use thiserror::Error;

use crate::config::PluginEntry;
use crate::rules::eval::{Context, EvalError};
use crate::rules::expr::{Expr, ExprError};
use crate::rules::patterns::PatternRules;
use crate::rules::thresholds::ThresholdRules;

/// Errors raised while building rules from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("both threshold and pattern rules are not defined")]
    NoRules,

    #[error("rule has no action")]
    EmptyRule,

    #[error("rule defines more than one action: {0}")]
    MultipleActions(String),

    #[error("invalid pattern for '{action}': {reason}")]
    InvalidPattern { action: String, reason: String },

    #[error("invalid threshold for '{action}': '{literal}' is not an integer")]
    InvalidThreshold { action: String, literal: String },

    #[error("percentage threshold must not be zero")]
    ZeroPercentageThreshold,

    #[error("only one percentage rule is allowed")]
    DuplicatePercentage,

    #[error("invalid metric expression '{source_text}': {error}")]
    InvalidMetric { source_text: String, error: ExprError },
}

/// A metric expression and the text it was parsed from.
#[derive(Debug, Clone)]
pub struct Metric {
    source: String,
    expr: Expr,
}

impl Metric {
    pub fn parse(source: &str) -> Result<Self, RuleError> {
        let expr = Expr::parse(source).map_err(|error| RuleError::InvalidMetric {
            source_text: source.to_string(),
            error,
        })?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn evaluate(&self, ctx: &Context<'_>) -> Result<Value, EvalError> {
        eval::evaluate(&self.expr, ctx)
    }
}

/// Turns a data-source result into a response token.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    patterns: Option<(Metric, PatternRules)>,
    thresholds: Option<(Metric, ThresholdRules)>,
}

impl RuleEngine {
    /// Build the engine from a plugin entry.
    pub fn from_entry(entry: &PluginEntry) -> Result<Self, RuleError> {
        let patterns = if entry.patterns.is_empty() {
            None
        } else {
            Some((
                Metric::parse(&entry.patterns_metric)?,
                PatternRules::from_entries(&entry.patterns)?,
            ))
        };

        let thresholds = if entry.thresholds.is_empty() {
            None
        } else {
            Some((
                Metric::parse(&entry.thresholds_metric)?,
                ThresholdRules::from_entries(&entry.thresholds)?,
            ))
        };

        if patterns.is_none() && thresholds.is_none() {
            return Err(RuleError::NoRules);
        }

        Ok(Self {
            patterns,
            thresholds,
        })
    }

    /// Evaluate the rules against a result.
    ///
    /// Returns `Ok(None)` when no rule matched so the caller can fall back to
    /// its default response.
    pub fn evaluate(&self, result: &Value) -> Result<Option<String>, EvalError> {
        let ctx = Context::new(result);

        let pattern_result = match &self.patterns {
            Some((metric, rules)) => {
                let value = metric.evaluate(&ctx)?;
                let text = eval::render(&value);
                let action = rules.process(&text).map(str::to_string);
                tracing::trace!(metric = %metric.source(), value = %text, action = ?action, "Pattern rules evaluated");
                action
            }
            None => None,
        };

        let threshold_result = match &self.thresholds {
            Some((metric, rules)) => {
                let value = eval::to_number(&metric.evaluate(&ctx)?)?;
                let action = rules.process(value);
                tracing::trace!(metric = %metric.source(), value, action = ?action, "Threshold rules evaluated");
                action
            }
            None => None,
        };

        Ok(compose(pattern_result, threshold_result))
    }
}

fn compose(pattern: Option<String>, threshold: Option<String>) -> Option<String> {
    match (pattern, threshold) {
        (None, None) => None,
        (Some(p), None) => Some(p),
        (None, Some(t)) => Some(t),
        // An empty percentage token adds nothing to the pattern action.
        (Some(p), Some(t)) if t.is_empty() => Some(p),
        (Some(p), Some(t)) => Some(format!("{} {}", p, t)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleEntry;
    use serde_json::json;

    fn entry() -> PluginEntry {
        PluginEntry::new("test", "static")
    }

    #[test]
    fn thresholds_only() {
        let mut e = entry();
        e.thresholds = vec![RuleEntry::new("up", "<7000"), RuleEntry::new("drain", ">7000")];
        let engine = RuleEngine::from_entry(&e).unwrap();

        assert_eq!(engine.evaluate(&json!(5000)).unwrap().as_deref(), Some("up"));
        assert_eq!(engine.evaluate(&json!(8000)).unwrap().as_deref(), Some("drain"));
        assert_eq!(engine.evaluate(&json!("5000\n")).unwrap().as_deref(), Some("up"));
        assert_eq!(engine.evaluate(&json!(7000)).unwrap(), None);
    }

    #[test]
    fn patterns_only() {
        let mut e = entry();
        e.patterns = vec![RuleEntry::new("ready", ".*healthy.*")];
        let engine = RuleEngine::from_entry(&e).unwrap();

        assert_eq!(engine.evaluate(&json!("system healthy")).unwrap().as_deref(), Some("ready"));
        assert_eq!(engine.evaluate(&json!("system degraded")).unwrap(), None);
    }

    #[test]
    fn both_rule_sets_join_with_space() {
        let mut e = entry();
        e.patterns = vec![RuleEntry::new("ready", "ok")];
        e.patterns_metric = "r.status".into();
        e.thresholds = vec![RuleEntry::new("pct", 7000)];
        e.thresholds_metric = "r['msg-rate']".into();
        let engine = RuleEngine::from_entry(&e).unwrap();

        let result = json!({"status": "ok", "msg-rate": 3500});
        assert_eq!(engine.evaluate(&result).unwrap().as_deref(), Some("ready 50%"));

        let result = json!({"status": "bad", "msg-rate": 3500});
        assert_eq!(engine.evaluate(&result).unwrap().as_deref(), Some("50%"));

        let result = json!({"status": "ok", "msg-rate": -700});
        assert_eq!(engine.evaluate(&result).unwrap().as_deref(), Some("ready"));
    }

    #[test]
    fn empty_percentage_is_a_match() {
        let mut e = entry();
        e.thresholds = vec![RuleEntry::new("pct", 7000)];
        let engine = RuleEngine::from_entry(&e).unwrap();
        assert_eq!(engine.evaluate(&json!(-700)).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn evaluation_is_repeatable() {
        let mut e = entry();
        e.thresholds = vec![RuleEntry::new("pct", 1000)];
        let engine = RuleEngine::from_entry(&e).unwrap();
        let first = engine.evaluate(&json!(250)).unwrap();
        for _ in 0..10 {
            assert_eq!(engine.evaluate(&json!(250)).unwrap(), first);
        }
    }

    #[test]
    fn non_numeric_threshold_metric_is_a_type_error() {
        let mut e = entry();
        e.thresholds = vec![RuleEntry::new("up", "<10")];
        let engine = RuleEngine::from_entry(&e).unwrap();
        assert!(matches!(
            engine.evaluate(&json!("busy")),
            Err(EvalError::NotNumeric(_))
        ));
    }

    #[test]
    fn metric_errors_surface_to_caller() {
        let mut e = entry();
        e.patterns = vec![RuleEntry::new("up", ".*")];
        e.patterns_metric = "r['missing']".into();
        let engine = RuleEngine::from_entry(&e).unwrap();
        assert_eq!(
            engine.evaluate(&json!({})),
            Err(EvalError::MissingKey("missing".into()))
        );
    }

    #[test]
    fn construction_errors() {
        assert_eq!(RuleEngine::from_entry(&entry()).unwrap_err(), RuleError::NoRules);

        let mut e = entry();
        e.thresholds = vec![RuleEntry::new("up", "<seven")];
        assert!(matches!(
            RuleEngine::from_entry(&e).unwrap_err(),
            RuleError::InvalidThreshold { .. }
        ));

        let mut e = entry();
        e.patterns = vec![RuleEntry::new("up", ".*")];
        e.patterns_metric = "r[".into();
        assert!(matches!(
            RuleEngine::from_entry(&e).unwrap_err(),
            RuleError::InvalidMetric { .. }
        ));
    }
}
