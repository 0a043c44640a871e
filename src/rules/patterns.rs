//! Pattern rules.
//!
//! Each rule pairs an action with a regular expression. The metric is
//! rendered as text and matched from its start; the first matching rule wins.
//! A single trailing newline does not stop `$` from matching, so `up$`
//! accepts the raw `"up\n"` a file source returns.

use regex::Regex;

use crate::config::RuleEntry;
use crate::rules::RuleError;

/// A single compiled pattern rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    action: String,
    source: String,
    regex: Regex,
}

impl PatternRule {
    /// Compile a rule. The pattern is anchored at the start of the input only.
    pub fn new(action: impl Into<String>, pattern: &str) -> Result<Self, RuleError> {
        let action = action.into();
        let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| RuleError::InvalidPattern {
            action: action.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            action,
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn pattern(&self) -> &str {
        &self.source
    }

    fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
            || text
                .strip_suffix('\n')
                .is_some_and(|trimmed| self.regex.is_match(trimmed))
    }
}

/// Ordered pattern rules.
#[derive(Debug, Clone)]
pub struct PatternRules {
    rules: Vec<PatternRule>,
}

impl PatternRules {
    /// Compile rules from config entries, keeping their order.
    pub fn from_entries(entries: &[RuleEntry]) -> Result<Self, RuleError> {
        let rules = entries
            .iter()
            .map(|entry| {
                let mut pairs = entry.0.iter();
                match (pairs.next(), pairs.next()) {
                    (Some((action, pattern)), None) => PatternRule::new(action.clone(), &pattern.to_string()),
                    (None, _) => Err(RuleError::EmptyRule),
                    (Some(_), Some(_)) => Err(RuleError::MultipleActions(
                        entry.0.keys().cloned().collect::<Vec<_>>().join(", "),
                    )),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Return the action of the first rule matching `text`.
    pub fn process(&self, text: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(text))
            .map(PatternRule::action)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
