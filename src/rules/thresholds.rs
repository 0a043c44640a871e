//! Threshold rules.
//!
//! # Rule Forms
//! ```text
//! { up = "<7000" }      action when value < 7000
//! { drain = ">7000" }   action when value > 7000
//! { maint = "!0" }      action when value != 0
//! { down = 0 }          action when value == 0 ("=" prefix is optional)
//! { pct = 7000 }        weight = 100 - value / 7000 * 100, as "<n>%"
//! ```
//!
//! # Design Decisions
//! - Literals are parsed once; a bad literal fails construction
//! - Rules run in order, first satisfied rule wins (percentage included)
//! - Percentages above 100 answer with an empty token instead of a weight

use std::fmt;

use crate::config::{RuleEntry, RuleLiteral};
use crate::rules::RuleError;

const PCT_ACTION: &str = "pct";
const MIN_RESPONSE_KEY: &str = "min_threshold_response";
const DEFAULT_MIN_RESPONSE: i64 = 1;

/// Comparison operators available to threshold rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
}

impl Operator {
    fn apply(self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Eq => value == threshold,
            Operator::Ne => value != threshold,
            Operator::Lt => value < threshold,
            Operator::Gt => value > threshold,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
        })
    }
}

/// A parsed threshold rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdRule {
    Compare {
        action: String,
        op: Operator,
        threshold: i64,
    },
    Percentage {
        threshold: i64,
        min_response: i64,
    },
}

impl ThresholdRule {
    /// Parse one config entry.
    pub fn from_entry(entry: &RuleEntry) -> Result<Self, RuleError> {
        if let Some(literal) = entry.0.get(PCT_ACTION) {
            if let Some(extra) = entry.0.keys().find(|k| *k != PCT_ACTION && *k != MIN_RESPONSE_KEY) {
                return Err(RuleError::MultipleActions(format!("{}, {}", PCT_ACTION, extra)));
            }
            // The operator of a percentage threshold is ignored.
            let (_, threshold) = parse_literal(PCT_ACTION, literal)?;
            if threshold == 0 {
                return Err(RuleError::ZeroPercentageThreshold);
            }
            let min_response = match entry.0.get(MIN_RESPONSE_KEY) {
                Some(RuleLiteral::Int(i)) => *i,
                Some(RuleLiteral::Text(s)) => s.trim().parse().map_err(|_| RuleError::InvalidThreshold {
                    action: MIN_RESPONSE_KEY.to_string(),
                    literal: s.clone(),
                })?,
                None => DEFAULT_MIN_RESPONSE,
            };
            return Ok(ThresholdRule::Percentage {
                threshold,
                min_response,
            });
        }

        let mut pairs = entry.0.iter();
        match (pairs.next(), pairs.next()) {
            (Some((action, literal)), None) => {
                let (op, threshold) = parse_literal(action, literal)?;
                Ok(ThresholdRule::Compare {
                    action: action.clone(),
                    op,
                    threshold,
                })
            }
            (None, _) => Err(RuleError::EmptyRule),
            (Some(_), Some(_)) => Err(RuleError::MultipleActions(
                entry.0.keys().cloned().collect::<Vec<_>>().join(", "),
            )),
        }
    }

    /// Apply the rule, returning the token when it matches.
    fn apply(&self, value: f64) -> Option<String> {
        match self {
            ThresholdRule::Compare { action, op, threshold } => {
                op.apply(value, *threshold as f64).then(|| action.clone())
            }
            ThresholdRule::Percentage {
                threshold,
                min_response,
            } => Some(percentage(value, *threshold, *min_response)),
        }
    }
}

/// Weight for a percentage rule.
///
/// The fraction is truncated toward zero. At or below zero the minimum
/// response is used; above 100 the result is the empty no-op token.
pub fn percentage(value: f64, threshold: i64, min_response: i64) -> String {
    let pct = (100.0 - (value / threshold as f64) * 100.0) as i64;
    if pct <= 0 {
        tracing::warn!(pct, min_response, "Percentage at or below 0, responding with minimum");
        format!("{}%", min_response)
    } else if pct > 100 {
        tracing::warn!(pct, "Percentage above 100, responding with empty string (noop)");
        String::new()
    } else {
        format!("{}%", pct)
    }
}

fn parse_literal(action: &str, literal: &RuleLiteral) -> Result<(Operator, i64), RuleError> {
    let text = literal.to_string();
    let trimmed = text.trim();
    let (op, rest) = match trimmed.chars().next() {
        Some('<') => (Operator::Lt, &trimmed[1..]),
        Some('>') => (Operator::Gt, &trimmed[1..]),
        Some('!') => (Operator::Ne, &trimmed[1..]),
        Some('=') => (Operator::Eq, &trimmed[1..]),
        _ => (Operator::Eq, trimmed),
    };
    let threshold = rest.trim().parse::<i64>().map_err(|_| RuleError::InvalidThreshold {
        action: action.to_string(),
        literal: text.clone(),
    })?;
    Ok((op, threshold))
}

/// Ordered threshold rules.
#[derive(Debug, Clone)]
pub struct ThresholdRules {
    rules: Vec<ThresholdRule>,
}

impl ThresholdRules {
    /// Parse rules from config entries. At most one percentage rule is allowed.
    pub fn from_entries(entries: &[RuleEntry]) -> Result<Self, RuleError> {
        let rules = entries
            .iter()
            .map(ThresholdRule::from_entry)
            .collect::<Result<Vec<_>, _>>()?;

        let percentages = rules
            .iter()
            .filter(|r| matches!(r, ThresholdRule::Percentage { .. }))
            .count();
        if percentages > 1 {
            return Err(RuleError::DuplicatePercentage);
        }
        Ok(Self { rules })
    }

    /// Return the token of the first matching rule.
    pub fn process(&self, value: f64) -> Option<String> {
        self.rules.iter().find_map(|rule| rule.apply(value))
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(entries: Vec<RuleEntry>) -> ThresholdRules {
        ThresholdRules::from_entries(&entries).unwrap()
    }

    #[test]
    fn parses_operators() {
        let parsed = rules(vec![
            RuleEntry::new("up", "<7000"),
            RuleEntry::new("drain", ">7000"),
            RuleEntry::new("maint", "!5"),
            RuleEntry::new("down", 0),
            RuleEntry::new("ready", "=1"),
        ]);
        let ops: Vec<_> = parsed
            .rules()
            .iter()
            .map(|r| match r {
                ThresholdRule::Compare { op, threshold, .. } => (*op, *threshold),
                ThresholdRule::Percentage { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(
            ops,
            vec![
                (Operator::Lt, 7000),
                (Operator::Gt, 7000),
                (Operator::Ne, 5),
                (Operator::Eq, 0),
                (Operator::Eq, 1),
            ]
        );
    }

    #[test]
    fn first_satisfied_rule_wins() {
        let parsed = rules(vec![
            RuleEntry::new("up", "<7000"),
            RuleEntry::new("drain", ">7000"),
            RuleEntry::new("down", ">9000"),
        ]);
        assert_eq!(parsed.process(5000.0).as_deref(), Some("up"));
        assert_eq!(parsed.process(9500.0).as_deref(), Some("drain"));
        assert_eq!(parsed.process(7000.0), None);
    }

    #[test]
    fn percentage_weights() {
        let parsed = rules(vec![RuleEntry::new("pct", 7000)]);
        assert_eq!(parsed.process(7000.0).as_deref(), Some("1%"));
        assert_eq!(parsed.process(3500.0).as_deref(), Some("50%"));
        assert_eq!(parsed.process(-700.0).as_deref(), Some(""));
        assert_eq!(parsed.process(0.0).as_deref(), Some("100%"));
        assert_eq!(parsed.process(6999.0).as_deref(), Some("1%"));
        assert_eq!(parsed.process(9000.0).as_deref(), Some("1%"));
    }

    #[test]
    fn percentage_min_response_is_configurable() {
        let parsed = rules(vec![RuleEntry::new("pct", 7000).with("min_threshold_response", 10)]);
        assert_eq!(parsed.process(8000.0).as_deref(), Some("10%"));
    }

    #[test]
    fn percentage_competes_in_order() {
        let parsed = rules(vec![RuleEntry::new("down", 0), RuleEntry::new("pct", 100)]);
        assert_eq!(parsed.process(0.0).as_deref(), Some("down"));
        assert_eq!(parsed.process(25.0).as_deref(), Some("75%"));
    }

    #[test]
    fn invalid_literals_fail_construction() {
        for literal in ["abc", "<", ">70.5", "<<7000"] {
            let err = ThresholdRules::from_entries(&[RuleEntry::new("up", literal)]).unwrap_err();
            assert!(matches!(err, RuleError::InvalidThreshold { .. }), "{literal}");
        }
    }

    #[test]
    fn percentage_constraints() {
        assert_eq!(
            ThresholdRules::from_entries(&[RuleEntry::new("pct", 0)]).unwrap_err(),
            RuleError::ZeroPercentageThreshold
        );
        assert_eq!(
            ThresholdRules::from_entries(&[RuleEntry::new("pct", 10), RuleEntry::new("pct", 20)])
                .unwrap_err(),
            RuleError::DuplicatePercentage
        );
    }
}
