//! Discrete-format rules: bucket a continuous feature value into a label.
//!
//! Rule grammar (one delimiter per rule string):
//!
//! | Rule | Predicate |
//! |------|-----------|
//! | `"lo-hi"` | `lo < v < hi` (a leading `-` is a sign) |
//! | `"lo_hi"` | `lo <= v <= hi` |
//! | `"b<"` | `b < v` |
//! | `"b>"` | `b > v` |
//!
//! Rules are evaluated in order and the first match wins.
//!
//! Label [`RESERVED_LABEL`] (`-1`) is not allowed: in a feature vector it is
//! the encoding of [`Value::NoMatch`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SocialMeterError};
use crate::types::{Value, NO_MATCH_FEATURE};

/// The label that [`Value::NoMatch`] becomes in a feature vector.
pub const RESERVED_LABEL: i64 = NO_MATCH_FEATURE as i64;

/// One parsed range predicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscreteRule {
    /// `lo < v < hi`
    Exclusive { lo: f64, hi: f64 },
    /// `lo <= v <= hi`
    Inclusive { lo: f64, hi: f64 },
    /// `bound < v`
    GreaterThan { bound: f64 },
    /// `bound > v`
    LessThan { bound: f64 },
}

impl DiscreteRule {
    #[inline]
    pub fn matches(&self, v: f64) -> bool {
        match *self {
            DiscreteRule::Exclusive { lo, hi } => lo < v && v < hi,
            DiscreteRule::Inclusive { lo, hi } => lo <= v && v <= hi,
            DiscreteRule::GreaterThan { bound } => bound < v,
            DiscreteRule::LessThan { bound } => bound > v,
        }
    }
}

fn parse_bound(rule: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        SocialMeterError::invalid_rule(rule, format!("bound '{raw}' is not a number"))
    })?;
    if value.is_nan() {
        return Err(SocialMeterError::invalid_rule(rule, "bound is NaN"));
    }
    Ok(value)
}

impl FromStr for DiscreteRule {
    type Err = SocialMeterError;

    fn from_str(s: &str) -> Result<Self> {
        let rule = s.trim();
        if rule.is_empty() {
            return Err(SocialMeterError::invalid_rule(s, "rule is empty"));
        }

        if let Some(bound) = rule.strip_suffix('<') {
            return Ok(DiscreteRule::GreaterThan {
                bound: parse_bound(s, bound)?,
            });
        }
        if let Some(bound) = rule.strip_suffix('>') {
            return Ok(DiscreteRule::LessThan {
                bound: parse_bound(s, bound)?,
            });
        }
        if let Some((lo, hi)) = rule.split_once('_') {
            return Ok(DiscreteRule::Inclusive {
                lo: parse_bound(s, lo)?,
                hi: parse_bound(s, hi)?,
            });
        }
        // A leading `-` is a sign, and exponents (`1e-3`) carry their own
        // `-`, so the delimiter is the first `-` that leaves two numbers.
        let mut first_err = None;
        for (i, _) in rule.char_indices().skip(1).filter(|&(_, c)| c == '-') {
            match (parse_bound(s, &rule[..i]), parse_bound(s, &rule[i + 1..])) {
                (Ok(lo), Ok(hi)) => return Ok(DiscreteRule::Exclusive { lo, hi }),
                (Err(e), _) | (_, Err(e)) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(err) = first_err {
            return Err(err);
        }

        Err(SocialMeterError::invalid_rule(
            s,
            "matches no known format (lo-hi, lo_hi, bound<, bound>)",
        ))
    }
}

impl fmt::Display for DiscreteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscreteRule::Exclusive { lo, hi } => write!(f, "{lo}-{hi}"),
            DiscreteRule::Inclusive { lo, hi } => write!(f, "{lo}_{hi}"),
            DiscreteRule::GreaterThan { bound } => write!(f, "{bound}<"),
            DiscreteRule::LessThan { bound } => write!(f, "{bound}>"),
        }
    }
}

/// Ordered `(rule, label)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Discretizer {
    rules: Vec<(DiscreteRule, i64)>,
}

impl Discretizer {
    /// Parse `rules` and pair them with `labels`.
    ///
    /// Fails with `InvalidRule` on the first unparsable rule and with
    /// `InvalidConfig` when the two lists differ in length or a label is
    /// [`RESERVED_LABEL`].
    pub fn new<S: AsRef<str>>(rules: &[S], labels: &[i64]) -> Result<Self> {
        if rules.len() != labels.len() {
            return Err(SocialMeterError::invalid_config(format!(
                "{} discrete rule(s) but {} label(s)",
                rules.len(),
                labels.len()
            )));
        }
        if labels.contains(&RESERVED_LABEL) {
            return Err(SocialMeterError::invalid_config(format!(
                "label {RESERVED_LABEL} is reserved for values no rule matches"
            )));
        }
        let rules = rules
            .iter()
            .zip(labels)
            .map(|(r, &label)| r.as_ref().parse::<DiscreteRule>().map(|rule| (rule, label)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[(DiscreteRule, i64)] {
        &self.rules
    }

    /// Bucket `value`: the first matching rule's label, the raw value when no
    /// rules are configured, [`Value::NoMatch`] otherwise.
    pub fn apply(&self, value: f64) -> Value {
        if self.rules.is_empty() {
            return Value::Number(value);
        }
        self.rules
            .iter()
            .find(|(rule, _)| rule.matches(value))
            .map(|&(_, label)| Value::Label(label))
            .unwrap_or(Value::NoMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_each_grammar() {
        assert_eq!(
            "0_2".parse::<DiscreteRule>().unwrap(),
            DiscreteRule::Inclusive { lo: 0.0, hi: 2.0 }
        );
        assert_eq!(
            "1-4".parse::<DiscreteRule>().unwrap(),
            DiscreteRule::Exclusive { lo: 1.0, hi: 4.0 }
        );
        assert_eq!(
            "3<".parse::<DiscreteRule>().unwrap(),
            DiscreteRule::GreaterThan { bound: 3.0 }
        );
        assert_eq!(
            "0.5>".parse::<DiscreteRule>().unwrap(),
            DiscreteRule::LessThan { bound: 0.5 }
        );
    }

    #[test]
    fn test_exponent_bounds() {
        assert_eq!(
            "1e-3-5".parse::<DiscreteRule>().unwrap(),
            DiscreteRule::Exclusive { lo: 0.001, hi: 5.0 }
        );
        assert_eq!(
            "-1e-2-2e-1".parse::<DiscreteRule>().unwrap(),
            DiscreteRule::Exclusive { lo: -0.01, hi: 0.2 }
        );
        assert_eq!(
            "1e-3_5".parse::<DiscreteRule>().unwrap(),
            DiscreteRule::Inclusive { lo: 0.001, hi: 5.0 }
        );
        assert!("1e-x-5".parse::<DiscreteRule>().is_err());
    }

    #[test]
    fn test_negative_lower_bound() {
        assert_eq!(
            "-5-5".parse::<DiscreteRule>().unwrap(),
            DiscreteRule::Exclusive { lo: -5.0, hi: 5.0 }
        );
        assert_eq!(
            "-2--1".parse::<DiscreteRule>().unwrap(),
            DiscreteRule::Exclusive { lo: -2.0, hi: -1.0 }
        );
    }

    #[test]
    fn test_invalid_rules() {
        for bad in ["3<5", "abc", "", "1_x", "_"] {
            let err = bad.parse::<DiscreteRule>().unwrap_err();
            assert!(
                matches!(err, SocialMeterError::InvalidRule { .. }),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_first_match_wins() {
        let d = Discretizer::new(&["0_10", "5_5"], &[7, 9]).unwrap();
        assert_eq!(d.apply(5.0), Value::Label(7));
    }

    #[test]
    fn test_no_match_and_no_rules() {
        let d = Discretizer::new(&["0_2", "3<"], &[0, 1]).unwrap();
        assert_eq!(d.apply(1.0), Value::Label(0));
        assert_eq!(d.apply(3.0), Value::NoMatch);
        assert_eq!(d.apply(4.0), Value::Label(1));

        let empty = Discretizer::new::<&str>(&[], &[]).unwrap();
        assert_eq!(empty.apply(3.5), Value::Number(3.5));
    }

    #[test]
    fn test_exclusive_bounds_are_open() {
        let d = Discretizer::new(&["1-4"], &[1]).unwrap();
        assert_eq!(d.apply(1.0), Value::NoMatch);
        assert_eq!(d.apply(2.0), Value::Label(1));
        assert_eq!(d.apply(4.0), Value::NoMatch);
    }

    #[test]
    fn test_length_mismatch_is_config_error() {
        let err = Discretizer::new(&["0_1"], &[0, 1]).unwrap_err();
        assert!(matches!(err, SocialMeterError::InvalidConfig { .. }));
    }

    #[test]
    fn test_no_match_label_is_reserved() {
        let err = Discretizer::new(&["0_1", "1<"], &[0, RESERVED_LABEL]).unwrap_err();
        assert!(matches!(err, SocialMeterError::InvalidConfig { .. }));
        assert_eq!(
            Value::NoMatch.as_feature().unwrap(),
            RESERVED_LABEL as f64
        );
        assert!(Discretizer::new(&["0_1", "1<"], &[0, -2]).is_ok());
    }
}
