//! Built-in condition types
//!
//! String and numeric comparisons against the attribute value under check.
//! A value of the wrong JSON type never satisfies a condition.

use super::ConditionType;
use crate::inquiry::Inquiry;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Satisfied when the value is a string equal to `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringEqualCondition {
    pub value: String,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl StringEqualCondition {
    pub fn new(value: impl Into<String>) -> Self {
        StringEqualCondition {
            value: value.into(),
            case_insensitive: false,
        }
    }

    pub fn case_insensitive(value: impl Into<String>) -> Self {
        StringEqualCondition {
            value: value.into(),
            case_insensitive: true,
        }
    }
}

impl ConditionType for StringEqualCondition {
    fn is_satisfied(&self, what: &Value, _inquiry: &Inquiry) -> bool {
        match what.as_str() {
            Some(actual) if self.case_insensitive => {
                actual.to_lowercase() == self.value.to_lowercase()
            }
            Some(actual) => actual == self.value,
            None => false,
        }
    }
}

/// Satisfied when the value is a string matching `pattern`, where `*` spans
/// any run of characters
///
/// The pattern is compiled on first use and reused afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringLikeCondition {
    pattern: String,
    #[serde(skip)]
    compiled: OnceCell<Option<Regex>>,
}

impl StringLikeCondition {
    pub fn new(pattern: impl Into<String>) -> Self {
        StringLikeCondition {
            pattern: pattern.into(),
            compiled: OnceCell::new(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn regex(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| {
                let body: Vec<String> = self.pattern.split('*').map(regex::escape).collect();
                Regex::new(&format!("^{}$", body.join(".*"))).ok()
            })
            .as_ref()
    }
}

impl PartialEq for StringLikeCondition {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl ConditionType for StringLikeCondition {
    fn is_satisfied(&self, what: &Value, _inquiry: &Inquiry) -> bool {
        match (what.as_str(), self.regex()) {
            (Some(actual), Some(re)) => re.is_match(actual),
            _ => false,
        }
    }
}

/// Satisfied when the value is a number strictly less than `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericLessCondition {
    pub value: f64,
}

impl ConditionType for NumericLessCondition {
    fn is_satisfied(&self, what: &Value, _inquiry: &Inquiry) -> bool {
        what.as_f64().map_or(false, |actual| actual < self.value)
    }
}

/// Satisfied when the value is a number strictly greater than `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericGreaterCondition {
    pub value: f64,
}

impl ConditionType for NumericGreaterCondition {
    fn is_satisfied(&self, what: &Value, _inquiry: &Inquiry) -> bool {
        what.as_f64().map_or(false, |actual| actual > self.value)
    }
}
