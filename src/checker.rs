//! Candidate selection strategies for `find_for_inquiry`
//!
//! A checker compares inquiry attributes with a policy's subject, resource
//! and action matchers. Storages treat it as an opaque predicate; the
//! decision cache uses [`Checker::id`] as part of its key.

use crate::inquiry::Inquiry;
use crate::pattern::PatternMatcher;
use crate::policy::Policy;
use serde_json::Value;

/// Strategy deciding whether a policy is a candidate for an inquiry
pub trait Checker: Send + Sync {
    /// Stable identifier; checkers that may disagree must have different ids
    fn id(&self) -> &str;

    /// Whether `policy` is a candidate for `inquiry`
    fn fits(&self, policy: &Policy, inquiry: &Inquiry) -> bool;
}

/// True if any string matcher in `matchers` accepts `value`
fn any_string<F>(matchers: &[Value], value: &str, accept: F) -> bool
where
    F: Fn(&str, &str) -> bool,
{
    matchers
        .iter()
        .filter_map(Value::as_str)
        .any(|matcher| accept(matcher, value))
}

/// Candidates whose subject, resource and action matchers contain the
/// inquiry's values verbatim
#[derive(Debug, Clone, Copy, Default)]
pub struct StringExactChecker;

impl Checker for StringExactChecker {
    fn id(&self) -> &str {
        "string-exact"
    }

    fn fits(&self, policy: &Policy, inquiry: &Inquiry) -> bool {
        let exact = |matcher: &str, value: &str| matcher == value;
        any_string(&policy.subjects, &inquiry.subject, exact)
            && any_string(&policy.resources, &inquiry.resource, exact)
            && any_string(&policy.actions, &inquiry.action, exact)
    }
}

/// Candidates whose matchers accept the inquiry under `*` / `**` wildcards
#[derive(Debug, Clone)]
pub struct PatternChecker {
    matcher: PatternMatcher,
    id: String,
}

impl PatternChecker {
    /// Checker splitting attributes on `/`
    pub fn new() -> Self {
        Self::with_separator('/')
    }

    /// Checker splitting attributes on a custom separator
    pub fn with_separator(separator: char) -> Self {
        PatternChecker {
            matcher: PatternMatcher::with_separator(separator),
            id: format!("pattern:{}", separator),
        }
    }
}

impl Default for PatternChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for PatternChecker {
    fn id(&self) -> &str {
        &self.id
    }

    fn fits(&self, policy: &Policy, inquiry: &Inquiry) -> bool {
        let wildcard = |matcher: &str, value: &str| self.matcher.matches(matcher, value);
        any_string(&policy.subjects, &inquiry.subject, wildcard)
            && any_string(&policy.resources, &inquiry.resource, wildcard)
            && any_string(&policy.actions, &inquiry.action, wildcard)
    }
}
