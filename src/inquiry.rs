//! Access request description
//!
//! An inquiry is never persisted. It is handed to checkers and used as part
//! of the decision cache key.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single access request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inquiry {
    /// Who is asking
    #[serde(default)]
    pub subject: String,

    /// What is being accessed
    #[serde(default)]
    pub resource: String,

    /// What the subject wants to do
    #[serde(default)]
    pub action: String,

    /// Extra attributes for condition evaluation
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
}

impl Inquiry {
    /// Create an inquiry with an empty context
    pub fn new(
        subject: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Inquiry {
            subject: subject.into(),
            resource: resource.into(),
            action: action.into(),
            context: BTreeMap::new(),
        }
    }

    /// Add a context attribute
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Canonical JSON text of this inquiry
    ///
    /// Context keys are sorted, so equal inquiries always yield equal keys.
    pub fn cache_key(&self) -> String {
        // Strings and JSON values always serialize; the fallback is unreachable
        serde_json::to_string(self).unwrap_or_default()
    }
}
