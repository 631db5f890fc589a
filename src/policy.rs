//! Policy entity and its persisted document shape
//!
//! A policy serializes to
//!
//! ```json
//! {"uid": "...", "type": 1, "effect": true, "description": null,
//!  "context": {"<key>": {"type": "...", "contents": {...}}},
//!  "subjects": [...], "resources": [...], "actions": [...]}
//! ```
//!
//! which every backend uses as the canonical transfer format.

use crate::condition::{context_serde, ConditionRef, ConditionType};
use crate::error::Result;
use crate::inquiry::Inquiry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Effect of a matching policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum Effect {
    /// Grant access
    Allow,
    /// Refuse access
    #[default]
    Deny,
}

impl From<bool> for Effect {
    fn from(allow: bool) -> Self {
        if allow {
            Effect::Allow
        } else {
            Effect::Deny
        }
    }
}

impl From<Effect> for bool {
    fn from(effect: Effect) -> Self {
        effect == Effect::Allow
    }
}

/// How a policy's attribute matchers are meant to be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PolicyKind {
    /// Matchers are strings (exact values or patterns)
    #[default]
    StringBased = 1,
    /// Matchers are structured rule documents
    RuleBased = 2,
}

impl TryFrom<u8> for PolicyKind {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(PolicyKind::StringBased),
            2 => Ok(PolicyKind::RuleBased),
            other => Err(format!("unknown policy type {}", other)),
        }
    }
}

impl From<PolicyKind> for u8 {
    fn from(kind: PolicyKind) -> Self {
        kind as u8
    }
}

/// An access-control policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Unique identifier within a storage
    pub uid: String,

    #[serde(rename = "type", default)]
    pub kind: PolicyKind,

    #[serde(default)]
    pub effect: Effect,

    #[serde(default)]
    pub description: Option<String>,

    /// Named conditions, keyed by the inquiry context attribute they check
    #[serde(default, with = "context_serde")]
    pub context: BTreeMap<String, ConditionRef>,

    #[serde(default)]
    pub subjects: Vec<Value>,

    #[serde(default)]
    pub resources: Vec<Value>,

    #[serde(default)]
    pub actions: Vec<Value>,
}

impl Policy {
    /// Create an empty deny policy
    pub fn new(uid: impl Into<String>) -> Self {
        Policy {
            uid: uid.into(),
            kind: PolicyKind::default(),
            effect: Effect::default(),
            description: None,
            context: BTreeMap::new(),
            subjects: Vec::new(),
            resources: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn with_kind(mut self, kind: PolicyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_subjects<I, V>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.subjects = subjects.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_resources<I, V>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_actions<I, V>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a condition checking the inquiry context attribute `key`
    pub fn with_condition<C: ConditionType>(
        mut self,
        key: impl Into<String>,
        condition: C,
    ) -> Self {
        self.context.insert(key.into(), Arc::new(condition));
        self
    }

    /// Serialize to the canonical policy document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a canonical policy document
    ///
    /// Condition documents are reconstructed through the process-wide
    /// registry; an unregistered tag fails the whole parse.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether every context condition holds for the inquiry
    ///
    /// A condition whose attribute is missing from the inquiry context fails.
    pub fn conditions_satisfied(&self, inquiry: &Inquiry) -> bool {
        self.context.iter().all(|(key, cond)| {
            inquiry
                .context
                .get(key)
                .map_or(false, |what| cond.satisfied(what, inquiry))
        })
    }
}

impl PartialEq for Policy {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.kind == other.kind
            && self.effect == other.effect
            && self.description == other.description
            && self.subjects == other.subjects
            && self.resources == other.resources
            && self.actions == other.actions
            && self.context.len() == other.context.len()
            && self.context.iter().zip(other.context.iter()).all(|((ka, ca), (kb, cb))| {
                // A condition that cannot be serialized equals nothing
                match (ca.to_document(), cb.to_document()) {
                    (Ok(da), Ok(db)) => ka == kb && da == db,
                    _ => false,
                }
            })
    }
}
