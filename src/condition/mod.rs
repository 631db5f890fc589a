//! Polymorphic policy conditions
//!
//! A condition is a named predicate attached to a policy's context. Every
//! condition serializes to a self-describing document
//!
//! ```json
//! {"type": "StringEqualCondition", "contents": {"value": "alice", "case_insensitive": false}}
//! ```
//!
//! and is reconstructed by looking the `type` tag up in a [`ConditionRegistry`].
//!
//! Concrete types implement [`ConditionType`] (typed, serde-backed). The
//! blanket impl turns each one into a [`Condition`] trait object, which is what
//! policies hold.

mod builtin;
mod registry;

pub use builtin::{
    NumericGreaterCondition, NumericLessCondition, StringEqualCondition, StringLikeCondition,
};
pub use registry::{decode, decode_json, global, is_registered, register, ConditionRegistry};

use crate::error::{Result, StoreError};
use crate::inquiry::Inquiry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a type-erased condition
pub type ConditionRef = Arc<dyn Condition>;

/// Serialized form of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDocument {
    /// Discriminator tag
    #[serde(rename = "type")]
    pub kind: String,

    /// Field values of the concrete type
    pub contents: Value,
}

impl ConditionDocument {
    /// Parse a document, reporting shape problems as `MalformedCondition`
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::MalformedCondition(e.to_string()))
    }
}

/// A concrete, serde-backed condition type
///
/// # Examples
///
/// ```
/// use abac_store::condition::{Condition, ConditionType};
/// use abac_store::Inquiry;
/// use serde::{Deserialize, Serialize};
/// use serde_json::Value;
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct ABCondition {
///     a: i64,
///     b: i64,
/// }
///
/// impl ConditionType for ABCondition {
///     fn is_satisfied(&self, _what: &Value, _inquiry: &Inquiry) -> bool {
///         self.a == self.b
///     }
/// }
///
/// let cond = ABCondition { a: 1, b: 2 };
/// assert_eq!(cond.name(), "ABCondition");
/// assert_eq!(
///     cond.to_json().unwrap(),
///     r#"{"type":"ABCondition","contents":{"a":1,"b":2}}"#
/// );
/// ```
pub trait ConditionType: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Discriminator tag; defaults to the type's own name
    fn tag() -> &'static str {
        short_type_name::<Self>()
    }

    /// Evaluate against the attribute value `what` and the whole inquiry
    ///
    /// Must return `false`, not panic, when `what` has an unexpected type.
    fn is_satisfied(&self, what: &Value, inquiry: &Inquiry) -> bool;

    /// Rebuild from a document whose tag names this type
    fn from_document(document: &ConditionDocument) -> Result<Self> {
        if document.kind != Self::tag() {
            return Err(StoreError::MalformedCondition(format!(
                "expected type '{}', found '{}'",
                Self::tag(),
                document.kind
            )));
        }
        serde_json::from_value(document.contents.clone())
            .map_err(|e| StoreError::MalformedCondition(format!("{}: {}", document.kind, e)))
    }

    /// Rebuild from JSON text
    fn from_json(json: &str) -> Result<Self> {
        Self::from_document(&ConditionDocument::parse(json)?)
    }
}

/// Object-safe view of a condition
pub trait Condition: fmt::Debug + Send + Sync {
    /// Registered discriminator tag
    fn name(&self) -> &'static str;

    /// Evaluate against the attribute value `what` and the whole inquiry
    fn satisfied(&self, what: &Value, inquiry: &Inquiry) -> bool;

    /// Field values as a JSON object
    fn contents(&self) -> Result<Value>;

    /// Tagged document for persistence
    fn to_document(&self) -> Result<ConditionDocument> {
        Ok(ConditionDocument {
            kind: self.name().to_string(),
            contents: self.contents()?,
        })
    }

    /// Tagged document as JSON text
    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_document()?)?)
    }
}

impl<T: ConditionType> Condition for T {
    fn name(&self) -> &'static str {
        T::tag()
    }

    fn satisfied(&self, what: &Value, inquiry: &Inquiry) -> bool {
        self.is_satisfied(what, inquiry)
    }

    fn contents(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Last path segment of a type name, without generic arguments
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Encode a policy context into condition documents
pub fn encode_context(
    context: &BTreeMap<String, ConditionRef>,
) -> Result<BTreeMap<String, ConditionDocument>> {
    context
        .iter()
        .map(|(key, cond)| Ok((key.clone(), cond.to_document()?)))
        .collect()
}

/// Decode condition documents through the process registry
pub fn decode_context(
    documents: &BTreeMap<String, ConditionDocument>,
) -> Result<BTreeMap<String, ConditionRef>> {
    documents
        .iter()
        .map(|(key, doc)| Ok((key.clone(), decode(doc)?)))
        .collect()
}

/// Serde adapter for `BTreeMap<String, ConditionRef>` fields
pub(crate) mod context_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(
        context: &BTreeMap<String, ConditionRef>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let documents = encode_context(context).map_err(serde::ser::Error::custom)?;
        documents.serialize(serializer)
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> std::result::Result<BTreeMap<String, ConditionRef>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let documents = BTreeMap::<String, ConditionDocument>::deserialize(deserializer)?;
        decode_context(&documents).map_err(serde::de::Error::custom)
    }
}
