//! Discriminator tag -> constructor lookup
//!
//! The process-wide registry starts with the built-in conditions. Custom
//! types are added once at startup with [`register`]; claiming a tag that is
//! already taken is an error, never a silent override.

use super::builtin::{
    NumericGreaterCondition, NumericLessCondition, StringEqualCondition, StringLikeCondition,
};
use super::{ConditionDocument, ConditionRef, ConditionType};
use crate::error::{Result, StoreError};
use once_cell::sync::Lazy;
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type Constructor = fn(&ConditionDocument) -> Result<ConditionRef>;

fn construct<T: ConditionType>(document: &ConditionDocument) -> Result<ConditionRef> {
    Ok(Arc::new(T::from_document(document)?))
}

/// Maps condition tags to their reconstruction functions
#[derive(Clone, Default)]
pub struct ConditionRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl ConditionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in condition types
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert::<StringEqualCondition>();
        registry.insert::<StringLikeCondition>();
        registry.insert::<NumericLessCondition>();
        registry.insert::<NumericGreaterCondition>();
        registry
    }

    fn insert<T: ConditionType>(&mut self) {
        self.constructors.insert(T::tag(), construct::<T>);
    }

    /// Register a condition type under its tag
    ///
    /// # Errors
    ///
    /// Returns `DuplicateConditionType` if the tag is already registered.
    pub fn register<T: ConditionType>(&mut self) -> Result<()> {
        let tag = T::tag();
        if self.constructors.contains_key(tag) {
            return Err(StoreError::DuplicateConditionType(tag.to_string()));
        }
        debug!("Registering condition type '{}'", tag);
        self.insert::<T>();
        Ok(())
    }

    /// Whether a tag is registered
    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.constructors.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Reconstruct a condition from its document
    ///
    /// # Errors
    ///
    /// `UnknownConditionType` if the tag is not registered, `MalformedCondition`
    /// if the contents do not fit the registered type.
    pub fn decode(&self, document: &ConditionDocument) -> Result<ConditionRef> {
        let constructor = self
            .constructors
            .get(document.kind.as_str())
            .ok_or_else(|| StoreError::UnknownConditionType(document.kind.clone()))?;
        constructor(document)
    }

    /// Reconstruct a condition from JSON text
    pub fn decode_json(&self, json: &str) -> Result<ConditionRef> {
        self.decode(&ConditionDocument::parse(json)?)
    }
}

impl std::fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

static GLOBAL: Lazy<RwLock<ConditionRegistry>> =
    Lazy::new(|| RwLock::new(ConditionRegistry::with_builtins()));

/// Read access to the process-wide registry
///
/// Holding the guard blocks [`register`]; drop it before registering.
pub fn global() -> RwLockReadGuard<'static, ConditionRegistry> {
    GLOBAL.read()
}

/// Register a condition type in the process-wide registry
pub fn register<T: ConditionType>() -> Result<()> {
    GLOBAL.write().register::<T>()
}

/// Whether a tag is known to the process-wide registry
pub fn is_registered(tag: &str) -> bool {
    GLOBAL.read().contains(tag)
}

/// Reconstruct a condition through the process-wide registry
pub fn decode(document: &ConditionDocument) -> Result<ConditionRef> {
    GLOBAL.read().decode(document)
}

/// Reconstruct a condition from JSON text through the process-wide registry
pub fn decode_json(json: &str) -> Result<ConditionRef> {
    GLOBAL.read().decode_json(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::inquiry::Inquiry;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    #[derive(Debug, Serialize, Deserialize)]
    struct Flag {
        on: bool,
    }

    impl ConditionType for Flag {
        fn is_satisfied(&self, _what: &Value, _inquiry: &Inquiry) -> bool {
            self.on
        }
    }

    mod other {
        use super::*;

        // Same type name as the outer `Flag`, therefore the same default tag
        #[derive(Debug, Serialize, Deserialize)]
        pub struct Flag;

        impl ConditionType for Flag {
            fn is_satisfied(&self, _what: &Value, _inquiry: &Inquiry) -> bool {
                false
            }
        }
    }

    #[test]
    fn test_builtins_present() {
        let registry = ConditionRegistry::with_builtins();
        assert_eq!(
            registry.tags(),
            vec![
                "NumericGreaterCondition",
                "NumericLessCondition",
                "StringEqualCondition",
                "StringLikeCondition",
            ]
        );
    }

    #[test]
    fn test_register_and_decode() {
        let mut registry = ConditionRegistry::new();
        registry.register::<Flag>().unwrap();

        let cond = registry
            .decode_json(r#"{"type": "Flag", "contents": {"on": true}}"#)
            .unwrap();
        assert_eq!(cond.name(), "Flag");
        assert!(cond.satisfied(&Value::Null, &Inquiry::default()));
        assert_eq!(cond.contents().unwrap(), json!({"on": true}));
    }

    #[test]
    fn test_duplicate_tag_fails_fast() {
        let mut registry = ConditionRegistry::new();
        registry.register::<Flag>().unwrap();

        let err = registry.register::<other::Flag>().unwrap_err();
        assert!(matches!(err, StoreError::DuplicateConditionType(ref t) if t == "Flag"));

        // The first registration still wins
        let cond = registry
            .decode_json(r#"{"type": "Flag", "contents": {"on": true}}"#)
            .unwrap();
        assert!(cond.satisfied(&Value::Null, &Inquiry::default()));
    }

    #[test]
    fn test_unknown_tag() {
        let registry = ConditionRegistry::with_builtins();
        let err = registry
            .decode_json(r#"{"type": "NoSuchCondition", "contents": {}}"#)
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownConditionType(ref t) if t == "NoSuchCondition"));
    }

    #[test]
    fn test_global_registry_has_builtins() {
        assert!(is_registered("StringEqualCondition"));
        assert!(!is_registered("NoSuchCondition"));

        let err = register::<StringLikeCondition>().unwrap_err();
        assert!(matches!(err, StoreError::DuplicateConditionType(_)));
    }

    #[test]
    fn test_global_accessor_sees_registrations() {
        #[derive(Debug, Serialize, Deserialize)]
        struct AlwaysOn;

        impl ConditionType for AlwaysOn {
            fn tag() -> &'static str {
                "global-accessor-flag"
            }

            fn is_satisfied(&self, _what: &Value, _inquiry: &Inquiry) -> bool {
                true
            }
        }

        assert!(global().contains("NumericLessCondition"));
        assert!(!global().contains("global-accessor-flag"));

        register::<AlwaysOn>().unwrap();
        let registry = global();
        assert!(registry.contains("global-accessor-flag"));
        let cond = registry
            .decode_json(r#"{"type": "global-accessor-flag", "contents": null}"#)
            .unwrap();
        assert!(cond.satisfied(&Value::Null, &Inquiry::default()));
    }
}
