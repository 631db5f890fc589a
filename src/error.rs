//! Error types for policy storage and caching

use thiserror::Error;

/// Policy store result type
pub type Result<T> = std::result::Result<T, StoreError>;

/// Policy store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A policy with the same UID is already stored
    #[error("Conflicting UID = {0}")]
    PolicyExists(String),

    /// Any other backend failure (connectivity, corrupted record, ...)
    #[error("Storage error: {0}")]
    Backend(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite backend failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Condition document names a type that was never registered
    #[error("Unknown condition type: {0}")]
    UnknownConditionType(String),

    /// Two condition types claim the same discriminator tag
    #[error("Condition type already registered: {0}")]
    DuplicateConditionType(String),

    /// Condition document does not have the `{type, contents}` shape
    #[error("Malformed condition document: {0}")]
    MalformedCondition(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file is not valid TOML
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing store accepted the write but the cache tier refused it
    #[error("Policy {uid} {op} persisted but cache tier failed: {source}")]
    CacheTier {
        op: &'static str,
        uid: String,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// True for the duplicate-UID case, which callers may report and continue
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::PolicyExists(_))
    }
}
