//! Cache configuration
//!
//! Loaded from TOML, e.g.:
//!
//! ```toml
//! warm_on_start = true
//! warm_page_size = 500
//! guard_capacity = 4096
//! ```

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Default number of policies pulled per page while warming the cache tier
pub const DEFAULT_WARM_PAGE_SIZE: usize = 1000;

/// Default maximum number of memoized decisions
pub const DEFAULT_GUARD_CAPACITY: usize = 1024;

/// Settings shared by the write-through and decision caches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    /// Populate the cache tier from the backing store on construction
    pub warm_on_start: bool,

    /// Page size used by `get_all` while warming
    #[validate(range(min = 1, max = 100_000))]
    pub warm_page_size: usize,

    /// Maximum entries held by the decision memoization table
    #[validate(range(min = 1, max = 1_000_000))]
    pub guard_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            warm_on_start: false,
            warm_page_size: DEFAULT_WARM_PAGE_SIZE,
            guard_capacity: DEFAULT_GUARD_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: CacheConfig = toml::from_str(source)?;
        config.check()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Run field validation, mapping failures to `InvalidConfig`
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))
    }
}
