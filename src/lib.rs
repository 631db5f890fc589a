//! # abac-store - Policy Storage and Caching for ABAC Engines
//!
//! Persistence and caching core of an attribute-based access-control engine:
//!
//! - **[`Storage`]** contract implemented by every backend, with
//!   [`MemoryStorage`] (in-process) and [`SqliteStorage`] (relational)
//! - **[`EnfoldCache`]** write-through cache keeping a fast store consistent
//!   with a slower backing store
//! - **[`GuardCache`]** memoized `find_for_inquiry` lookups with explicit
//!   staleness invalidation
//! - **[`condition`]** polymorphic conditions that round-trip through tagged
//!   `{"type", "contents"}` documents via a registry
//!
//! Decision semantics (what makes a request allowed) live outside this crate.
//!
//! ## Quick Start
//!
//! ```rust
//! use abac_store::{
//!     EnfoldCache, Effect, GuardCache, Inquiry, MemoryStorage, PatternChecker, Policy, Result,
//!     Storage,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let store = Arc::new(EnfoldCache::new(MemoryStorage::new(), MemoryStorage::new(), true)?);
//! let guard = GuardCache::new(store.clone());
//!
//! store.add(
//!     &Policy::new("readers")
//!         .with_effect(Effect::Allow)
//!         .with_subjects(["user/*"])
//!         .with_resources(["/books/**"])
//!         .with_actions(["read"]),
//! )?;
//! guard.mark_stale();
//! guard.mark_fresh();
//!
//! let checker = PatternChecker::new();
//! let inquiry = Inquiry::new("user/alice", "/books/rust/ch1", "read");
//! let candidates = guard.get(&inquiry, Some(&checker))?.unwrap_or_default();
//! assert_eq!(candidates.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod checker;
pub mod condition;
pub mod config;
pub mod error;
pub mod inquiry;
pub mod pattern;
pub mod policy;
pub mod storage;

pub use crate::cache::{EnfoldCache, GuardCache, Staleness};
pub use crate::checker::{Checker, PatternChecker, StringExactChecker};
pub use crate::condition::{Condition, ConditionDocument, ConditionRegistry, ConditionType};
pub use crate::config::CacheConfig;
pub use crate::error::{Result, StoreError};
pub use crate::inquiry::Inquiry;
pub use crate::pattern::PatternMatcher;
pub use crate::policy::{Effect, Policy, PolicyKind};
pub use crate::storage::{MemoryStorage, SqliteStorage, Storage};
