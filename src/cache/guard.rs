//! Memoization of `find_for_inquiry` results
//!
//! Results are kept in an LRU table keyed by (inquiry, checker id). The cache
//! starts stale: while stale, [`GuardCache::get`] returns `None` without
//! looking at the table, and the caller must ask the storage itself.
//!
//! Whoever mutates the policy set calls [`Staleness::mark_stale`]. That bumps
//! a generation counter, so every entry memoized before the signal is ignored
//! from then on, even after [`Staleness::mark_fresh`]; the table is never
//! walked or cleared.

use crate::checker::Checker;
use crate::config::{CacheConfig, DEFAULT_GUARD_CAPACITY};
use crate::error::{Result, StoreError};
use crate::inquiry::Inquiry;
use crate::policy::Policy;
use crate::storage::Storage;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info};

/// Cache key for a decision lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DecisionKey {
    inquiry: String,
    checker: Option<String>,
}

impl DecisionKey {
    fn new(inquiry: &Inquiry, checker: Option<&dyn Checker>) -> Self {
        DecisionKey {
            inquiry: inquiry.cache_key(),
            checker: checker.map(|c| c.id().to_string()),
        }
    }
}

struct Memo {
    generation: u64,
    policies: Vec<Policy>,
}

struct GuardState {
    stale: bool,
    generation: u64,
    table: LruCache<DecisionKey, Memo>,
}

/// Handle for raising and clearing the staleness signal
#[derive(Clone)]
pub struct Staleness {
    state: Arc<Mutex<GuardState>>,
}

impl Staleness {
    /// The policy set changed: distrust every memoized result
    pub fn mark_stale(&self) {
        let mut state = self.state.lock();
        state.stale = true;
        state.generation += 1;
        info!("Decision cache marked stale (generation {})", state.generation);
    }

    /// The policy set is settled again: start memoizing
    pub fn mark_fresh(&self) {
        let mut state = self.state.lock();
        state.stale = false;
        info!("Decision cache marked fresh (generation {})", state.generation);
    }

    pub fn is_stale(&self) -> bool {
        self.state.lock().stale
    }
}

/// Memoizing front for `Storage::find_for_inquiry`
pub struct GuardCache<S> {
    storage: S,
    staleness: Staleness,
    capacity: NonZeroUsize,
}

impl<S: Storage> GuardCache<S> {
    /// Cache with the default capacity
    pub fn new(storage: S) -> Self {
        let capacity = NonZeroUsize::new(DEFAULT_GUARD_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self::build(storage, capacity)
    }

    /// Cache holding at most `capacity` results
    pub fn with_capacity(storage: S, capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            StoreError::InvalidConfig("decision cache capacity must be positive".to_string())
        })?;
        Ok(Self::build(storage, capacity))
    }

    /// Cache sized from validated settings
    pub fn with_config(storage: S, config: &CacheConfig) -> Result<Self> {
        config.check()?;
        Self::with_capacity(storage, config.guard_capacity)
    }

    fn build(storage: S, capacity: NonZeroUsize) -> Self {
        GuardCache {
            storage,
            staleness: Staleness {
                state: Arc::new(Mutex::new(GuardState {
                    stale: true,
                    generation: 0,
                    table: LruCache::new(capacity),
                })),
            },
            capacity,
        }
    }

    /// Memoized candidates for `(inquiry, checker)`
    ///
    /// Returns `Ok(None)` while stale. Otherwise returns the memoized result,
    /// computing it through the storage on a miss. A storage error is returned
    /// and nothing is memoized.
    pub fn get(
        &self,
        inquiry: &Inquiry,
        checker: Option<&dyn Checker>,
    ) -> Result<Option<Vec<Policy>>> {
        let key = DecisionKey::new(inquiry, checker);

        let generation = {
            let mut state = self.staleness.state.lock();
            if state.stale {
                return Ok(None);
            }
            let current = state.generation;
            if let Some(memo) = state.table.get(&key) {
                if memo.generation == current {
                    return Ok(Some(memo.policies.clone()));
                }
            }
            current
        };

        // Computed without holding the lock; a signal raised meanwhile
        // prevents the result from being memoized
        debug!("Decision cache miss, consulting storage");
        let policies = self.storage.find_for_inquiry(inquiry, checker)?;

        let mut state = self.staleness.state.lock();
        if !state.stale && state.generation == generation {
            state.table.put(
                key,
                Memo {
                    generation,
                    policies: policies.clone(),
                },
            );
        }
        Ok(Some(policies))
    }

    /// Memoized candidates, or a direct storage lookup while stale
    pub fn find_for_inquiry(
        &self,
        inquiry: &Inquiry,
        checker: Option<&dyn Checker>,
    ) -> Result<Vec<Policy>> {
        match self.get(inquiry, checker)? {
            Some(policies) => Ok(policies),
            None => self.storage.find_for_inquiry(inquiry, checker),
        }
    }

    /// Handle to share with whatever mutates the policy set
    pub fn staleness(&self) -> Staleness {
        self.staleness.clone()
    }

    pub fn mark_stale(&self) {
        self.staleness.mark_stale();
    }

    pub fn mark_fresh(&self) {
        self.staleness.mark_fresh();
    }

    pub fn is_stale(&self) -> bool {
        self.staleness.is_stale()
    }

    /// Entries currently held, including ones outdated by a staleness signal
    pub fn len(&self) -> usize {
        self.staleness.state.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::StringExactChecker;
    use crate::storage::MemoryStorage;

    fn guard() -> GuardCache<MemoryStorage> {
        let store = MemoryStorage::new();
        store
            .add(
                &Policy::new("1")
                    .with_subjects(["alice"])
                    .with_resources(["book"])
                    .with_actions(["read"]),
            )
            .unwrap();
        GuardCache::with_capacity(store, 2).unwrap()
    }

    #[test]
    fn test_starts_stale() {
        let g = guard();
        let inquiry = Inquiry::new("alice", "book", "read");
        assert!(g.is_stale());
        assert_eq!(g.get(&inquiry, None).unwrap(), None);
        assert_eq!(g.get(&inquiry, None).unwrap(), None);
        assert!(g.is_empty());
    }

    #[test]
    fn test_fresh_memoizes() {
        let g = guard();
        g.mark_fresh();
        let inquiry = Inquiry::new("alice", "book", "read");

        let first = g.get(&inquiry, Some(&StringExactChecker)).unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(g.len(), 1);

        // a policy added behind the cache's back is not seen until stale
        g.storage().add(&Policy::new("2")).unwrap();
        assert_eq!(g.get(&inquiry, None).unwrap().unwrap().len(), 2);
        assert_eq!(g.get(&inquiry, Some(&StringExactChecker)).unwrap(), Some(first));
    }

    #[test]
    fn test_stale_signal_hides_old_entries_after_refresh() {
        let g = guard();
        g.mark_fresh();
        let inquiry = Inquiry::new("alice", "book", "read");
        assert_eq!(g.get(&inquiry, None).unwrap().unwrap().len(), 1);

        g.storage().add(&Policy::new("2")).unwrap();
        g.mark_stale();
        assert_eq!(g.get(&inquiry, None).unwrap(), None);

        g.mark_fresh();
        assert_eq!(g.get(&inquiry, None).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_lru_eviction() {
        let g = guard();
        g.mark_fresh();
        for subject in ["a", "b", "c"] {
            g.get(&Inquiry::new(subject, "book", "read"), None).unwrap();
        }
        assert_eq!(g.len(), 2);
        assert_eq!(g.capacity(), 2);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = GuardCache::with_capacity(MemoryStorage::new(), 0).err().unwrap();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_shared_handle() {
        let g = guard();
        let handle = g.staleness();
        handle.mark_fresh();
        assert!(!g.is_stale());
        handle.mark_stale();
        assert!(g.is_stale());
    }

    #[test]
    fn test_find_for_inquiry_falls_back_while_stale() {
        let g = guard();
        let inquiry = Inquiry::new("alice", "book", "read");
        assert_eq!(g.find_for_inquiry(&inquiry, None).unwrap().len(), 1);
        assert!(g.is_empty());
    }
}
