//! Write-through policy cache
//!
//! Wraps a slow backing [`Storage`] with a fast one used as cache. Mutations
//! hit the backing store first and reach the cache only if that succeeded,
//! so the cache never holds a policy the backing store rejected. Reads try
//! the cache and fall through to the backing store on an empty result; a
//! cache tier *error* is returned as-is, not treated as a miss.
//!
//! # Examples
//!
//! ```
//! use abac_store::{EnfoldCache, MemoryStorage, Policy, Storage};
//!
//! let store = EnfoldCache::new(MemoryStorage::new(), MemoryStorage::new(), false).unwrap();
//! store.add(&Policy::new("1")).unwrap();
//!
//! assert_eq!(store.cache().get_all(10, 0).unwrap(), vec![Policy::new("1")]);
//! assert_eq!(store.storage().get_all(10, 0).unwrap(), vec![Policy::new("1")]);
//! ```

use crate::checker::Checker;
use crate::config::{CacheConfig, DEFAULT_WARM_PAGE_SIZE};
use crate::error::{Result, StoreError};
use crate::inquiry::Inquiry;
use crate::policy::Policy;
use crate::storage::Storage;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Storage composed of a backing tier and a cache tier
pub struct EnfoldCache<S, C> {
    storage: S,
    cache: C,
    page_size: usize,
    /// Serializes add/update/delete so the cache never leads the backing store
    write_lock: Mutex<()>,
}

impl<S: Storage, C: Storage> EnfoldCache<S, C> {
    /// Compose `storage` (backing) and `cache`; with `init` the cache is
    /// warmed from the backing store before returning
    pub fn new(storage: S, cache: C, init: bool) -> Result<Self> {
        Self::with_page_size(storage, cache, init, DEFAULT_WARM_PAGE_SIZE)
    }

    /// Compose using validated cache settings
    pub fn with_config(storage: S, cache: C, config: &CacheConfig) -> Result<Self> {
        config.check()?;
        Self::with_page_size(storage, cache, config.warm_on_start, config.warm_page_size)
    }

    /// Compose with an explicit warm-up page size
    pub fn with_page_size(storage: S, cache: C, init: bool, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(StoreError::InvalidConfig(
                "warm-up page size must be positive".to_string(),
            ));
        }

        let enfold = EnfoldCache {
            storage,
            cache,
            page_size,
            write_lock: Mutex::new(()),
        };
        if init {
            enfold.warm()?;
        }
        Ok(enfold)
    }

    /// Backing tier
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Cache tier
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Page through the backing store until an empty page, adding every
    /// policy to the cache tier
    fn warm(&self) -> Result<usize> {
        info!("Warming policy cache (page size {})", self.page_size);

        let mut offset = 0;
        let mut loaded = 0;
        loop {
            let page = self.storage.get_all(self.page_size, offset)?;
            if page.is_empty() {
                break;
            }
            for policy in &page {
                self.cache.add(policy)?;
            }
            loaded += page.len();
            offset += self.page_size;
        }

        info!("Policy cache warmed with {} policies", loaded);
        Ok(loaded)
    }

    /// Re-sync the cache tier with the backing store
    ///
    /// Policies missing from the cache are added, stored ones replaced, and
    /// cache entries the backing store no longer has are deleted. Returns the
    /// number of policies in the backing store.
    pub fn rebuild(&self) -> Result<usize> {
        let _guard = self.write_lock.lock();
        info!("Rebuilding policy cache from backing store");

        let mut seen = HashSet::new();
        let mut offset = 0;
        loop {
            let page = self.storage.get_all(self.page_size, offset)?;
            if page.is_empty() {
                break;
            }
            for policy in &page {
                if self.cache.get(&policy.uid)?.is_some() {
                    self.cache.update(policy)?;
                } else {
                    self.cache.add(policy)?;
                }
                seen.insert(policy.uid.clone());
            }
            offset += self.page_size;
        }

        let mut orphans = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.cache.get_all(self.page_size, offset)?;
            if page.is_empty() {
                break;
            }
            orphans.extend(page.into_iter().map(|p| p.uid).filter(|uid| !seen.contains(uid)));
            offset += self.page_size;
        }
        for uid in &orphans {
            self.cache.delete(uid)?;
        }

        info!(
            "Policy cache rebuilt: {} policies, {} stale entries dropped",
            seen.len(),
            orphans.len()
        );
        Ok(seen.len())
    }

    fn cache_write(&self, op: &'static str, uid: &str, result: Result<()>) -> Result<()> {
        result.map_err(|e| {
            warn!(
                "Policy {} {} reached the backing store but not the cache: {}",
                uid, op, e
            );
            StoreError::CacheTier {
                op,
                uid: uid.to_string(),
                source: Box::new(e),
            }
        })
    }
}

impl<S: Storage, C: Storage> Storage for EnfoldCache<S, C> {
    fn add(&self, policy: &Policy) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.storage.add(policy)?;
        self.cache_write("add", &policy.uid, self.cache.add(policy))
    }

    fn get(&self, uid: &str) -> Result<Option<Policy>> {
        if let Some(policy) = self.cache.get(uid)? {
            debug!("Cache hit for policy {}", uid);
            return Ok(Some(policy));
        }
        debug!("Cache miss for policy {}, reading backing store", uid);
        self.storage.get(uid)
    }

    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>> {
        let cached = self.cache.get_all(limit, offset)?;
        if !cached.is_empty() {
            return Ok(cached);
        }
        debug!("Empty cached page at offset {}, reading backing store", offset);
        self.storage.get_all(limit, offset)
    }

    fn find_for_inquiry(
        &self,
        inquiry: &Inquiry,
        checker: Option<&dyn Checker>,
    ) -> Result<Vec<Policy>> {
        let cached = self.cache.find_for_inquiry(inquiry, checker)?;
        if !cached.is_empty() {
            return Ok(cached);
        }
        debug!("No cached candidates, reading backing store");
        self.storage.find_for_inquiry(inquiry, checker)
    }

    fn update(&self, policy: &Policy) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.storage.update(policy)?;
        self.cache_write("update", &policy.uid, self.cache.update(policy))
    }

    fn delete(&self, uid: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.storage.delete(uid)?;
        self.cache_write("delete", uid, self.cache.delete(uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn filled(uids: &[&str]) -> MemoryStorage {
        let store = MemoryStorage::new();
        for uid in uids {
            store.add(&Policy::new(*uid)).unwrap();
        }
        store
    }

    fn uids(policies: Vec<Policy>) -> Vec<String> {
        policies.into_iter().map(|p| p.uid).collect()
    }

    #[test]
    fn test_init_false_leaves_cache_empty() {
        let ec = EnfoldCache::new(filled(&["1", "2"]), MemoryStorage::new(), false).unwrap();
        assert!(ec.cache().is_empty());
    }

    #[test]
    fn test_warm_with_multiple_pages_loads_everything() {
        // 7 policies over pages of 3: offsets 0, 3, 6, 9(empty)
        let back = filled(&["1", "2", "3", "4", "5", "6", "7"]);
        let ec = EnfoldCache::with_page_size(back, MemoryStorage::new(), true, 3).unwrap();
        assert_eq!(
            uids(ec.cache().get_all(100, 0).unwrap()),
            vec!["1", "2", "3", "4", "5", "6", "7"]
        );
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = EnfoldCache::with_page_size(MemoryStorage::new(), MemoryStorage::new(), true, 0)
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_warm_fails_on_prefilled_conflict() {
        let err = EnfoldCache::new(filled(&["1"]), filled(&["1"]), true)
            .err()
            .unwrap();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_reads_prefer_cache() {
        let back = filled(&["1", "2"]);
        let cache = filled(&["1"]);
        let ec = EnfoldCache::new(back, cache, false).unwrap();

        // cache hit
        assert_eq!(ec.get("1").unwrap(), Some(Policy::new("1")));
        // miss falls through, without writing back
        assert_eq!(ec.get("2").unwrap(), Some(Policy::new("2")));
        assert_eq!(ec.cache().get("2").unwrap(), None);
        // non-empty cache page wins even though the backing store has more
        assert_eq!(uids(ec.get_all(10, 0).unwrap()), vec!["1"]);
        // empty cache page falls through
        assert_eq!(uids(ec.get_all(10, 1).unwrap()), vec!["2"]);
    }

    #[test]
    fn test_update_and_delete_reach_both_tiers() {
        let ec = EnfoldCache::new(MemoryStorage::new(), MemoryStorage::new(), false).unwrap();
        ec.add(&Policy::new("1")).unwrap();

        let described = Policy::new("1").with_description("changed");
        ec.update(&described).unwrap();
        assert_eq!(ec.storage().get("1").unwrap(), Some(described.clone()));
        assert_eq!(ec.cache().get("1").unwrap(), Some(described));

        ec.delete("1").unwrap();
        assert!(ec.storage().is_empty());
        assert!(ec.cache().is_empty());
    }

    #[test]
    fn test_rebuild_resyncs_cache() {
        let back = filled(&["1", "2", "3"]);
        let cache = filled(&["2", "9"]);
        cache.update(&Policy::new("2").with_description("stale")).unwrap();
        let ec = EnfoldCache::with_page_size(back, cache, false, 2).unwrap();

        assert_eq!(ec.rebuild().unwrap(), 3);
        assert_eq!(ec.cache().get("9").unwrap(), None);
        assert_eq!(ec.cache().get("2").unwrap(), Some(Policy::new("2")));
        let mut cached = uids(ec.cache().get_all(10, 0).unwrap());
        cached.sort();
        assert_eq!(cached, vec!["1", "2", "3"]);
    }
}
