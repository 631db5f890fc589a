//! In-process policy storage
//!
//! Policies are kept in insertion order behind a `parking_lot::RwLock`.
//! Used standalone and as the fast tier of [`EnfoldCache`](crate::EnfoldCache).

use super::{filter_candidates, Storage};
use crate::checker::Checker;
use crate::error::{Result, StoreError};
use crate::inquiry::Inquiry;
use crate::policy::Policy;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

#[derive(Default)]
struct Table {
    /// UIDs in insertion order
    order: Vec<String>,
    policies: HashMap<String, Policy>,
}

/// Ordered in-memory policy table
#[derive(Default)]
pub struct MemoryStorage {
    table: RwLock<Table>,
}

impl MemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored policies
    pub fn len(&self) -> usize {
        self.table.read().order.len()
    }

    /// Whether the storage is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn add(&self, policy: &Policy) -> Result<()> {
        let mut table = self.table.write();
        if table.policies.contains_key(&policy.uid) {
            return Err(StoreError::PolicyExists(policy.uid.clone()));
        }
        table.order.push(policy.uid.clone());
        table.policies.insert(policy.uid.clone(), policy.clone());
        debug!("Added policy {}", policy.uid);
        Ok(())
    }

    fn get(&self, uid: &str) -> Result<Option<Policy>> {
        Ok(self.table.read().policies.get(uid).cloned())
    }

    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>> {
        let table = self.table.read();
        Ok(table
            .order
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|uid| table.policies.get(uid).cloned())
            .collect())
    }

    fn find_for_inquiry(
        &self,
        inquiry: &Inquiry,
        checker: Option<&dyn Checker>,
    ) -> Result<Vec<Policy>> {
        let table = self.table.read();
        let ordered = table.order.iter().filter_map(|uid| table.policies.get(uid));
        Ok(filter_candidates(ordered, inquiry, checker))
    }

    /// Replace in place, keeping the original position; an unknown UID is ignored
    fn update(&self, policy: &Policy) -> Result<()> {
        let mut table = self.table.write();
        if let Some(stored) = table.policies.get_mut(&policy.uid) {
            *stored = policy.clone();
            debug!("Updated policy {}", policy.uid);
        }
        Ok(())
    }

    fn delete(&self, uid: &str) -> Result<()> {
        let mut table = self.table.write();
        if table.policies.remove(uid).is_some() {
            table.order.retain(|stored| stored != uid);
            debug!("Deleted policy {}", uid);
        }
        Ok(())
    }
}
