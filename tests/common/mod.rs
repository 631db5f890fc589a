//! Scriptable storage double shared by the integration tests

#![allow(dead_code)]

use abac_store::{Checker, Inquiry, MemoryStorage, Policy, Result, Storage, StoreError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

type ErrorFactory = Box<dyn Fn(&Policy) -> StoreError + Send + Sync>;

/// Memory storage with injectable failures, scripted pages and call counters
#[derive(Default)]
pub struct MockStorage {
    pub inner: MemoryStorage,
    add_error: Mutex<Option<ErrorFactory>>,
    pages: Mutex<Option<VecDeque<Vec<Policy>>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    pub get_all_calls: Mutex<Vec<(usize, usize)>>,
    pub find_calls: AtomicUsize,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `get_all` with these pages in turn, then with empty pages
    pub fn with_pages(pages: Vec<Vec<Policy>>) -> Self {
        let mock = Self::new();
        *mock.pages.lock() = Some(pages.into());
        mock
    }

    /// Make every subsequent `add` fail
    pub fn fail_add_with<F>(&self, make: F)
    where
        F: Fn(&Policy) -> StoreError + Send + Sync + 'static,
    {
        *self.add_error.lock() = Some(Box::new(make));
    }

    /// Make every subsequent read fail with a backend error
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent `update` and `delete` fail with a backend error
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn finds(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("read refused".to_string()));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write refused".to_string()));
        }
        Ok(())
    }
}

impl Storage for MockStorage {
    fn add(&self, policy: &Policy) -> Result<()> {
        if let Some(make) = self.add_error.lock().as_ref() {
            return Err(make(policy));
        }
        self.inner.add(policy)
    }

    fn get(&self, uid: &str) -> Result<Option<Policy>> {
        self.check_reads()?;
        self.inner.get(uid)
    }

    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>> {
        self.check_reads()?;
        self.get_all_calls.lock().push((limit, offset));
        if let Some(pages) = self.pages.lock().as_mut() {
            return Ok(pages.pop_front().unwrap_or_default());
        }
        self.inner.get_all(limit, offset)
    }

    fn find_for_inquiry(
        &self,
        inquiry: &Inquiry,
        checker: Option<&dyn Checker>,
    ) -> Result<Vec<Policy>> {
        self.check_reads()?;
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_for_inquiry(inquiry, checker)
    }

    fn update(&self, policy: &Policy) -> Result<()> {
        self.check_writes()?;
        self.inner.update(policy)
    }

    fn delete(&self, uid: &str) -> Result<()> {
        self.check_writes()?;
        self.inner.delete(uid)
    }
}

pub fn uids(policies: &[Policy]) -> Vec<&str> {
    policies.iter().map(|p| p.uid.as_str()).collect()
}
