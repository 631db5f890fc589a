//! Policy storage contract and backends
//!
//! Every backend implements [`Storage`]:
//! - `add` rejects a duplicate UID with `PolicyExists` and leaves the store untouched
//! - `get` returns `Ok(None)` on a miss
//! - `get_all` pages in the backend's natural insertion order; past the end is empty
//! - `find_for_inquiry` returns candidates, filtered by the checker if one is given
//! - `update` replaces the policy with the same UID
//! - `delete` of an absent UID is not an error

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::checker::Checker;
use crate::error::Result;
use crate::inquiry::Inquiry;
use crate::policy::Policy;
use std::sync::Arc;

/// Persistence contract shared by all policy backends and cache wrappers
pub trait Storage: Send + Sync {
    /// Insert a new policy
    fn add(&self, policy: &Policy) -> Result<()>;

    /// Fetch a policy by UID
    fn get(&self, uid: &str) -> Result<Option<Policy>>;

    /// Fetch a page of policies
    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>>;

    /// Candidate policies for an inquiry
    ///
    /// Without a checker every stored policy is a candidate.
    fn find_for_inquiry(
        &self,
        inquiry: &Inquiry,
        checker: Option<&dyn Checker>,
    ) -> Result<Vec<Policy>>;

    /// Replace the stored policy sharing `policy.uid`
    fn update(&self, policy: &Policy) -> Result<()>;

    /// Remove a policy by UID
    fn delete(&self, uid: &str) -> Result<()>;
}

macro_rules! forward_storage {
    ($($ptr:ty),*) => {$(
        impl<S: Storage + ?Sized> Storage for $ptr {
            fn add(&self, policy: &Policy) -> Result<()> {
                (**self).add(policy)
            }

            fn get(&self, uid: &str) -> Result<Option<Policy>> {
                (**self).get(uid)
            }

            fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>> {
                (**self).get_all(limit, offset)
            }

            fn find_for_inquiry(
                &self,
                inquiry: &Inquiry,
                checker: Option<&dyn Checker>,
            ) -> Result<Vec<Policy>> {
                (**self).find_for_inquiry(inquiry, checker)
            }

            fn update(&self, policy: &Policy) -> Result<()> {
                (**self).update(policy)
            }

            fn delete(&self, uid: &str) -> Result<()> {
                (**self).delete(uid)
            }
        }
    )*};
}

forward_storage!(Arc<S>, Box<S>, &S);

/// Keep the policies a checker accepts (all of them without a checker)
pub(crate) fn filter_candidates<'a, I>(
    policies: I,
    inquiry: &Inquiry,
    checker: Option<&dyn Checker>,
) -> Vec<Policy>
where
    I: IntoIterator<Item = &'a Policy>,
{
    policies
        .into_iter()
        .filter(|p| checker.map_or(true, |c| c.fits(p, inquiry)))
        .cloned()
        .collect()
}
