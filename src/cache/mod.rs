//! Caching layers over [`Storage`](crate::Storage)
//!
//! - [`EnfoldCache`] - write-through mirror of a backing store in a faster store
//! - [`GuardCache`] - memoized `find_for_inquiry` results with a staleness signal
//!
//! The two are independent. When both are used, wire the mutation path to
//! [`Staleness::mark_stale`].

mod enfold;
mod guard;

pub use enfold::EnfoldCache;
pub use guard::{GuardCache, Staleness};
