//! Per-identifier mutual exclusion for in-flight mutations.
//!
//! [`ConcurrencyGuard`] prevents two mutations from racing on the same
//! record (say, "approve" and "reject" fired in quick succession on one
//! quality check). A second action on a busy identifier is rejected outright;
//! it is never queued, because queuing would silently reorder user intent.
//!
//! Prefer [`ConcurrencyGuard::try_acquire_permit`]: the returned
//! [`BusyPermit`] releases the identifier when dropped, so the release happens
//! exactly once on every exit path, including errors, panics and a dropped
//! future.
//!
//! # Examples
//!
//! ```rust
//! use reconciler::guard::ConcurrencyGuard;
//!
//! let guard = ConcurrencyGuard::new();
//!
//! let permit = guard.try_acquire_permit("QC-9922".to_string()).unwrap();
//! assert!(guard.is_busy(&"QC-9922".to_string()));
//! assert!(guard.try_acquire_permit("QC-9922".to_string()).is_none());
//!
//! drop(permit);
//! assert!(!guard.is_busy(&"QC-9922".to_string()));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

/// Tracks which identifiers currently have a mutation in flight.
///
/// Clones share the same state.
#[derive(Debug)]
pub struct ConcurrencyGuard<Id> {
    busy: Arc<Mutex<HashSet<Id>>>,
}

impl<Id> Clone for ConcurrencyGuard<Id> {
    fn clone(&self) -> Self {
        Self {
            busy: Arc::clone(&self.busy),
        }
    }
}

impl<Id: Clone + Eq + Hash> ConcurrencyGuard<Id> {
    /// Creates a guard with nothing in flight.
    #[must_use]
    pub fn new() -> Self {
        Self {
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Marks `id` busy if nothing is in flight for it.
    ///
    /// Returns `false` (and changes nothing) if `id` is already busy. Every
    /// `true` must be paired with exactly one [`release`](Self::release).
    pub fn try_acquire(&self, id: &Id) -> bool {
        self.busy.lock().insert(id.clone())
    }

    /// Clears the busy mark for `id`.
    ///
    /// Returns `false` if `id` was not busy.
    pub fn release(&self, id: &Id) -> bool {
        self.busy.lock().remove(id)
    }

    /// Scoped variant of [`try_acquire`](Self::try_acquire).
    ///
    /// Returns `None` if `id` is already busy.
    #[must_use]
    pub fn try_acquire_permit(&self, id: Id) -> Option<BusyPermit<Id>> {
        if self.try_acquire(&id) {
            Some(BusyPermit {
                guard: self.clone(),
                id,
            })
        } else {
            None
        }
    }

    /// Returns `true` if a mutation is in flight for `id`.
    #[must_use]
    pub fn is_busy(&self, id: &Id) -> bool {
        self.busy.lock().contains(id)
    }

    /// Returns the identifiers currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> HashSet<Id> {
        self.busy.lock().clone()
    }

    /// Returns the number of identifiers currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.busy.lock().len()
    }
}

impl<Id: Clone + Eq + Hash> Default for ConcurrencyGuard<Id> {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases its identifier when dropped.
#[must_use = "dropping the permit immediately releases the identifier"]
pub struct BusyPermit<Id: Clone + Eq + Hash> {
    guard: ConcurrencyGuard<Id>,
    id: Id,
}

impl<Id: Clone + Eq + Hash> BusyPermit<Id> {
    /// Returns the identifier this permit holds.
    pub const fn id(&self) -> &Id {
        &self.id
    }
}

impl<Id: Clone + Eq + Hash> Drop for BusyPermit<Id> {
    fn drop(&mut self) {
        self.guard.release(&self.id);
    }
}

impl<Id: Clone + Eq + Hash + fmt::Debug> fmt::Debug for BusyPermit<Id> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BusyPermit")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_try_acquire_rejects_second_caller() {
        let guard = ConcurrencyGuard::new();
        assert!(guard.try_acquire(&"a"));
        assert!(!guard.try_acquire(&"a"));
        assert!(guard.try_acquire(&"b"));
        assert_eq!(guard.in_flight_count(), 2);
    }

    #[rstest]
    fn test_release_allows_reacquire() {
        let guard = ConcurrencyGuard::new();
        assert!(guard.try_acquire(&"a"));
        assert!(guard.release(&"a"));
        assert!(!guard.release(&"a"));
        assert!(guard.try_acquire(&"a"));
    }

    #[rstest]
    fn test_permit_releases_on_drop() {
        let guard = ConcurrencyGuard::new();
        {
            let permit = guard.try_acquire_permit("a").unwrap();
            assert_eq!(*permit.id(), "a");
            assert!(guard.is_busy(&"a"));
        }
        assert!(!guard.is_busy(&"a"));
    }

    #[rstest]
    fn test_permit_releases_on_panic() {
        let guard = ConcurrencyGuard::new();
        let shared = guard.clone();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _permit = shared.try_acquire_permit("a").unwrap();
            panic!("remote call exploded");
        }));

        assert!(result.is_err());
        assert!(!guard.is_busy(&"a"));
    }

    #[rstest]
    fn test_in_flight_lists_busy_ids() {
        let guard = ConcurrencyGuard::new();
        let _first = guard.try_acquire_permit("a").unwrap();
        let _second = guard.try_acquire_permit("b").unwrap();

        let in_flight = guard.in_flight();
        assert!(in_flight.contains(&"a"));
        assert!(in_flight.contains(&"b"));
        assert_eq!(in_flight.len(), 2);
    }
}
