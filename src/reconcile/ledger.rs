//! Grace-window bookkeeping for confirmed writes and deletes.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::Duration;

use crate::clock::Instant;

/// Remembers when each record was last confirmed or deleted.
///
/// A mark counts as recent while `now - at < window`. Expired marks are
/// ignored by every query and removed by [`prune`](Self::prune).
#[derive(Debug, Clone)]
pub struct ConfirmationLedger<Id> {
    confirmed: HashMap<Id, Instant>,
    deleted: HashMap<Id, Instant>,
}

impl<Id: Clone + Eq + Hash> ConfirmationLedger<Id> {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            confirmed: HashMap::new(),
            deleted: HashMap::new(),
        }
    }

    /// Marks `id` as confirmed at `at`, replacing any earlier mark.
    pub fn record_confirmed(&mut self, id: Id, at: Instant) {
        self.deleted.remove(&id);
        self.confirmed.insert(id, at);
    }

    /// Marks `id` as deleted at `at` and forgets its confirmation.
    pub fn record_deleted(&mut self, id: Id, at: Instant) {
        self.confirmed.remove(&id);
        self.deleted.insert(id, at);
    }

    /// Returns `true` if `id` was confirmed within `window` before `now`.
    #[must_use]
    pub fn is_recently_confirmed(&self, id: &Id, now: Instant, window: Duration) -> bool {
        self.confirmed
            .get(id)
            .is_some_and(|at| is_recent(*at, now, window))
    }

    /// Returns `true` if `id` was deleted within `window` before `now`.
    #[must_use]
    pub fn is_recently_deleted(&self, id: &Id, now: Instant, window: Duration) -> bool {
        self.deleted
            .get(id)
            .is_some_and(|at| is_recent(*at, now, window))
    }

    /// Returns every id confirmed within `window` before `now`.
    #[must_use]
    pub fn confirmed_within(&self, now: Instant, window: Duration) -> HashSet<Id> {
        recent_ids(&self.confirmed, now, window)
    }

    /// Returns every id deleted within `window` before `now`.
    #[must_use]
    pub fn deleted_within(&self, now: Instant, window: Duration) -> HashSet<Id> {
        recent_ids(&self.deleted, now, window)
    }

    /// Drops every expired mark. Returns how many were removed.
    pub fn prune(&mut self, now: Instant, window: Duration) -> usize {
        let before = self.confirmed.len() + self.deleted.len();
        self.confirmed.retain(|_, at| is_recent(*at, now, window));
        self.deleted.retain(|_, at| is_recent(*at, now, window));
        before - self.confirmed.len() - self.deleted.len()
    }

    /// Returns the number of marks held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.confirmed.len() + self.deleted.len()
    }

    /// Returns `true` if the ledger holds no marks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.deleted.is_empty()
    }
}

impl<Id: Clone + Eq + Hash> Default for ConfirmationLedger<Id> {
    fn default() -> Self {
        Self::new()
    }
}

fn is_recent(at: Instant, now: Instant, window: Duration) -> bool {
    now.saturating_duration_since(at) < window
}

fn recent_ids<Id: Clone + Eq + Hash>(
    marks: &HashMap<Id, Instant>,
    now: Instant,
    window: Duration,
) -> HashSet<Id> {
    marks
        .iter()
        .filter(|(_, at)| is_recent(**at, now, window))
        .map(|(id, _)| id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const WINDOW: Duration = Duration::from_secs(2);

    #[rstest]
    #[case(Duration::ZERO, true)]
    #[case(Duration::from_millis(1999), true)]
    #[case(Duration::from_secs(2), false)]
    #[case(Duration::from_secs(10), false)]
    fn test_confirmation_expires_at_window(#[case] elapsed: Duration, #[case] recent: bool) {
        let start = Instant::now();
        let mut ledger = ConfirmationLedger::new();
        ledger.record_confirmed("QC-1", start);

        assert_eq!(
            ledger.is_recently_confirmed(&"QC-1", start + elapsed, WINDOW),
            recent
        );
    }

    #[rstest]
    fn test_delete_replaces_confirmation() {
        let now = Instant::now();
        let mut ledger = ConfirmationLedger::new();
        ledger.record_confirmed("a", now);
        ledger.record_deleted("a", now);

        assert!(!ledger.is_recently_confirmed(&"a", now, WINDOW));
        assert!(ledger.is_recently_deleted(&"a", now, WINDOW));
        assert_eq!(ledger.len(), 1);
    }

    #[rstest]
    fn test_within_sets_skip_expired_marks() {
        let start = Instant::now();
        let mut ledger = ConfirmationLedger::new();
        ledger.record_confirmed("old", start);
        ledger.record_confirmed("new", start + Duration::from_secs(3));
        ledger.record_deleted("gone", start + Duration::from_secs(3));

        let now = start + Duration::from_secs(4);
        assert_eq!(ledger.confirmed_within(now, WINDOW), HashSet::from(["new"]));
        assert_eq!(ledger.deleted_within(now, WINDOW), HashSet::from(["gone"]));
    }

    #[rstest]
    fn test_prune_removes_only_expired() {
        let start = Instant::now();
        let mut ledger = ConfirmationLedger::new();
        ledger.record_confirmed("old", start);
        ledger.record_deleted("older", start);
        ledger.record_confirmed("new", start + Duration::from_secs(3));

        let removed = ledger.prune(start + Duration::from_secs(4), WINDOW);

        assert_eq!(removed, 2);
        assert_eq!(ledger.len(), 1);
    }
}
