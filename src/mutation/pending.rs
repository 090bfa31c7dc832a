use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Instant;
use crate::entity::Entity;
use crate::store::EntityStore;

/// Everything needed to settle one optimistic mutation.
///
/// Lives exactly as long as the remote call it belongs to.
#[derive(Debug, Clone)]
pub(crate) struct PendingMutation<T: Entity> {
    pub(crate) entity_id: T::Id,
    pub(crate) snapshot_before_mutation: T,
    pub(crate) expected_state: T,
    pub(crate) started_at: Instant,
}

impl<T: Entity> PendingMutation<T> {
    pub(crate) const fn new(
        entity_id: T::Id,
        snapshot_before_mutation: T,
        expected_state: T,
        started_at: Instant,
    ) -> Self {
        Self {
            entity_id,
            snapshot_before_mutation,
            expected_state,
            started_at,
        }
    }

    /// Picks the value to keep after the remote accepted the change.
    ///
    /// An authoritative value for a different record is not trusted; the
    /// expected state is kept instead and the mismatch is reported.
    pub(crate) fn settle(self, authoritative: Option<T>) -> (T, Option<T::Id>) {
        match authoritative {
            Some(value) if *value.id() == self.entity_id => (value, None),
            Some(value) => (self.expected_state, Some(value.id().clone())),
            None => (self.expected_state, None),
        }
    }

    pub(crate) fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

enum Undo<T> {
    Restore(T),
    Remove,
}

/// Undoes a tentative write if its mutation is dropped before settling.
///
/// Armed right after the tentative write and disarmed once the outcome has
/// been written. Must be declared after the busy permit so that it runs
/// while the id is still held.
#[must_use]
pub(crate) struct SettleGuard<'a, T: Entity> {
    store: &'a Mutex<EntityStore<T>>,
    entity_id: T::Id,
    undo: Option<Undo<T>>,
}

impl<'a, T: Entity> SettleGuard<'a, T> {
    /// Puts `snapshot` back under `entity_id` unless disarmed.
    pub(crate) const fn restore(store: &'a Mutex<EntityStore<T>>, entity_id: T::Id, snapshot: T) -> Self {
        Self {
            store,
            entity_id,
            undo: Some(Undo::Restore(snapshot)),
        }
    }

    /// Removes `entity_id` unless disarmed.
    pub(crate) const fn remove(store: &'a Mutex<EntityStore<T>>, entity_id: T::Id) -> Self {
        Self {
            store,
            entity_id,
            undo: Some(Undo::Remove),
        }
    }

    pub(crate) fn disarm(mut self) {
        self.undo = None;
    }
}

impl<T: Entity> Drop for SettleGuard<'_, T> {
    fn drop(&mut self) {
        let Some(undo) = self.undo.take() else {
            return;
        };
        let mut store = self.store.lock();
        match undo {
            Undo::Restore(snapshot) => {
                store.put(self.entity_id.clone(), snapshot);
            }
            Undo::Remove => {
                store.remove(&self.entity_id);
            }
        }
        drop(store);
        tracing::warn!(
            kind = T::KIND,
            entity_id = %self.entity_id,
            "mutation abandoned before settling; tentative state undone"
        );
    }
}
