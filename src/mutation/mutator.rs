use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{PendingMutation, SettleGuard};
use crate::clock::Clock;
use crate::entity::Entity;
use crate::error::ReconcileError;
use crate::guard::ConcurrencyGuard;
use crate::reconcile::ConfirmationLedger;
use crate::remote::RemoteError;
use crate::store::EntityStore;

/// Applies tentative changes, calls the remote and settles the outcome.
///
/// Shares the store, the guard and the ledger with the engine that owns it.
/// Store and ledger locks are taken in that order and never held across
/// `.await`.
pub struct OptimisticMutator<T: Entity> {
    store: Arc<Mutex<EntityStore<T>>>,
    guard: ConcurrencyGuard<T::Id>,
    ledger: Arc<Mutex<ConfirmationLedger<T::Id>>>,
    clock: Arc<dyn Clock>,
}

impl<T: Entity> Clone for OptimisticMutator<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            guard: self.guard.clone(),
            ledger: Arc::clone(&self.ledger),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<T: Entity> std::fmt::Debug for OptimisticMutator<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("OptimisticMutator")
            .field("kind", &T::KIND)
            .field("in_flight", &self.guard.in_flight_count())
            .finish_non_exhaustive()
    }
}

impl<T: Entity> OptimisticMutator<T> {
    /// Creates a mutator over shared engine state.
    #[must_use]
    pub fn new(
        store: Arc<Mutex<EntityStore<T>>>,
        guard: ConcurrencyGuard<T::Id>,
        ledger: Arc<Mutex<ConfirmationLedger<T::Id>>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            guard,
            ledger,
            clock,
        }
    }

    /// Applies `transition` to record `id` now and settles it with
    /// `remote_call`.
    ///
    /// `remote_call` receives the record as it was before the transition.
    /// It returns the authoritative record, or `None` if the server sent no
    /// body.
    ///
    /// On success the store holds the authoritative value (or the tentative
    /// one) and `id` is marked recently confirmed. On failure, or if the
    /// returned future is dropped before the call resolves, the store holds
    /// exactly the value it held before the call.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::Busy`] if a mutation is already in flight for `id`
    /// - [`ReconcileError::NotFound`] if `id` is not in the store
    /// - [`ReconcileError::RemoteFailure`] if `remote_call` failed
    pub async fn apply<Transition, Call, Fut>(
        &self,
        id: &T::Id,
        transition: Transition,
        remote_call: Call,
    ) -> Result<T, ReconcileError>
    where
        Transition: FnOnce(&T) -> T,
        Call: FnOnce(&T) -> Fut,
        Fut: Future<Output = Result<Option<T>, RemoteError>>,
    {
        let _permit = self
            .guard
            .try_acquire_permit(id.clone())
            .ok_or_else(|| busy::<T>(id))?;

        let pending = {
            let mut store = self.store.lock();
            let snapshot = store.get(id).cloned().ok_or_else(|| not_found::<T>(id))?;
            let tentative = transition(&snapshot);
            store.put(id.clone(), tentative.clone());
            PendingMutation::new(id.clone(), snapshot, tentative, self.clock.now())
        };
        let settle_guard = SettleGuard::restore(
            &self.store,
            id.clone(),
            pending.snapshot_before_mutation.clone(),
        );
        tracing::debug!(kind = T::KIND, entity_id = %id, "applied tentative state");

        let result = remote_call(&pending.snapshot_before_mutation).await;
        settle_guard.disarm();
        match result {
            Ok(authoritative) => Ok(self.confirm(pending, authoritative)),
            Err(error) => Err(self.roll_back(pending, error)),
        }
    }

    fn confirm(&self, pending: PendingMutation<T>, authoritative: Option<T>) -> T {
        let now = self.clock.now();
        let elapsed = pending.elapsed(now);
        let id = pending.entity_id.clone();
        let (value, mismatch) = pending.settle(authoritative);
        if let Some(returned) = mismatch {
            tracing::warn!(
                kind = T::KIND,
                entity_id = %id,
                returned_id = %returned,
                "remote returned a different record; keeping expected state"
            );
        }

        let mut store = self.store.lock();
        store.put(id.clone(), value.clone());
        self.ledger.lock().record_confirmed(id.clone(), now);
        drop(store);

        tracing::info!(
            kind = T::KIND,
            entity_id = %id,
            elapsed = ?elapsed,
            "mutation confirmed"
        );
        value
    }

    fn roll_back(&self, pending: PendingMutation<T>, error: RemoteError) -> ReconcileError {
        let id = pending.entity_id;
        self.store
            .lock()
            .put(id.clone(), pending.snapshot_before_mutation);
        tracing::warn!(kind = T::KIND, entity_id = %id, error = %error, "mutation rolled back");
        ReconcileError::RemoteFailure {
            kind: T::KIND,
            id: id.to_string(),
            source: error,
        }
    }

    /// Inserts `draft` tentatively and settles it with `remote_create`.
    ///
    /// The server may answer with a record under a new id; the temporary key
    /// is then replaced. On failure, or if the returned future is dropped
    /// before the call resolves, the draft is removed again.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::Busy`] if the draft id is in flight
    /// - [`ReconcileError::AlreadyExists`] if the draft id is in the store, or
    ///   the server assigned an id that is already held locally or in flight.
    ///   In the second case the draft is removed and the existing record is
    ///   left for the next refresh to reconcile.
    /// - [`ReconcileError::RemoteFailure`] if `remote_create` failed
    pub async fn create<Call, Fut>(&self, draft: T, remote_create: Call) -> Result<T, ReconcileError>
    where
        Call: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<Option<T>, RemoteError>>,
    {
        let draft_id = draft.id().clone();
        let _permit = self
            .guard
            .try_acquire_permit(draft_id.clone())
            .ok_or_else(|| busy::<T>(&draft_id))?;

        {
            let mut store = self.store.lock();
            if store.contains(&draft_id) {
                return Err(ReconcileError::AlreadyExists {
                    kind: T::KIND,
                    id: draft_id.to_string(),
                });
            }
            store.put(draft_id.clone(), draft.clone());
        }
        let settle_guard = SettleGuard::remove(&self.store, draft_id.clone());
        tracing::debug!(kind = T::KIND, entity_id = %draft_id, "inserted tentative record");

        let result = remote_create(draft.clone()).await;
        settle_guard.disarm();
        match result {
            Ok(authoritative) => {
                let created = authoritative.unwrap_or(draft);
                let created_id = created.id().clone();
                let mut store = self.store.lock();
                if created_id != draft_id {
                    store.remove(&draft_id);
                    if store.contains(&created_id) || self.guard.is_busy(&created_id) {
                        drop(store);
                        tracing::warn!(
                            kind = T::KIND,
                            entity_id = %created_id,
                            draft_id = %draft_id,
                            "server assigned an id already held locally; draft discarded"
                        );
                        return Err(ReconcileError::AlreadyExists {
                            kind: T::KIND,
                            id: created_id.to_string(),
                        });
                    }
                }
                store.put(created_id.clone(), created.clone());
                self.ledger.lock().record_confirmed(created_id.clone(), self.clock.now());
                drop(store);

                tracing::info!(
                    kind = T::KIND,
                    entity_id = %created_id,
                    draft_id = %draft_id,
                    "create confirmed"
                );
                Ok(created)
            }
            Err(error) => {
                self.store.lock().remove(&draft_id);
                tracing::warn!(
                    kind = T::KIND,
                    entity_id = %draft_id,
                    error = %error,
                    "create rolled back"
                );
                Err(ReconcileError::RemoteFailure {
                    kind: T::KIND,
                    id: draft_id.to_string(),
                    source: error,
                })
            }
        }
    }

    /// Deletes record `id` once `remote_delete` confirms. Not optimistic.
    ///
    /// A tombstone keeps stale server lists from resurrecting the record
    /// during the grace window.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::Busy`] if a mutation is already in flight for `id`
    /// - [`ReconcileError::NotFound`] if `id` is not in the store
    /// - [`ReconcileError::RemoteFailure`] if `remote_delete` failed; the
    ///   record is untouched
    pub async fn delete<Call, Fut>(&self, id: &T::Id, remote_delete: Call) -> Result<T, ReconcileError>
    where
        Call: FnOnce(&T) -> Fut,
        Fut: Future<Output = Result<(), RemoteError>>,
    {
        let _permit = self
            .guard
            .try_acquire_permit(id.clone())
            .ok_or_else(|| busy::<T>(id))?;

        let current = self
            .store
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found::<T>(id))?;

        if let Err(error) = remote_delete(&current).await {
            tracing::warn!(kind = T::KIND, entity_id = %id, error = %error, "delete failed");
            return Err(ReconcileError::RemoteFailure {
                kind: T::KIND,
                id: id.to_string(),
                source: error,
            });
        }

        let mut store = self.store.lock();
        let removed = store.remove(id).unwrap_or(current);
        self.ledger.lock().record_deleted(id.clone(), self.clock.now());
        drop(store);

        tracing::info!(kind = T::KIND, entity_id = %id, "delete confirmed");
        Ok(removed)
    }
}

fn busy<T: Entity>(id: &T::Id) -> ReconcileError {
    ReconcileError::Busy {
        kind: T::KIND,
        id: id.to_string(),
    }
}

fn not_found<T: Entity>(id: &T::Id) -> ReconcileError {
    ReconcileError::NotFound {
        kind: T::KIND,
        id: id.to_string(),
    }
}
