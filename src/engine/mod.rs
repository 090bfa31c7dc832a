//! The per-kind engine UI code talks to.
//!
//! An [`Engine<T>`] owns one entity kind: its store, its in-flight guard, its
//! confirmation ledger and its remote. Screens read with
//! [`snapshot`](Engine::snapshot), mutate with
//! [`perform_action`](Engine::perform_action) and reload with
//! [`refresh`](Engine::refresh). Every settled action produces exactly one
//! notification.
//!
//! Engines are cheap to clone; clones share state.
//!
//! # Examples
//!
//! ```rust
//! use reconciler::action;
//! use reconciler::engine::Engine;
//! use reconciler::entity::{Entity, RecordId};
//! use reconciler::remote::InMemoryRemote;
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
//! struct Vendor { id: RecordId, active: bool }
//!
//! impl Entity for Vendor {
//!     type Id = RecordId;
//!     const KIND: &'static str = "vendor";
//!     fn id(&self) -> &RecordId { &self.id }
//! }
//!
//! # let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # runtime.block_on(async {
//! let remote = InMemoryRemote::new(vec![Vendor { id: RecordId::from("v-1"), active: true }]);
//! let engine = Engine::builder(remote).build().unwrap();
//! engine.refresh().await.unwrap();
//!
//! let suspend = action::from_fn(
//!     "suspend",
//!     |vendor: &Vendor| Vendor { active: false, ..vendor.clone() },
//!     |_| json!({ "active": false }),
//! );
//! let vendor = engine.perform_action(&RecordId::from("v-1"), &suspend).await.unwrap();
//! assert!(!vendor.active);
//! # });
//! ```

mod builder;
mod periodic;

pub use builder::EngineBuilder;
pub use periodic::RefreshHandle;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use crate::action::Action;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::entity::Entity;
use crate::envelope::ResponseEnvelopeParser;
use crate::error::ReconcileError;
use crate::guard::ConcurrencyGuard;
use crate::mutation::OptimisticMutator;
use crate::notify::{Notification, Notifier};
use crate::reconcile::{ConfirmationLedger, MergeReport, ReconciliationMerger};
use crate::remote::{Remote, RemoteError};
use crate::store::EntityStore;

pub(crate) struct EngineInner<T: Entity> {
    remote: Arc<dyn Remote<T>>,
    store: Arc<Mutex<EntityStore<T>>>,
    guard: ConcurrencyGuard<T::Id>,
    ledger: Arc<Mutex<ConfirmationLedger<T::Id>>>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    mutator: OptimisticMutator<T>,
    merger: ReconciliationMerger,
    config: EngineConfig,
}

/// Optimistic-update engine for one entity kind.
pub struct Engine<T: Entity> {
    inner: Arc<EngineInner<T>>,
}

impl<T: Entity> Clone for Engine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Entity> std::fmt::Debug for Engine<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Engine")
            .field("kind", &T::KIND)
            .field("records", &self.inner.store.lock().len())
            .field("in_flight", &self.inner.guard.in_flight_count())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<T> Engine<T>
where
    T: Entity + DeserializeOwned,
{
    /// Starts building an engine over `remote`.
    #[must_use]
    pub fn builder(remote: impl Remote<T> + 'static) -> EngineBuilder<T> {
        EngineBuilder::new(Arc::new(remote))
    }

    /// Starts building an engine over a shared remote.
    #[must_use]
    pub fn builder_shared(remote: Arc<dyn Remote<T>>) -> EngineBuilder<T> {
        EngineBuilder::new(remote)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns a detached copy of every record.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.store.lock().list()
    }

    /// Returns the current value of one record.
    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<T> {
        self.inner.store.lock().get(id).cloned()
    }

    /// Returns the number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.store.lock().len()
    }

    /// Returns `true` if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.store.lock().is_empty()
    }

    /// Returns `true` if a mutation is in flight for `id`.
    #[must_use]
    pub fn is_busy(&self, id: &T::Id) -> bool {
        self.inner.guard.is_busy(id)
    }

    /// Returns `true` if `id` was confirmed less than one grace window ago
    /// and the server has not been seen to catch up yet.
    #[must_use]
    pub fn is_recently_confirmed(&self, id: &T::Id) -> bool {
        self.inner.ledger.lock().is_recently_confirmed(
            id,
            self.inner.clock.now(),
            self.inner.config.grace_window,
        )
    }

    /// Returns the configuration in effect.
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.inner.config
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Performs a named action on one record.
    ///
    /// The action's transition is applied immediately; its payload is sent
    /// through [`Remote::mutate`]. On success a refresh follows if
    /// configured; a failing follow-up refresh is notified but does not fail
    /// the action.
    ///
    /// # Errors
    ///
    /// See [`OptimisticMutator::apply`].
    #[tracing::instrument(skip_all, fields(kind = T::KIND, entity_id = %id, action = action.name()))]
    pub async fn perform_action<A>(&self, id: &T::Id, action: &A) -> Result<T, ReconcileError>
    where
        A: Action<T> + ?Sized,
    {
        let remote = &self.inner.remote;
        let result = self
            .inner
            .mutator
            .apply(
                id,
                |current| action.transition(current),
                |current| remote.mutate(id, action.payload(current)),
            )
            .await;
        self.settle(action.name(), id, result).await
    }

    /// Applies an arbitrary transition settled by an arbitrary remote call.
    ///
    /// `remote_call` receives the record as it was before the transition.
    ///
    /// # Errors
    ///
    /// See [`OptimisticMutator::apply`].
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
        let result = self.inner.mutator.apply(id, transition, remote_call).await;
        self.settle("update", id, result).await
    }

    /// Creates a record optimistically through [`Remote::create`].
    ///
    /// # Errors
    ///
    /// See [`OptimisticMutator::create`].
    #[tracing::instrument(skip_all, fields(kind = T::KIND, draft_id = %draft.id()))]
    pub async fn create(&self, draft: T) -> Result<T, ReconcileError> {
        let draft_id = draft.id().clone();
        let remote = &self.inner.remote;
        let result = self
            .inner
            .mutator
            .create(draft, |draft| remote.create(draft))
            .await;
        let settled_id = result
            .as_ref()
            .map_or_else(|_| draft_id.clone(), |created| created.id().clone());
        self.settle("create", &settled_id, result).await
    }

    /// Deletes a record once the remote confirms.
    ///
    /// # Errors
    ///
    /// See [`OptimisticMutator::delete`].
    #[tracing::instrument(skip_all, fields(kind = T::KIND, entity_id = %id))]
    pub async fn delete(&self, id: &T::Id) -> Result<T, ReconcileError> {
        let remote = &self.inner.remote;
        let result = self
            .inner
            .mutator
            .delete(id, |_| remote.delete(id))
            .await;
        self.settle("delete", id, result).await
    }

    async fn settle(
        &self,
        action: &'static str,
        id: &T::Id,
        result: Result<T, ReconcileError>,
    ) -> Result<T, ReconcileError> {
        match &result {
            Ok(_) => {
                self.inner.notifier.notify(Notification::success(
                    T::KIND,
                    Some(id.to_string()),
                    action,
                    format!("{} {id}: {action} confirmed", T::KIND),
                ));
                if self.inner.config.refresh_after_mutation {
                    // Failures are notified by refresh itself.
                    let _ = self.refresh().await;
                }
            }
            Err(error) => self.inner.notifier.notify(Notification::failure(action, error)),
        }
        result
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Fetches the whole collection and merges it into the store.
    ///
    /// Failures leave the store untouched and are notified; the next refresh
    /// starts from scratch.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::RefreshFailed`] if the fetch failed
    /// - [`ReconcileError::MalformedEnvelope`] if the response could not be
    ///   normalized
    #[tracing::instrument(skip_all, fields(kind = T::KIND))]
    pub async fn refresh(&self) -> Result<MergeReport, ReconcileError> {
        let result = self.fetch_and_merge().await;
        if let Err(error) = &result {
            tracing::warn!(error = %error, "refresh aborted; store untouched");
            self.inner.notifier.notify(Notification::failure("refresh", error));
        }
        result
    }

    async fn fetch_and_merge(&self) -> Result<MergeReport, ReconcileError> {
        let body = self
            .inner
            .remote
            .fetch_collection()
            .await
            .map_err(|source| ReconcileError::RefreshFailed {
                kind: T::KIND,
                source,
            })?;

        let list = ResponseEnvelopeParser::parse::<T>(body).map_err(|source| {
            ReconcileError::MalformedEnvelope {
                kind: T::KIND,
                source,
            }
        })?;
        if list.is_partial() {
            tracing::warn!(
                shape = %list.shape,
                received = list.items.len(),
                total = list.page.and_then(|page| page.total),
                "server returned one page of a larger collection"
            );
        }

        let report = {
            let mut store = self.inner.store.lock();
            let now = self.inner.clock.now();
            let in_flight = self.inner.guard.in_flight();
            let mut ledger = self.inner.ledger.lock();

            let protection = self.inner.merger.protection(in_flight, &ledger, now);
            let outcome = ReconciliationMerger::merge(list.items, &store, &protection);
            ledger.prune(now, self.inner.merger.grace_window());
            store.replace_all(outcome.entities);
            outcome.report
        };

        if report.duplicates > 0 {
            tracing::warn!(duplicates = report.duplicates, "server list repeated ids");
        }
        tracing::debug!(shape = %list.shape, report = %report, "merged collection");
        Ok(report)
    }

    /// Runs [`refresh`](Self::refresh) every `interval` on the current tokio
    /// runtime until the handle is stopped or dropped, or every engine clone
    /// is gone.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, or with a zero interval.
    pub fn spawn_periodic_refresh(&self, interval: Duration) -> RefreshHandle {
        periodic::spawn(Arc::downgrade(&self.inner), interval)
    }

    /// Starts the periodic refresh configured by
    /// [`EngineConfig::refresh_interval`], if any.
    #[must_use]
    pub fn spawn_configured_refresh(&self) -> Option<RefreshHandle> {
        self.inner
            .config
            .refresh_interval
            .map(|interval| self.spawn_periodic_refresh(interval))
    }

    fn from_inner(inner: Arc<EngineInner<T>>) -> Self {
        Self { inner }
    }
}
