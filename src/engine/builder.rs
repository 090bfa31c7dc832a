use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use super::{Engine, EngineInner};
use crate::clock::{Clock, TokioClock};
use crate::config::{ConfigError, EngineConfig};
use crate::entity::Entity;
use crate::guard::ConcurrencyGuard;
use crate::mutation::OptimisticMutator;
use crate::notify::{Notifier, TracingNotifier};
use crate::reconcile::{ConfirmationLedger, ReconciliationMerger};
use crate::remote::Remote;
use crate::store::EntityStore;

/// Assembles an [`Engine`].
///
/// Defaults: [`EngineConfig::default`], [`TokioClock`], [`TracingNotifier`],
/// empty store.
pub struct EngineBuilder<T: Entity> {
    remote: Arc<dyn Remote<T>>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    initial: Vec<T>,
}

impl<T> EngineBuilder<T>
where
    T: Entity + DeserializeOwned,
{
    pub(super) fn new(remote: Arc<dyn Remote<T>>) -> Self {
        Self {
            remote,
            config: EngineConfig::default(),
            clock: Arc::new(TokioClock),
            notifier: Arc::new(TracingNotifier),
            initial: Vec::new(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub const fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the time source.
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Shares an existing time source.
    #[must_use]
    pub fn shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the notification sink.
    #[must_use]
    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Shares an existing notification sink.
    #[must_use]
    pub fn shared_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Seeds the store, as if a refresh had returned `entities`.
    #[must_use]
    pub fn initial(mut self, entities: impl IntoIterator<Item = T>) -> Self {
        self.initial = entities.into_iter().collect();
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration does not validate.
    pub fn build(self) -> Result<Engine<T>, ConfigError> {
        self.config.validate()?;

        let store = Arc::new(Mutex::new(self.initial.into_iter().collect::<EntityStore<T>>()));
        let guard = ConcurrencyGuard::new();
        let ledger = Arc::new(Mutex::new(ConfirmationLedger::new()));
        let mutator = OptimisticMutator::new(
            Arc::clone(&store),
            guard.clone(),
            Arc::clone(&ledger),
            Arc::clone(&self.clock),
        );

        Ok(Engine {
            inner: Arc::new(EngineInner {
                remote: self.remote,
                store,
                guard,
                ledger,
                clock: self.clock,
                notifier: self.notifier,
                mutator,
                merger: ReconciliationMerger::new(self.config.grace_window),
                config: self.config,
            }),
        })
    }
}

impl<T: Entity> std::fmt::Debug for EngineBuilder<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("EngineBuilder")
            .field("kind", &T::KIND)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("initial", &self.initial.len())
            .finish_non_exhaustive()
    }
}
