use std::sync::Weak;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{Engine, EngineInner};
use crate::entity::Entity;

/// A running periodic refresh. Stops when dropped.
#[derive(Debug)]
#[must_use = "dropping the handle stops the periodic refresh"]
pub struct RefreshHandle {
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stops the periodic refresh.
    pub fn stop(self) {
        drop(self);
    }

    /// Returns `true` once the task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(super) fn spawn<T>(engine: Weak<EngineInner<T>>, interval: Duration) -> RefreshHandle
where
    T: Entity + DeserializeOwned,
{
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(inner) = engine.upgrade() else {
                tracing::debug!(kind = T::KIND, "engine dropped; periodic refresh ends");
                break;
            };
            // Failures are logged and notified by refresh.
            let _ = Engine::from_inner(inner).refresh().await;
        }
    });
    RefreshHandle { task }
}
