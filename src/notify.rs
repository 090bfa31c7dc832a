//! User-facing notifications.
//!
//! Every action the engine settles produces exactly one [`Notification`]:
//! a success, or one distinguishable failure [`Outcome`]. How it is shown
//! (toast, banner, log line) is the [`Notifier`]'s business.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ReconcileError;

/// What happened to an action or refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The remote confirmed the change.
    Success,
    /// Another mutation was in flight for the record.
    Busy,
    /// The record is not in the local store.
    NotFound,
    /// An optimistic create collided with an existing record.
    AlreadyExists,
    /// The remote call failed and the local change was rolled back.
    RemoteFailure,
    /// The collection could not be fetched.
    RefreshFailed,
    /// The fetched collection had an unrecognized shape.
    MalformedEnvelope,
}

impl Outcome {
    /// Returns `true` for every outcome but [`Outcome::Success`].
    #[must_use]
    pub const fn is_failure(self) -> bool {
        !matches!(self, Self::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::Busy => "busy",
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::RemoteFailure => "remote failure",
            Self::RefreshFailed => "refresh failed",
            Self::MalformedEnvelope => "malformed envelope",
        };
        formatter.write_str(label)
    }
}

/// One settled action or refresh, ready to be shown to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Entity kind label.
    pub kind: &'static str,
    /// The affected record, if the notification concerns one.
    pub entity_id: Option<String>,
    /// The action name (`"approve"`, `"refresh"`, ...).
    pub action: String,
    /// What happened.
    pub outcome: Outcome,
    /// Human-readable text.
    pub message: String,
}

impl Notification {
    /// Creates a success notification.
    #[must_use]
    pub fn success(
        kind: &'static str,
        entity_id: Option<String>,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            entity_id,
            action: action.into(),
            outcome: Outcome::Success,
            message: message.into(),
        }
    }

    /// Creates the failure notification matching `error`.
    #[must_use]
    pub fn failure(action: impl Into<String>, error: &ReconcileError) -> Self {
        Self {
            kind: error.kind(),
            entity_id: error.entity_id().map(str::to_string),
            action: action.into(),
            outcome: error.outcome(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[{}] {} {}", self.outcome, self.kind, self.action)?;
        if let Some(entity_id) = &self.entity_id {
            write!(formatter, " {entity_id}")?;
        }
        write!(formatter, ": {}", self.message)
    }
}

/// Receives notifications. Fire-and-forget: implementations must not block.
pub trait Notifier: Send + Sync {
    /// Delivers one notification.
    fn notify(&self, notification: Notification);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification);
    }
}

/// Forwards notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        if notification.outcome.is_failure() {
            tracing::warn!(
                kind = notification.kind,
                entity_id = notification.entity_id.as_deref(),
                action = %notification.action,
                outcome = %notification.outcome,
                "{}",
                notification.message
            );
        } else {
            tracing::info!(
                kind = notification.kind,
                entity_id = notification.entity_id.as_deref(),
                action = %notification.action,
                "{}",
                notification.message
            );
        }
    }
}

/// Records every notification in memory.
///
/// Clones share the same buffer.
///
/// # Examples
///
/// ```rust
/// use reconciler::notify::{CollectingNotifier, Notification, Notifier, Outcome};
///
/// let notifier = CollectingNotifier::new();
/// notifier.notify(Notification::success("audit", None, "refresh", "3 records"));
///
/// assert_eq!(notifier.count(Outcome::Success), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CollectingNotifier {
    received: Arc<Mutex<Vec<Notification>>>,
}

impl CollectingNotifier {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything received so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }

    /// Drains the buffer.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.received.lock())
    }

    /// Counts notifications with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.received
            .lock()
            .iter()
            .filter(|notification| notification.outcome == outcome)
            .count()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: Notification) {
        self.received.lock().push(notification);
    }
}
