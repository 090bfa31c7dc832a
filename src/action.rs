//! Named, serializable state transitions.
//!
//! An [`Action`] is what a user clicks: "approve", "verify", "suspend". It
//! knows how to change a record locally ([`Action::transition`]) and what to
//! send to the remote ([`Action::payload`]). The engine applies the
//! transition optimistically and sends the payload through
//! [`Remote::mutate`](crate::remote::Remote::mutate).
//!
//! # Examples
//!
//! ```rust
//! use reconciler::action::{self, Action};
//! use reconciler::entity::{Entity, RecordId};
//! use serde_json::json;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Vendor { id: RecordId, active: bool }
//!
//! impl Entity for Vendor {
//!     type Id = RecordId;
//!     const KIND: &'static str = "vendor";
//!     fn id(&self) -> &RecordId { &self.id }
//! }
//!
//! let suspend = action::from_fn(
//!     "suspend",
//!     |vendor: &Vendor| Vendor { active: false, ..vendor.clone() },
//!     |_| json!({ "active": false }),
//! );
//!
//! let vendor = Vendor { id: RecordId::from("v-1"), active: true };
//! assert!(!suspend.transition(&vendor).active);
//! assert_eq!(suspend.name(), "suspend");
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::entity::Entity;

/// A user-triggered change to one record.
pub trait Action<T: Entity>: Send + Sync {
    /// Short name used in logs and notifications.
    fn name(&self) -> &'static str;

    /// Returns the expected record after the action. Must not mutate `current`.
    fn transition(&self, current: &T) -> T;

    /// Returns the body sent to the remote.
    fn payload(&self, current: &T) -> Value;
}

/// An [`Action`] assembled from two closures. See [`from_fn`].
pub struct FnAction<T, Transition, Payload> {
    name: &'static str,
    transition: Transition,
    payload: Payload,
    entity: PhantomData<fn(&T) -> T>,
}

impl<T, Transition, Payload> fmt::Debug for FnAction<T, Transition, Payload> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FnAction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Builds an [`Action`] from a transition and a payload closure.
pub const fn from_fn<T, Transition, Payload>(
    name: &'static str,
    transition: Transition,
    payload: Payload,
) -> FnAction<T, Transition, Payload>
where
    T: Entity,
    Transition: Fn(&T) -> T + Send + Sync,
    Payload: Fn(&T) -> Value + Send + Sync,
{
    FnAction {
        name,
        transition,
        payload,
        entity: PhantomData,
    }
}

impl<T, Transition, Payload> Action<T> for FnAction<T, Transition, Payload>
where
    T: Entity,
    Transition: Fn(&T) -> T + Send + Sync,
    Payload: Fn(&T) -> Value + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn transition(&self, current: &T) -> T {
        (self.transition)(current)
    }

    fn payload(&self, current: &T) -> Value {
        (self.payload)(current)
    }
}
