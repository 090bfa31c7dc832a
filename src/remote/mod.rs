//! The injected remote API.
//!
//! The engine never speaks HTTP itself. Each entity kind is wired to a
//! [`Remote`] implementation that fetches the collection as raw JSON and
//! performs single-record mutations. Implementations must be `Send + Sync`
//! and return boxed futures so engines can hold them as trait objects.
//!
//! [`InMemoryRemote`] is a simulated server used by the simulator binary and
//! the tests.

mod in_memory;

pub use in_memory::{CallCounts, FailurePlan, InMemoryRemote};

use std::fmt;

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::entity::Entity;

// =============================================================================
// RemoteErrorKind
// =============================================================================

/// Coarse classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// The request never reached the server or the connection dropped.
    Network,
    /// The server did not answer in time.
    Timeout,
    /// The server refused the request (4xx).
    Rejected,
    /// The server failed while handling the request (5xx).
    Server,
    /// The response body could not be decoded.
    Decode,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(formatter, "network"),
            Self::Timeout => write!(formatter, "timeout"),
            Self::Rejected => write!(formatter, "rejected"),
            Self::Server => write!(formatter, "server"),
            Self::Decode => write!(formatter, "decode"),
        }
    }
}

// =============================================================================
// RemoteError
// =============================================================================

/// A remote call failed.
///
/// # Examples
///
/// ```
/// use reconciler::remote::{RemoteError, RemoteErrorKind};
///
/// let error = RemoteError::rejected(409, "already approved");
/// assert_eq!(error.kind(), RemoteErrorKind::Rejected);
/// assert_eq!(error.status(), Some(409));
/// assert_eq!(error.to_string(), "rejected remote call (409): already approved");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} remote call{}: {message}", status_suffix(.status.as_ref()))]
pub struct RemoteError {
    kind: RemoteErrorKind,
    status: Option<u16>,
    message: String,
}

impl RemoteError {
    /// Creates an error of the given kind.
    #[must_use]
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Network, message)
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Timeout, message)
    }

    /// Creates a rejection with an HTTP status.
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Rejected, message).with_status(status)
    }

    /// Creates a server failure with an HTTP status.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Server, message).with_status(status)
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Decode, message)
    }

    /// Attaches an HTTP status code.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the failure classification.
    #[must_use]
    pub const fn kind(&self) -> RemoteErrorKind {
        self.kind
    }

    /// Returns the HTTP status, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if retrying the same call could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            RemoteErrorKind::Network | RemoteErrorKind::Timeout | RemoteErrorKind::Server
        )
    }
}

fn status_suffix(status: Option<&u16>) -> String {
    status.map(|status| format!(" ({status})")).unwrap_or_default()
}

// =============================================================================
// Remote
// =============================================================================

/// Remote API for one entity kind.
///
/// Methods return `Option<T>` where the server may or may not echo the
/// resulting record. `None` means "accepted, no body"; the engine then keeps
/// its own expected state.
pub trait Remote<T: Entity>: Send + Sync {
    /// Fetches the whole collection as a raw, unnormalized JSON envelope.
    fn fetch_collection(&self) -> BoxFuture<'_, Result<Value, RemoteError>>;

    /// Sends an action payload for one record.
    fn mutate<'a>(
        &'a self,
        id: &'a T::Id,
        payload: Value,
    ) -> BoxFuture<'a, Result<Option<T>, RemoteError>>;

    /// Creates a record from a draft. The server may assign a new id.
    fn create(&self, draft: T) -> BoxFuture<'_, Result<Option<T>, RemoteError>>;

    /// Deletes one record.
    fn delete<'a>(&'a self, id: &'a T::Id) -> BoxFuture<'a, Result<(), RemoteError>>;
}
