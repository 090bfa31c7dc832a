//! Errors surfaced to engine callers.
//!
//! Every variant names the entity kind; record-level variants also name the
//! record. Identifiers are carried in string form so one error type serves
//! every entity kind.

use thiserror::Error;

use crate::envelope::EnvelopeError;
use crate::notify::Outcome;
use crate::remote::RemoteError;

/// An action or refresh did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The record is not in the local store. Nothing was changed.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind label.
        kind: &'static str,
        /// The requested record.
        id: String,
    },

    /// A mutation is already in flight for the record. Nothing was changed.
    #[error("{kind} {id} is busy")]
    Busy {
        /// Entity kind label.
        kind: &'static str,
        /// The requested record.
        id: String,
    },

    /// An optimistic create used an id that is already present.
    #[error("{kind} {id} already exists")]
    AlreadyExists {
        /// Entity kind label.
        kind: &'static str,
        /// The colliding record.
        id: String,
    },

    /// The remote call failed; the local change was rolled back.
    #[error("{kind} {id}: {source}")]
    RemoteFailure {
        /// Entity kind label.
        kind: &'static str,
        /// The affected record.
        id: String,
        /// What the remote reported.
        source: RemoteError,
    },

    /// The fetched collection could not be normalized; the store is untouched.
    #[error("malformed {kind} collection: {source}")]
    MalformedEnvelope {
        /// Entity kind label.
        kind: &'static str,
        /// Parser failure.
        source: EnvelopeError,
    },

    /// The collection fetch failed; the store is untouched.
    #[error("refreshing {kind} failed: {source}")]
    RefreshFailed {
        /// Entity kind label.
        kind: &'static str,
        /// What the remote reported.
        source: RemoteError,
    },
}

impl ReconcileError {
    /// Returns the entity kind label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { kind, .. }
            | Self::Busy { kind, .. }
            | Self::AlreadyExists { kind, .. }
            | Self::RemoteFailure { kind, .. }
            | Self::MalformedEnvelope { kind, .. }
            | Self::RefreshFailed { kind, .. } => *kind,
        }
    }

    /// Returns the affected record, for record-level errors.
    #[must_use]
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { id, .. }
            | Self::Busy { id, .. }
            | Self::AlreadyExists { id, .. }
            | Self::RemoteFailure { id, .. } => Some(id),
            Self::MalformedEnvelope { .. } | Self::RefreshFailed { .. } => None,
        }
    }

    /// Returns the notification outcome this error maps to.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        match self {
            Self::NotFound { .. } => Outcome::NotFound,
            Self::Busy { .. } => Outcome::Busy,
            Self::AlreadyExists { .. } => Outcome::AlreadyExists,
            Self::RemoteFailure { .. } => Outcome::RemoteFailure,
            Self::MalformedEnvelope { .. } => Outcome::MalformedEnvelope,
            Self::RefreshFailed { .. } => Outcome::RefreshFailed,
        }
    }

    /// Returns `true` if the request was rejected before anything changed.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Busy { .. } | Self::AlreadyExists { .. }
        )
    }
}
