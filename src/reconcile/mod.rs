//! Reconciliation of fresh server collections with local tentative state.
//!
//! A refresh must never silently undo a change the user just made. Two kinds
//! of local value are protected:
//!
//! - **In flight**: the remote call has not settled yet
//! - **Recently confirmed**: the remote accepted the change less than one
//!   grace window ago, so a read replica may still serve the old value
//!
//! [`ConfirmationLedger`] records confirmations (and deletes, as tombstones),
//! [`ReconciliationMerger::protection`] turns the ledger plus the in-flight
//! set into a [`Protection`], and [`ReconciliationMerger::merge`] applies the
//! rules. Once the grace window lapses nothing is protected and the merge
//! converges to exactly the server's view.

mod ledger;
mod merger;

pub use ledger::ConfirmationLedger;
pub use merger::{MergeOutcome, Protection, ReconciliationMerger};

use std::fmt;

use serde::Serialize;

/// Per-merge counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Server value taken, identical to the local one.
    pub unchanged: usize,
    /// Server value taken, replacing a different local one.
    pub updated: usize,
    /// Local value kept against the server's.
    pub kept_local: usize,
    /// Confirmed ids the server now agrees with.
    pub caught_up: usize,
    /// Ids only the server knew.
    pub added: usize,
    /// Protected ids the server did not list.
    pub retained_local_only: usize,
    /// Unprotected ids the server did not list.
    pub dropped: usize,
    /// Tombstoned ids the server still listed.
    pub suppressed: usize,
    /// Repeated ids in the server list.
    pub duplicates: usize,
}

impl MergeReport {
    /// Number of ids whose server value was taken.
    #[must_use]
    pub const fn server_taken(&self) -> usize {
        self.unchanged + self.updated + self.caught_up + self.added
    }

    /// Number of ids whose local value survived.
    #[must_use]
    pub const fn local_kept(&self) -> usize {
        self.kept_local + self.retained_local_only
    }

    /// Returns `true` if the merge changed what the store holds.
    #[must_use]
    pub const fn changed_store(&self) -> bool {
        self.updated + self.caught_up + self.added + self.dropped > 0
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} from server ({} updated, {} added, {} caught up), {} kept local, {} dropped",
            self.server_taken(),
            self.updated,
            self.added,
            self.caught_up,
            self.local_kept(),
            self.dropped,
        )?;
        if self.suppressed > 0 {
            write!(formatter, ", {} suppressed", self.suppressed)?;
        }
        if self.duplicates > 0 {
            write!(formatter, ", {} duplicates", self.duplicates)?;
        }
        Ok(())
    }
}
