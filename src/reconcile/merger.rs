//! The grace-window aware merge.

use std::collections::HashSet;
use std::hash::Hash;
use std::time::Duration;

use super::{ConfirmationLedger, MergeReport};
use crate::clock::Instant;
use crate::config::DEFAULT_GRACE_WINDOW;
use crate::entity::Entity;
use crate::store::EntityStore;

/// Identifiers whose local value must survive a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protection<Id: Eq + Hash> {
    /// A mutation is in flight.
    pub in_flight: HashSet<Id>,
    /// Confirmed within the grace window.
    pub confirmed: HashSet<Id>,
    /// Deleted within the grace window.
    pub deleted: HashSet<Id>,
}

impl<Id: Eq + Hash> Protection<Id> {
    /// Protects nothing.
    #[must_use]
    pub fn none() -> Self {
        Self {
            in_flight: HashSet::new(),
            confirmed: HashSet::new(),
            deleted: HashSet::new(),
        }
    }

    /// Returns `true` if the local value of `id` must be kept.
    #[must_use]
    pub fn is_protected(&self, id: &Id) -> bool {
        self.in_flight.contains(id) || self.confirmed.contains(id)
    }

    /// Returns `true` if nothing is protected or tombstoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty() && self.confirmed.is_empty() && self.deleted.is_empty()
    }
}

impl<Id: Eq + Hash> Default for Protection<Id> {
    fn default() -> Self {
        Self::none()
    }
}

/// Result of one merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome<T: Entity> {
    /// The new store content.
    pub entities: Vec<T>,
    /// What happened to each id.
    pub report: MergeReport,
}

/// Merges fresh server collections into the local store.
///
/// # Rules
///
/// For each id:
///
/// | Server | Local | Protection          | Result                           |
/// |--------|-------|---------------------|----------------------------------|
/// | yes    | any   | recently deleted    | suppressed                       |
/// | yes    | yes   | in flight           | local                            |
/// | yes    | yes   | recently confirmed  | local, or server if caught up    |
/// | yes    | yes   | none                | server                           |
/// | yes    | no    | any                 | server                           |
/// | no     | yes   | in flight/confirmed | local                            |
/// | no     | yes   | none                | dropped                          |
///
/// Duplicate server ids: the first occurrence wins.
///
/// # Examples
///
/// ```rust
/// use reconciler::entity::{Entity, RecordId};
/// use reconciler::reconcile::{Protection, ReconciliationMerger};
/// use reconciler::store::EntityStore;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Check { id: RecordId, approved: bool }
///
/// impl Entity for Check {
///     type Id = RecordId;
///     const KIND: &'static str = "check";
///     fn id(&self) -> &RecordId { &self.id }
/// }
///
/// let id = RecordId::from("QC-9922");
/// let local: EntityStore<Check> = [Check { id: id.clone(), approved: true }].into_iter().collect();
/// let stale = vec![Check { id: id.clone(), approved: false }];
///
/// let mut protection = Protection::none();
/// protection.confirmed.insert(id.clone());
///
/// let outcome = ReconciliationMerger::merge(stale, &local, &protection);
/// assert!(outcome.entities[0].approved);
/// assert_eq!(outcome.report.kept_local, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationMerger {
    grace_window: Duration,
}

impl ReconciliationMerger {
    /// Creates a merger with the given grace window.
    #[must_use]
    pub const fn new(grace_window: Duration) -> Self {
        Self { grace_window }
    }

    /// Returns the grace window.
    #[must_use]
    pub const fn grace_window(&self) -> Duration {
        self.grace_window
    }

    /// Builds the protection set for a merge happening at `now`.
    #[must_use]
    pub fn protection<Id: Clone + Eq + Hash>(
        &self,
        in_flight: HashSet<Id>,
        ledger: &ConfirmationLedger<Id>,
        now: Instant,
    ) -> Protection<Id> {
        Protection {
            in_flight,
            confirmed: ledger.confirmed_within(now, self.grace_window),
            deleted: ledger.deleted_within(now, self.grace_window),
        }
    }

    /// Merges `server` into the content of `current`.
    ///
    /// Pure: `current` is only read. Applying the outcome is the caller's job.
    pub fn merge<T: Entity>(
        server: Vec<T>,
        current: &EntityStore<T>,
        protection: &Protection<T::Id>,
    ) -> MergeOutcome<T> {
        let mut report = MergeReport::default();
        let mut seen: HashSet<T::Id> = HashSet::with_capacity(server.len());
        let mut entities = Vec::with_capacity(server.len().max(current.len()));

        for incoming in server {
            let id = incoming.id().clone();
            if !seen.insert(id.clone()) {
                report.duplicates += 1;
                continue;
            }
            if protection.deleted.contains(&id) {
                report.suppressed += 1;
                continue;
            }

            match current.get(&id) {
                Some(local) if protection.in_flight.contains(&id) => {
                    report.kept_local += 1;
                    entities.push(local.clone());
                }
                Some(local) if protection.confirmed.contains(&id) => {
                    if incoming.differs_from(local) {
                        report.kept_local += 1;
                        entities.push(local.clone());
                    } else {
                        report.caught_up += 1;
                        entities.push(incoming);
                    }
                }
                Some(local) => {
                    if *local == incoming {
                        report.unchanged += 1;
                    } else {
                        report.updated += 1;
                    }
                    entities.push(incoming);
                }
                None => {
                    report.added += 1;
                    entities.push(incoming);
                }
            }
        }

        for local in current.iter() {
            let id = local.id();
            if seen.contains(id) {
                continue;
            }
            if protection.is_protected(id) && !protection.deleted.contains(id) {
                report.retained_local_only += 1;
                entities.push(local.clone());
            } else {
                report.dropped += 1;
            }
        }

        MergeOutcome { entities, report }
    }
}

impl Default for ReconciliationMerger {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_WINDOW)
    }
}
