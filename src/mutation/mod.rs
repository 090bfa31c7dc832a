//! Optimistic single-record mutations.
//!
//! [`OptimisticMutator::apply`] writes the expected state into the store
//! before the remote call resolves, so the UI reflects the user's action
//! immediately:
//!
//! 1. acquire the per-id permit (or fail with `Busy`, nothing touched)
//! 2. snapshot the current value (or fail with `NotFound`)
//! 3. write the tentative value
//! 4. await the remote call
//! 5. on success write the authoritative value and mark the id confirmed;
//!    on failure write the snapshot back
//! 6. release the permit (on every path, including a dropped future)
//!
//! If the future is dropped during step 4 the snapshot is written back
//! before the permit is released.
//!
//! [`create`](OptimisticMutator::create) follows the same pattern for new
//! records. [`delete`](OptimisticMutator::delete) only removes after the
//! remote confirms.

mod mutator;
mod pending;

pub use mutator::OptimisticMutator;
pub(crate) use pending::{PendingMutation, SettleGuard};
