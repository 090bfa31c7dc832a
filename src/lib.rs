//! # reconciler
//!
//! An optimistic-update reconciliation engine for record dashboards.
//!
//! ## Overview
//!
//! Administrators approve, reject and schedule remote records through
//! screens that must feel instant. Every screen needs the same three things:
//!
//! - **Tentative writes**: apply a state change locally before the remote
//!   call resolves
//! - **Exact rollback**: restore the pre-change snapshot if the call fails
//! - **Safe refresh**: replace the local collection with a freshly fetched one
//!   without clobbering changes the server has not caught up to yet
//!
//! This crate implements that once, generically over an [`Entity`](entity::Entity)
//! type:
//!
//! - [`store::EntityStore`]: keyed in-memory collection of one entity kind
//! - [`guard::ConcurrencyGuard`]: per-identifier in-flight tracking (`Busy`)
//! - [`mutation::OptimisticMutator`]: apply, call remote, rollback or confirm
//! - [`reconcile::ReconciliationMerger`]: grace-window aware merge
//! - [`envelope::ResponseEnvelopeParser`]: normalizes remote list envelopes
//! - [`engine::Engine`]: the per-kind facade UI code talks to
//!
//! ## Feature Flags
//!
//! - `derive`: `#[derive(Entity)]`
//! - `dashboard`: the dashboard record kinds and the [`dashboard::Dashboard`] facade
//! - `fxhash`: use `FxHash` for the entity store
//! - `full`: Enable all features
//!
//! ## Example
//!
//! ```rust,ignore
//! use reconciler::prelude::*;
//!
//! let engine = Engine::builder(remote).build()?;
//! engine.refresh().await?;
//! engine.perform_action(&id, &QualityCheckAction::Approve).await?;
//! let rows = engine.snapshot();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Lets `#[derive(Entity)]` expand to `::reconciler::...` inside this crate too.
extern crate self as reconciler;

/// Prelude module for convenient imports.
///
/// Re-exports the types most screens need.
///
/// # Usage
///
/// ```rust
/// use reconciler::prelude::*;
/// ```
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::clock::{Clock, ManualClock, TokioClock};
    pub use crate::config::EngineConfig;
    pub use crate::engine::{Engine, EngineBuilder};
    pub use crate::entity::{Entity, RecordId};
    pub use crate::envelope::{EnvelopeShape, ResponseEnvelopeParser};
    pub use crate::error::ReconcileError;
    pub use crate::notify::{Notification, Notifier, Outcome};
    pub use crate::reconcile::MergeReport;
    pub use crate::remote::{Remote, RemoteError, RemoteErrorKind};

    #[cfg(feature = "dashboard")]
    pub use crate::dashboard::*;
}

pub mod action;
pub mod clock;
pub mod config;
pub mod engine;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod guard;
pub mod mutation;
pub mod notify;
pub mod reconcile;
pub mod remote;
pub mod store;

#[cfg(feature = "dashboard")]
pub mod dashboard;
