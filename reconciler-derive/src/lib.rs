//! Derive macro for reconciler's `Entity` trait.
//!
//! Dashboard record types are plain structs; this crate generates the
//! identifier accessor, the kind label and the diff predicate that the
//! reconciliation engine needs, so that adding a new record kind does not
//! require hand-written trait plumbing.
//!
//! # Attributes
//!
//! - `#[entity(kind = "...")]` on the struct: the kind label used in logs and
//!   notifications. Defaults to the struct name in `snake_case`.
//! - `#[entity(id)]` on one field: the identifier. Defaults to a field named
//!   `id`.
//! - `#[entity(tracked)]` on any number of fields: the fields an action
//!   touches. When present, `differs_from` compares only these fields.
//!
//! # Example
//!
//! ```rust,ignore
//! use reconciler::entity::Entity;
//! use reconciler_derive::Entity;
//!
//! #[derive(Clone, Debug, PartialEq, Entity)]
//! #[entity(kind = "quality_check")]
//! struct QualityCheck {
//!     #[entity(id)]
//!     id: String,
//!     #[entity(tracked)]
//!     state: String,
//!     inspector: String,
//! }
//!
//! let pending = QualityCheck {
//!     id: "QC-1".to_string(),
//!     state: "pending".to_string(),
//!     inspector: "kim".to_string(),
//! };
//! let reassigned = QualityCheck { inspector: "lee".to_string(), ..pending.clone() };
//!
//! assert_eq!(pending.id(), "QC-1");
//! assert_eq!(QualityCheck::KIND, "quality_check");
//! assert!(!pending.differs_from(&reassigned));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod entity;

use proc_macro::TokenStream;

/// Derive macro implementing `reconciler::entity::Entity` for a named struct.
///
/// # Requirements
///
/// - The type must be a struct with named fields
/// - Exactly one field is the identifier (`#[entity(id)]` or a field named `id`)
/// - The struct must implement `Clone` and `PartialEq` (supertraits of `Entity`)
///
/// # Generated Code
///
/// ```rust,ignore
/// impl ::reconciler::entity::Entity for StructName {
///     type Id = IdFieldType;
///     const KIND: &'static str = "struct_name";
///     fn id(&self) -> &Self::Id { &self.id }
///     // only when #[entity(tracked)] fields exist:
///     fn differs_from(&self, other: &Self) -> bool { ... }
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive_entity_impl(input)
}
