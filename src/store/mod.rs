//! In-memory keyed collection of one entity kind.
//!
//! [`EntityStore`] is a dumb, synchronous data holder: no validation, no
//! locking, no knowledge of pending mutations. Writers are restricted by
//! convention rather than by type:
//!
//! - [`put`](EntityStore::put): single-entity writes from the optimistic
//!   mutator (tentative write, authoritative write, rollback)
//! - [`replace_all`](EntityStore::replace_all): bulk writes, only from the
//!   reconciliation merge
//! - [`remove`](EntityStore::remove): confirmed deletes and rolled-back creates
//!
//! # Time Complexity
//!
//! | Operation     | Complexity |
//! |---------------|------------|
//! | `get`         | O(1)       |
//! | `put`         | O(1)       |
//! | `remove`      | O(1)       |
//! | `list`        | O(n)       |
//! | `replace_all` | O(n)       |
//!
//! # Examples
//!
//! ```rust
//! use reconciler::entity::{Entity, RecordId};
//! use reconciler::store::EntityStore;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Audit { id: RecordId, score: u8 }
//!
//! impl Entity for Audit {
//!     type Id = RecordId;
//!     const KIND: &'static str = "audit";
//!     fn id(&self) -> &RecordId { &self.id }
//! }
//!
//! let mut store = EntityStore::new();
//! let audit = Audit { id: RecordId::from("a-1"), score: 90 };
//! store.put(audit.id().clone(), audit.clone());
//!
//! assert_eq!(store.get(&RecordId::from("a-1")), Some(&audit));
//! assert_eq!(store.list(), vec![audit]);
//! ```

use crate::entity::Entity;

#[cfg(feature = "fxhash")]
type StoreMap<K, V> = rustc_hash::FxHashMap<K, V>;

#[cfg(not(feature = "fxhash"))]
type StoreMap<K, V> = std::collections::HashMap<K, V>;

/// Keyed collection of entities of one kind.
///
/// Every identifier maps to exactly one current value. Ordering of
/// [`list`](Self::list) is unspecified; sorting is a presentation concern.
#[derive(Debug, Clone)]
pub struct EntityStore<T: Entity> {
    entries: StoreMap<T::Id, T>,
}

impl<T: Entity> EntityStore<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: StoreMap::default(),
        }
    }

    /// Returns the current value for `id`, if present.
    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.entries.get(id)
    }

    /// Returns `true` if `id` is present.
    #[must_use]
    pub fn contains(&self, id: &T::Id) -> bool {
        self.entries.contains_key(id)
    }

    /// Returns a snapshot of all entities.
    ///
    /// The returned vector is detached from the store: later writes are not
    /// reflected in it.
    #[must_use]
    pub fn list(&self) -> Vec<T> {
        self.entries.values().cloned().collect()
    }

    /// Iterates over the stored entities without cloning.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Unconditionally overwrites the value stored under `id`.
    ///
    /// Returns the previous value.
    pub fn put(&mut self, id: T::Id, entity: T) -> Option<T> {
        self.entries.insert(id, entity)
    }

    /// Removes `id`, returning the value it held.
    pub fn remove(&mut self, id: &T::Id) -> Option<T> {
        self.entries.remove(id)
    }

    /// Replaces the whole content with `entities`, keyed by their own ids.
    ///
    /// If `entities` contains the same id twice, the last one wins; the merge
    /// never produces duplicates.
    pub fn replace_all(&mut self, entities: impl IntoIterator<Item = T>) {
        let entities = entities.into_iter();
        let mut entries = StoreMap::default();
        entries.reserve(entities.size_hint().0);
        for entity in entities {
            entries.insert(entity.id().clone(), entity);
        }
        self.entries = entries;
    }

    /// Returns the number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> FromIterator<T> for EntityStore<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut store = Self::new();
        store.replace_all(iter);
        store
    }
}
