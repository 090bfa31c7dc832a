//! The entity abstraction shared by every record kind.
//!
//! Quality checks, certificates, temperature records and audits use
//! structurally distinct schemas but the same reconciliation pattern. The
//! engine only needs to know three things about a record:
//!
//! - how to find its identifier ([`Entity::id`])
//! - whether two versions differ in the fields an action touches
//!   ([`Entity::differs_from`])
//! - how to copy it (the `Clone` supertrait)
//!
//! # Examples
//!
//! ```rust
//! use reconciler::entity::{Entity, RecordId};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Vendor {
//!     id: RecordId,
//!     name: String,
//! }
//!
//! impl Entity for Vendor {
//!     type Id = RecordId;
//!     const KIND: &'static str = "vendor";
//!
//!     fn id(&self) -> &RecordId {
//!         &self.id
//!     }
//! }
//!
//! let vendor = Vendor { id: RecordId::new("64f1c0a9"), name: "Acme".to_string() };
//! assert_eq!(vendor.id().as_str(), "64f1c0a9");
//! assert!(!vendor.differs_from(&vendor.clone()));
//! ```

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

#[cfg(feature = "derive")]
pub use reconciler_derive::Entity;

/// A record of one kind, tracked by an [`EntityStore`](crate::store::EntityStore).
///
/// Implement it by hand or with `#[derive(Entity)]`.
pub trait Entity: Clone + PartialEq + Send + Sync + 'static {
    /// The opaque, globally unique identifier type.
    type Id: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Kind label used in logs and notifications (`"quality_check"`, `"audit"`, ...).
    const KIND: &'static str;

    /// Returns the identifier of this record.
    fn id(&self) -> &Self::Id;

    /// Returns `true` if `other` differs from `self` in the fields that
    /// actions touch.
    ///
    /// The default compares the whole record. The merge uses this to decide
    /// whether a server snapshot has caught up with a confirmed local change.
    fn differs_from(&self, other: &Self) -> bool {
        self != other
    }
}

/// String form of a remote database object id.
///
/// Record ids are opaque: the engine never parses them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a `RecordId` from any string-like value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Clone, Debug, PartialEq)]
    struct Reading {
        id: RecordId,
        celsius: i32,
        note: String,
    }

    impl Entity for Reading {
        type Id = RecordId;
        const KIND: &'static str = "reading";

        fn id(&self) -> &RecordId {
            &self.id
        }
    }

    #[rstest]
    fn test_record_id_display_is_raw_string() {
        let id = RecordId::new("64f1c0a9e4b0c7a1d2f3a4b5");
        assert_eq!(id.to_string(), "64f1c0a9e4b0c7a1d2f3a4b5");
        assert_eq!(id.as_str(), "64f1c0a9e4b0c7a1d2f3a4b5");
    }

    #[rstest]
    fn test_record_id_serializes_transparently() {
        let id = RecordId::from("QC-9922");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"QC-9922\"");
        let parsed: RecordId = serde_json::from_str("\"QC-9922\"").unwrap();
        assert_eq!(parsed, id);
    }

    #[rstest]
    fn test_default_differs_from_compares_whole_record() {
        let reading = Reading {
            id: RecordId::from("r-1"),
            celsius: 4,
            note: String::new(),
        };
        let annotated = Reading {
            note: "door open".to_string(),
            ..reading.clone()
        };

        assert!(!reading.differs_from(&reading.clone()));
        assert!(reading.differs_from(&annotated));
    }
}
