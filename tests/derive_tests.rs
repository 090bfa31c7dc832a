#![cfg(feature = "derive")]
//! Tests for `#[derive(Entity)]`.
//!
//! - the identifier is the field named `id`, or the one marked `#[entity(id)]`
//! - the kind label defaults to the snake_case type name
//! - `#[entity(tracked)]` fields alone decide `differs_from`

use reconciler::entity::{Entity, RecordId};
use rstest::rstest;

// =============================================================================
// Test Structures
// =============================================================================

/// Identifier found by name, no tracked fields.
#[derive(Clone, Debug, PartialEq, Entity)]
struct Vendor {
    id: RecordId,
    name: String,
}

/// Explicit identifier, explicit kind, tracked fields.
#[derive(Clone, Debug, PartialEq, Entity)]
#[entity(kind = "haccp_log")]
struct HazardLog {
    #[entity(id)]
    log_number: u64,
    #[entity(tracked)]
    status: String,
    #[entity(tracked)]
    reviewer: Option<String>,
    remarks: String,
}

/// Multi-word name for the default kind label.
#[derive(Clone, Debug, PartialEq, Entity)]
struct TemperatureRecord {
    id: RecordId,
}

/// Generic record.
#[derive(Clone, Debug, PartialEq, Entity)]
struct Tagged<T: Clone + PartialEq + Send + Sync + 'static> {
    id: RecordId,
    #[entity(tracked)]
    tag: T,
}

fn log(status: &str, remarks: &str) -> HazardLog {
    HazardLog {
        log_number: 7,
        status: status.to_string(),
        reviewer: None,
        remarks: remarks.to_string(),
    }
}

// =============================================================================
// Identity and Kind
// =============================================================================

#[rstest]
fn test_id_field_found_by_name() {
    let vendor = Vendor {
        id: RecordId::from("v-1"),
        name: "Acme".to_string(),
    };
    assert_eq!(vendor.id(), &RecordId::from("v-1"));
}

#[rstest]
fn test_marked_id_field_with_other_type() {
    assert_eq!(*log("open", "").id(), 7);
}

#[rstest]
#[case(Vendor::KIND, "vendor")]
#[case(HazardLog::KIND, "haccp_log")]
#[case(TemperatureRecord::KIND, "temperature_record")]
#[case(Tagged::<u8>::KIND, "tagged")]
fn test_kind_labels(#[case] actual: &str, #[case] expected: &str) {
    assert_eq!(actual, expected);
}

// =============================================================================
// differs_from
// =============================================================================

#[rstest]
fn test_without_tracked_fields_whole_record_compared() {
    let vendor = Vendor {
        id: RecordId::from("v-1"),
        name: "Acme".to_string(),
    };
    let renamed = Vendor {
        name: "Acme Farms".to_string(),
        ..vendor.clone()
    };

    assert!(vendor.differs_from(&renamed));
    assert!(!vendor.differs_from(&vendor.clone()));
}

#[rstest]
#[case(log("open", "a"), log("open", "b"), false)]
#[case(log("open", "a"), log("closed", "a"), true)]
#[case(
    log("open", "a"),
    HazardLog { reviewer: Some("kim".to_string()), ..log("open", "a") },
    true
)]
fn test_only_tracked_fields_compared(
    #[case] left: HazardLog,
    #[case] right: HazardLog,
    #[case] differs: bool,
) {
    assert_eq!(left.differs_from(&right), differs);
    assert_eq!(right.differs_from(&left), differs);
}

#[rstest]
fn test_generic_tracked_field() {
    let first = Tagged {
        id: RecordId::from("g-1"),
        tag: 1u8,
    };
    let second = Tagged { tag: 2u8, ..first.clone() };

    assert!(first.differs_from(&second));
}
