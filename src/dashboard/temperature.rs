//! Temperature-compliance logs for cold storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::action::Action;
use crate::entity::{Entity, RecordId};

/// Review state of a temperature record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// Awaiting review.
    Pending,
    /// Accepted as compliant.
    Approved,
    /// Refused as non-compliant.
    Rejected,
}

/// A single probe reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureReading {
    /// When the reading was taken.
    pub recorded_at: DateTime<Utc>,
    /// Measured temperature.
    pub celsius: f64,
}

/// One temperature log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureRecord {
    /// Record id.
    #[serde(rename = "_id", alias = "id")]
    pub id: RecordId,
    /// Storage unit or site.
    pub location: String,
    /// Lowest acceptable temperature.
    pub min_celsius: f64,
    /// Highest acceptable temperature.
    pub max_celsius: f64,
    /// Logged readings.
    #[serde(default)]
    pub readings: Vec<TemperatureReading>,
    /// Review state.
    #[entity(tracked)]
    pub status: ComplianceStatus,
    /// Who reviewed the log.
    #[entity(tracked)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    /// Reason given for a rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl TemperatureRecord {
    /// Returns the readings outside the acceptable range.
    pub fn excursions(&self) -> impl Iterator<Item = &TemperatureReading> {
        self.readings
            .iter()
            .filter(|reading| reading.celsius < self.min_celsius || reading.celsius > self.max_celsius)
    }

    /// Returns `true` if every reading is within range.
    #[must_use]
    pub fn is_within_range(&self) -> bool {
        self.excursions().next().is_none()
    }
}

/// What an administrator can do to a temperature record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TemperatureAction {
    /// Accept as compliant.
    Approve {
        /// Reviewer name.
        reviewer: String,
    },
    /// Refuse as non-compliant.
    Reject {
        /// Reviewer name.
        reviewer: String,
        /// Why the log was refused.
        reason: String,
    },
}

impl Action<TemperatureRecord> for TemperatureAction {
    fn name(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
        }
    }

    fn transition(&self, current: &TemperatureRecord) -> TemperatureRecord {
        let mut next = current.clone();
        match self {
            Self::Approve { reviewer } => {
                next.status = ComplianceStatus::Approved;
                next.reviewed_by = Some(reviewer.clone());
                next.rejection_reason = None;
            }
            Self::Reject { reviewer, reason } => {
                next.status = ComplianceStatus::Rejected;
                next.reviewed_by = Some(reviewer.clone());
                next.rejection_reason = Some(reason.clone());
            }
        }
        next
    }

    fn payload(&self, _current: &TemperatureRecord) -> Value {
        match self {
            Self::Approve { reviewer } => json!({
                "status": ComplianceStatus::Approved,
                "reviewedBy": reviewer,
                "rejectionReason": null,
            }),
            Self::Reject { reviewer, reason } => json!({
                "status": ComplianceStatus::Rejected,
                "reviewedBy": reviewer,
                "rejectionReason": reason,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn reading(hour: u32, celsius: f64) -> TemperatureReading {
        TemperatureReading {
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap(),
            celsius,
        }
    }

    fn record(readings: Vec<TemperatureReading>) -> TemperatureRecord {
        TemperatureRecord {
            id: RecordId::from("t-1"),
            location: "Walk-in cooler 2".to_string(),
            min_celsius: 0.0,
            max_celsius: 5.0,
            readings,
            status: ComplianceStatus::Pending,
            reviewed_by: None,
            rejection_reason: None,
        }
    }

    #[rstest]
    fn test_kind_label() {
        assert_eq!(TemperatureRecord::KIND, "temperature_record");
    }

    #[rstest]
    #[case(vec![reading(6, 2.5), reading(12, 4.9)], 0)]
    #[case(vec![reading(6, -0.5), reading(12, 7.1), reading(18, 3.0)], 2)]
    #[case(vec![], 0)]
    fn test_excursions(#[case] readings: Vec<TemperatureReading>, #[case] expected: usize) {
        let record = record(readings);
        assert_eq!(record.excursions().count(), expected);
        assert_eq!(record.is_within_range(), expected == 0);
    }

    #[rstest]
    fn test_reject_then_approve_clears_reason() {
        let rejected = TemperatureAction::Reject {
            reviewer: "kim".to_string(),
            reason: "door left open".to_string(),
        }
        .transition(&record(Vec::new()));
        let approved = TemperatureAction::Approve {
            reviewer: "lee".to_string(),
        }
        .transition(&rejected);

        assert_eq!(approved.status, ComplianceStatus::Approved);
        assert_eq!(approved.reviewed_by.as_deref(), Some("lee"));
        assert_eq!(approved.rejection_reason, None);
    }

    #[rstest]
    fn test_deserializes_readings() {
        let parsed: TemperatureRecord = serde_json::from_value(json!({
            "_id": "t-9",
            "location": "Freezer",
            "minCelsius": -25.0,
            "maxCelsius": -18.0,
            "readings": [{"recordedAt": "2026-03-02T06:00:00Z", "celsius": -20.5}],
            "status": "pending"
        }))
        .unwrap();
        assert_eq!(parsed.readings.len(), 1);
        assert!(parsed.is_within_range());
    }
}
