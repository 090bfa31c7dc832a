//! Quality-check results submitted by vendors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::action::Action;
use crate::entity::{Entity, RecordId};

/// Review state of a quality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCheckStatus {
    /// Awaiting review.
    Pending,
    /// Accepted by an administrator.
    Approved,
    /// Refused by an administrator.
    Rejected,
    /// The vendor contested a rejection.
    Appealed,
}

/// Inspection verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityResult {
    /// Meets every requirement.
    Pass,
    /// Fails at least one requirement.
    Fail,
    /// Acceptable with follow-up.
    Conditional,
}

/// One quality-check record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
#[entity(kind = "quality_check")]
pub struct QualityCheck {
    /// Record id.
    #[serde(rename = "_id", alias = "id")]
    pub id: RecordId,
    /// Submitting vendor.
    pub vendor_name: String,
    /// Inspected product.
    pub product_name: String,
    /// Batch or lot number.
    #[serde(default)]
    pub batch_number: String,
    /// Review state.
    #[entity(tracked)]
    pub status: QualityCheckStatus,
    /// Verdict, once reviewed.
    #[entity(tracked)]
    #[serde(default)]
    pub result: Option<QualityResult>,
    /// Reviewer notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Vendor's appeal text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appeal_reason: Option<String>,
    /// When the inspection took place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspected_at: Option<DateTime<Utc>>,
}

impl QualityCheck {
    /// Creates a pending check.
    #[must_use]
    pub fn pending(
        id: impl Into<RecordId>,
        vendor_name: impl Into<String>,
        product_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            vendor_name: vendor_name.into(),
            product_name: product_name.into(),
            batch_number: String::new(),
            status: QualityCheckStatus::Pending,
            result: None,
            notes: None,
            appeal_reason: None,
            inspected_at: None,
        }
    }
}

/// What an administrator can do to a quality check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum QualityCheckAction {
    /// Accept with a passing result.
    Approve,
    /// Refuse with a failing result.
    Reject {
        /// Why the check was refused.
        #[serde(default)]
        reason: Option<String>,
    },
    /// Record a vendor appeal.
    Appeal {
        /// The vendor's argument.
        reason: String,
    },
}

impl Action<QualityCheck> for QualityCheckAction {
    fn name(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject { .. } => "reject",
            Self::Appeal { .. } => "appeal",
        }
    }

    fn transition(&self, current: &QualityCheck) -> QualityCheck {
        let mut next = current.clone();
        match self {
            Self::Approve => {
                next.status = QualityCheckStatus::Approved;
                next.result = Some(QualityResult::Pass);
            }
            Self::Reject { reason } => {
                next.status = QualityCheckStatus::Rejected;
                next.result = Some(QualityResult::Fail);
                next.notes.clone_from(reason);
            }
            Self::Appeal { reason } => {
                next.status = QualityCheckStatus::Appealed;
                next.appeal_reason = Some(reason.clone());
            }
        }
        next
    }

    fn payload(&self, _current: &QualityCheck) -> Value {
        match self {
            Self::Approve => json!({
                "status": QualityCheckStatus::Approved,
                "result": QualityResult::Pass,
            }),
            Self::Reject { reason } => json!({
                "status": QualityCheckStatus::Rejected,
                "result": QualityResult::Fail,
                "notes": reason,
            }),
            Self::Appeal { reason } => json!({
                "status": QualityCheckStatus::Appealed,
                "appealReason": reason,
            }),
        }
    }
}
