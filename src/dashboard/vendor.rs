//! Vendor accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::action::Action;
use crate::entity::{Entity, RecordId};

/// Account state of a vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    /// May submit and trade.
    Active,
    /// Blocked by an administrator.
    Suspended,
}

/// One vendor record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    /// Record id.
    #[serde(rename = "_id", alias = "id")]
    pub id: RecordId,
    /// Trading name.
    pub name: String,
    /// Contact address.
    #[serde(default)]
    pub contact_email: String,
    /// Account state.
    #[entity(tracked)]
    pub status: VendorStatus,
    /// Why the vendor was suspended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension_reason: Option<String>,
    /// When the account was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// What an administrator can do to a vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum VendorAction {
    /// Block the vendor.
    Suspend {
        /// Why.
        reason: String,
    },
    /// Lift a suspension.
    Reinstate,
}

impl Action<Vendor> for VendorAction {
    fn name(&self) -> &'static str {
        match self {
            Self::Suspend { .. } => "suspend",
            Self::Reinstate => "reinstate",
        }
    }

    fn transition(&self, current: &Vendor) -> Vendor {
        let mut next = current.clone();
        match self {
            Self::Suspend { reason } => {
                next.status = VendorStatus::Suspended;
                next.suspension_reason = Some(reason.clone());
            }
            Self::Reinstate => {
                next.status = VendorStatus::Active;
                next.suspension_reason = None;
            }
        }
        next
    }

    fn payload(&self, _current: &Vendor) -> Value {
        match self {
            Self::Suspend { reason } => json!({
                "status": VendorStatus::Suspended,
                "suspensionReason": reason,
            }),
            Self::Reinstate => json!({
                "status": VendorStatus::Active,
                "suspensionReason": null,
            }),
        }
    }
}
