//! Vendor compliance certificates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::action::Action;
use crate::entity::{Entity, RecordId};

/// Verification state of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    /// Uploaded, not yet checked.
    Pending,
    /// Checked and valid.
    Verified,
    /// Past its expiry date.
    Expired,
}

/// One certificate record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Record id.
    #[serde(rename = "_id", alias = "id")]
    pub id: RecordId,
    /// Certificate holder.
    pub vendor_name: String,
    /// Certificate type (`"organic"`, `"haccp"`, ...).
    pub certificate_type: String,
    /// Verification state.
    #[entity(tracked)]
    pub status: CertificateStatus,
    /// Last day of validity.
    #[entity(tracked)]
    pub expiry_date: NaiveDate,
    /// When an administrator verified it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl Certificate {
    /// Returns `true` if `today` is past the expiry date.
    #[must_use]
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        today > self.expiry_date
    }

    /// Returns the number of days left until expiry (negative once expired).
    #[must_use]
    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }
}

/// What an administrator can do to a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CertificateAction {
    /// Mark as checked and valid.
    Verify,
    /// Record a renewed certificate; it needs verification again.
    Renew {
        /// New last day of validity.
        expiry_date: NaiveDate,
    },
}

impl Action<Certificate> for CertificateAction {
    fn name(&self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Renew { .. } => "renew",
        }
    }

    fn transition(&self, current: &Certificate) -> Certificate {
        let mut next = current.clone();
        match self {
            Self::Verify => next.status = CertificateStatus::Verified,
            Self::Renew { expiry_date } => {
                next.status = CertificateStatus::Pending;
                next.expiry_date = *expiry_date;
            }
        }
        next
    }

    fn payload(&self, _current: &Certificate) -> Value {
        match self {
            Self::Verify => json!({ "status": CertificateStatus::Verified }),
            Self::Renew { expiry_date } => json!({
                "status": CertificateStatus::Pending,
                "expiryDate": expiry_date,
            }),
        }
    }
}
