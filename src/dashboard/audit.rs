//! On-site vendor audits.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::action::Action;
use crate::entity::{Entity, RecordId};

/// Prefix of locally assigned ids for audits not yet created remotely.
pub const DRAFT_ID_PREFIX: &str = "draft-audit-";

static NEXT_DRAFT: AtomicU64 = AtomicU64::new(1);

/// Progress of an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Planned for a date.
    Scheduled,
    /// The auditor is on site.
    InProgress,
    /// Finished with a score.
    Completed,
    /// Called off.
    Cancelled,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    /// Record id.
    #[serde(rename = "_id", alias = "id")]
    pub id: RecordId,
    /// Audited vendor.
    pub vendor_name: String,
    /// Assigned auditor.
    pub auditor: String,
    /// Planned date.
    pub scheduled_date: NaiveDate,
    /// Progress.
    #[entity(tracked)]
    pub status: AuditStatus,
    /// Final score out of 100.
    #[entity(tracked)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    /// Auditor findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub findings: Option<String>,
}

impl Audit {
    /// Creates a scheduled audit under a fresh local draft id.
    ///
    /// The server assigns the permanent id when the audit is created.
    #[must_use]
    pub fn schedule(
        vendor_name: impl Into<String>,
        auditor: impl Into<String>,
        scheduled_date: NaiveDate,
    ) -> Self {
        let sequence = NEXT_DRAFT.fetch_add(1, Ordering::Relaxed);
        Self {
            id: RecordId::new(format!("{DRAFT_ID_PREFIX}{sequence}")),
            vendor_name: vendor_name.into(),
            auditor: auditor.into(),
            scheduled_date,
            status: AuditStatus::Scheduled,
            score: None,
            findings: None,
        }
    }

    /// Returns `true` while the audit only exists locally.
    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.id.as_str().starts_with(DRAFT_ID_PREFIX)
    }
}

/// What an administrator can do to an audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction {
    /// Begin the audit.
    Start,
    /// Finish with a score.
    Complete {
        /// Score out of 100.
        score: u8,
        /// Auditor findings.
        #[serde(default)]
        findings: Option<String>,
    },
    /// Call the audit off.
    Cancel,
}

impl Action<Audit> for AuditAction {
    fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete { .. } => "complete",
            Self::Cancel => "cancel",
        }
    }

    fn transition(&self, current: &Audit) -> Audit {
        let mut next = current.clone();
        match self {
            Self::Start => next.status = AuditStatus::InProgress,
            Self::Complete { score, findings } => {
                next.status = AuditStatus::Completed;
                next.score = Some((*score).min(100));
                next.findings.clone_from(findings);
            }
            Self::Cancel => next.status = AuditStatus::Cancelled,
        }
        next
    }

    fn payload(&self, _current: &Audit) -> Value {
        match self {
            Self::Start => json!({ "status": AuditStatus::InProgress }),
            Self::Complete { score, findings } => json!({
                "status": AuditStatus::Completed,
                "score": (*score).min(100),
                "findings": findings,
            }),
            Self::Cancel => json!({ "status": AuditStatus::Cancelled }),
        }
    }
}
