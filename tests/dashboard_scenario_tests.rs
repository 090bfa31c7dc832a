//! End-to-end dashboard scenarios against lagging in-memory remotes.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reconciler::clock::ManualClock;
use reconciler::config::EngineConfig;
use reconciler::dashboard::{
    Audit, AuditAction, AuditStatus, Certificate, CertificateAction, CertificateStatus,
    ComplianceStatus, Dashboard, DashboardRemotes, QualityCheck, QualityCheckAction,
    QualityCheckStatus, QualityResult, TemperatureAction, TemperatureRecord, Vendor,
    VendorAction, VendorStatus,
};
use reconciler::entity::RecordId;
use reconciler::envelope::EnvelopeShape;
use reconciler::notify::{CollectingNotifier, Outcome};
use reconciler::remote::{InMemoryRemote, RemoteError};
use rstest::{fixture, rstest};

const CHECK_ID: &str = "QC-9922";

struct Scenario {
    dashboard: Dashboard,
    quality_checks: InMemoryRemote<QualityCheck>,
    certificates: InMemoryRemote<Certificate>,
    temperature_records: InMemoryRemote<TemperatureRecord>,
    audits: InMemoryRemote<Audit>,
    vendors: InMemoryRemote<Vendor>,
    notifier: CollectingNotifier,
    clock: ManualClock,
}

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}

#[fixture]
fn scenario() -> Scenario {
    let quality_checks = InMemoryRemote::new(vec![
        QualityCheck::pending(CHECK_ID, "Acme Farms", "Romaine hearts"),
        QualityCheck::pending("QC-9923", "Acme Farms", "Baby spinach"),
    ])
    .with_shape(EnvelopeShape::Paginated);
    let certificates = InMemoryRemote::new(vec![Certificate {
        id: RecordId::from("CERT-1"),
        vendor_name: "Acme Farms".to_string(),
        certificate_type: "organic".to_string(),
        status: CertificateStatus::Pending,
        expiry_date: date(12, 31),
        verified_at: None,
    }])
    .with_shape(EnvelopeShape::Data);
    let temperature_records = InMemoryRemote::new(vec![TemperatureRecord {
        id: RecordId::from("TMP-1"),
        location: "Walk-in cooler 2".to_string(),
        min_celsius: 0.0,
        max_celsius: 5.0,
        readings: Vec::new(),
        status: ComplianceStatus::Pending,
        reviewed_by: None,
        rejection_reason: None,
    }])
    .with_shape(EnvelopeShape::Items);
    let audits = InMemoryRemote::new(Vec::new()).with_id_assigner(|mut audit: Audit, sequence| {
        audit.id = RecordId::new(format!("AUD-{sequence}"));
        audit
    });
    let vendors = InMemoryRemote::new(vec![Vendor {
        id: RecordId::from("V-17"),
        name: "Acme Farms".to_string(),
        contact_email: "ops@acme.example".to_string(),
        status: VendorStatus::Active,
        suspension_reason: None,
        created_at: None,
    }]);

    quality_checks.set_lagging(true);

    let notifier = CollectingNotifier::new();
    let clock = ManualClock::new();
    let dashboard = Dashboard::new(
        DashboardRemotes {
            quality_checks: Arc::new(quality_checks.clone()),
            certificates: Arc::new(certificates.clone()),
            temperature_records: Arc::new(temperature_records.clone()),
            audits: Arc::new(audits.clone()),
            vendors: Arc::new(vendors.clone()),
        },
        EngineConfig::default(),
        Arc::new(clock.clone()),
        Arc::new(notifier.clone()),
    )
    .unwrap();

    Scenario {
        dashboard,
        quality_checks,
        certificates,
        temperature_records,
        audits,
        vendors,
        notifier,
        clock,
    }
}

fn check_status(scenario: &Scenario, id: &RecordId) -> Option<QualityCheckStatus> {
    scenario
        .dashboard
        .engine::<QualityCheck>()
        .get(id)
        .map(|check| check.status)
}

// =============================================================================
// Quality-check walkthrough
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_quality_check_walkthrough(scenario: Scenario) {
    let id = RecordId::from(CHECK_ID);
    assert!(scenario.dashboard.refresh_all().await.is_success());
    assert_eq!(check_status(&scenario, &id), Some(QualityCheckStatus::Pending));

    // Refused approval: rolled back, one failure notification.
    scenario
        .quality_checks
        .fail_next(RemoteError::server(503, "review service unavailable"));
    let error = scenario
        .dashboard
        .perform_action::<QualityCheck>(&id, &QualityCheckAction::Approve)
        .await
        .unwrap_err();
    assert_eq!(error.outcome(), Outcome::RemoteFailure);
    assert_eq!(check_status(&scenario, &id), Some(QualityCheckStatus::Pending));
    assert!(!scenario.dashboard.is_busy::<QualityCheck>(&id));

    // Retried approval: confirmed; the follow-up refresh is stale but the
    // change is protected.
    let approved = scenario
        .dashboard
        .perform_action::<QualityCheck>(&id, &QualityCheckAction::Approve)
        .await
        .unwrap();
    assert_eq!(approved.result, Some(QualityResult::Pass));
    assert_eq!(check_status(&scenario, &id), Some(QualityCheckStatus::Approved));

    // Explicit stale refresh inside the grace window.
    scenario.clock.advance(Duration::from_millis(1_500));
    let report = scenario.dashboard.refresh::<QualityCheck>().await.unwrap();
    assert_eq!(report.kept_local, 1);
    assert_eq!(check_status(&scenario, &id), Some(QualityCheckStatus::Approved));

    // Reads catch up after the window: the server agrees.
    scenario.clock.advance(Duration::from_secs(1));
    scenario.quality_checks.sync_reads();
    let report = scenario.dashboard.refresh::<QualityCheck>().await.unwrap();
    assert_eq!(report.kept_local, 0);
    assert_eq!(check_status(&scenario, &id), Some(QualityCheckStatus::Approved));

    assert_eq!(scenario.notifier.count(Outcome::RemoteFailure), 1);
    assert_eq!(scenario.notifier.count(Outcome::Success), 1);
}

#[rstest]
#[tokio::test]
async fn test_stale_value_wins_once_window_expires(scenario: Scenario) {
    let id = RecordId::from(CHECK_ID);
    scenario.dashboard.refresh::<QualityCheck>().await.unwrap();

    scenario
        .dashboard
        .perform_action::<QualityCheck>(
            &id,
            &QualityCheckAction::Reject {
                reason: Some("wilted leaves".to_string()),
            },
        )
        .await
        .unwrap();
    scenario.clock.advance(Duration::from_secs(2));
    scenario.dashboard.refresh::<QualityCheck>().await.unwrap();

    assert_eq!(check_status(&scenario, &id), Some(QualityCheckStatus::Pending));
    assert_eq!(
        scenario.quality_checks.record(&id).map(|check| check.status),
        Some(QualityCheckStatus::Rejected)
    );
}

#[rstest]
#[tokio::test]
async fn test_appeal_after_reject(scenario: Scenario) {
    let id = RecordId::from("QC-9923");
    scenario.quality_checks.set_lagging(false);
    scenario.dashboard.refresh::<QualityCheck>().await.unwrap();

    scenario
        .dashboard
        .perform_action::<QualityCheck>(&id, &QualityCheckAction::Reject { reason: None })
        .await
        .unwrap();
    let appealed = scenario
        .dashboard
        .perform_action::<QualityCheck>(
            &id,
            &QualityCheckAction::Appeal {
                reason: "lab retest passed".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(appealed.status, QualityCheckStatus::Appealed);
    assert_eq!(appealed.appeal_reason.as_deref(), Some("lab retest passed"));
    assert_eq!(scenario.quality_checks.record(&id), Some(appealed));
}

// =============================================================================
// Other kinds
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_certificate_renewal_needs_verification_again(scenario: Scenario) {
    let id = RecordId::from("CERT-1");
    scenario.dashboard.refresh::<Certificate>().await.unwrap();

    scenario
        .dashboard
        .perform_action::<Certificate>(&id, &CertificateAction::Verify)
        .await
        .unwrap();
    let renewed = scenario
        .dashboard
        .perform_action::<Certificate>(
            &id,
            &CertificateAction::Renew {
                expiry_date: date(12, 31).checked_add_days(chrono::Days::new(365)).unwrap(),
            },
        )
        .await
        .unwrap();

    assert_eq!(renewed.status, CertificateStatus::Pending);
    assert_eq!(
        scenario.certificates.record(&id).map(|certificate| certificate.expiry_date),
        Some(renewed.expiry_date)
    );
}

#[rstest]
#[tokio::test]
async fn test_temperature_rejection_reaches_server(scenario: Scenario) {
    let id = RecordId::from("TMP-1");
    scenario.dashboard.refresh::<TemperatureRecord>().await.unwrap();

    scenario
        .dashboard
        .perform_action::<TemperatureRecord>(
            &id,
            &TemperatureAction::Reject {
                reviewer: "kim".to_string(),
                reason: "door left open overnight".to_string(),
            },
        )
        .await
        .unwrap();

    let stored = scenario.temperature_records.record(&id).unwrap();
    assert_eq!(stored.status, ComplianceStatus::Rejected);
    assert_eq!(stored.reviewed_by.as_deref(), Some("kim"));
}

#[rstest]
#[tokio::test]
async fn test_schedule_then_complete_audit(scenario: Scenario) {
    let audit = scenario
        .dashboard
        .schedule_audit("Acme Farms", "kim", date(11, 3))
        .await
        .unwrap();
    assert_eq!(audit.id, RecordId::from("AUD-1"));

    let completed = scenario
        .dashboard
        .perform_action::<Audit>(
            &audit.id,
            &AuditAction::Complete {
                score: 92,
                findings: Some("minor labelling issues".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(completed.status, AuditStatus::Completed);
    assert_eq!(scenario.audits.record(&audit.id), Some(completed));
    assert_eq!(scenario.dashboard.get_snapshot::<Audit>().len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_vendor_suspension_rejected_by_server_rolls_back(scenario: Scenario) {
    let id = RecordId::from("V-17");
    scenario.dashboard.refresh::<Vendor>().await.unwrap();
    scenario
        .vendors
        .fail_next(RemoteError::rejected(403, "not allowed"));

    let result = scenario
        .dashboard
        .perform_action::<Vendor>(
            &id,
            &VendorAction::Suspend {
                reason: "expired insurance".to_string(),
            },
        )
        .await;

    assert!(result.is_err());
    assert_eq!(
        scenario.dashboard.engine::<Vendor>().get(&id).map(|vendor| vendor.status),
        Some(VendorStatus::Active)
    );
}
