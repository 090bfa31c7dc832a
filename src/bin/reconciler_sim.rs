//! Dashboard simulator.
//!
//! Runs the quality-check walkthrough against in-memory remotes that lag
//! behind their writes:
//!
//! 1. an approval the server refuses is rolled back
//! 2. a retried approval succeeds
//! 3. a stale refresh inside the grace window keeps the approval
//! 4. once reads catch up, refresh confirms it from the server
//!
//! Configure with `RECONCILER_*` environment variables (see
//! `reconciler::config`) and `RUST_LOG`.

use std::error::Error;
use std::sync::Arc;

use chrono::{Days, Utc};
use reconciler::notify::TracingNotifier;
use reconciler::prelude::*;
use reconciler::remote::InMemoryRemote;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CHECK_ID: &str = "QC-9922";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reconciler=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!("Failed to load configuration from environment: {error}");
            tracing::info!("Using default configuration");
            EngineConfig::default()
        }
    };
    tracing::info!(
        grace_window = ?config.grace_window,
        refresh_after_mutation = config.refresh_after_mutation,
        "configuration loaded"
    );

    let quality_checks = InMemoryRemote::new(vec![
        QualityCheck::pending(CHECK_ID, "Acme Farms", "Romaine hearts"),
        QualityCheck::pending("QC-9923", "Acme Farms", "Baby spinach"),
    ])
    .with_shape(EnvelopeShape::Data);
    let today = Utc::now().date_naive();
    let certificates = InMemoryRemote::new(vec![Certificate {
        id: RecordId::from("CERT-104"),
        vendor_name: "Acme Farms".to_string(),
        certificate_type: "organic".to_string(),
        status: CertificateStatus::Pending,
        expiry_date: today.checked_add_days(Days::new(90)).unwrap_or(today),
        verified_at: None,
    }])
    .with_shape(EnvelopeShape::Paginated);
    let audits = InMemoryRemote::new(Vec::new())
        .with_shape(EnvelopeShape::Items)
        .with_id_assigner(|mut audit: Audit, sequence| {
            audit.id = RecordId::new(format!("AUD-{sequence:04}"));
            audit
        });
    let vendors = InMemoryRemote::new(vec![Vendor {
        id: RecordId::from("V-17"),
        name: "Acme Farms".to_string(),
        contact_email: "ops@acme.example".to_string(),
        status: VendorStatus::Active,
        suspension_reason: None,
        created_at: Some(Utc::now()),
    }]);

    let dashboard = Dashboard::new(
        DashboardRemotes {
            quality_checks: Arc::new(quality_checks.clone()),
            certificates: Arc::new(certificates),
            temperature_records: Arc::new(InMemoryRemote::new(Vec::new())),
            audits: Arc::new(audits),
            vendors: Arc::new(vendors),
        },
        config,
        Arc::new(TokioClock),
        Arc::new(TracingNotifier),
    )?;

    let summary = dashboard.refresh_all().await;
    for (kind, result) in &summary.results {
        match result {
            Ok(report) => tracing::info!(kind, %report, "initial load"),
            Err(error) => tracing::warn!(kind, %error, "initial load failed"),
        }
    }
    print_snapshot("initial", &dashboard.get_snapshot::<QualityCheck>())?;

    let id = RecordId::from(CHECK_ID);
    quality_checks.set_lagging(true);

    quality_checks.fail_next(RemoteError::server(503, "review service unavailable"));
    if let Err(error) = dashboard
        .perform_action::<QualityCheck>(&id, &QualityCheckAction::Approve)
        .await
    {
        tracing::info!(%error, "approval refused; local change rolled back");
    }
    print_snapshot("after refused approval", &dashboard.get_snapshot::<QualityCheck>())?;

    dashboard
        .perform_action::<QualityCheck>(&id, &QualityCheckAction::Approve)
        .await?;
    print_snapshot("after approval", &dashboard.get_snapshot::<QualityCheck>())?;

    let report = dashboard.refresh::<QualityCheck>().await?;
    tracing::info!(%report, "stale refresh inside the grace window");
    print_snapshot("after stale refresh", &dashboard.get_snapshot::<QualityCheck>())?;

    tokio::time::sleep(config.grace_window).await;
    quality_checks.sync_reads();
    let report = dashboard.refresh::<QualityCheck>().await?;
    tracing::info!(%report, "refresh after reads caught up");
    print_snapshot("after catch-up", &dashboard.get_snapshot::<QualityCheck>())?;

    let audit = dashboard
        .schedule_audit("Acme Farms", "kim", today.checked_add_days(Days::new(14)).unwrap_or(today))
        .await?;
    tracing::info!(audit_id = %audit.id, "audit scheduled");
    print_snapshot("audits", &dashboard.get_snapshot::<Audit>())?;

    Ok(())
}

fn print_snapshot<T: Serialize>(label: &str, records: &[T]) -> Result<(), serde_json::Error> {
    println!("--- {label} ---");
    println!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}
