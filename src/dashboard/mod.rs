//! The operations dashboard: its record kinds and a facade over their engines.
//!
//! Each screen of the dashboard works on one kind:
//!
//! | Kind                  | Actions                                     |
//! |-----------------------|---------------------------------------------|
//! | [`QualityCheck`]      | approve, reject, appeal                     |
//! | [`Certificate`]       | verify, renew                               |
//! | [`TemperatureRecord`] | approve, reject                             |
//! | [`Audit`]             | start, complete, cancel; created by schedule |
//! | [`Vendor`]            | suspend, reinstate                          |
//!
//! [`Dashboard`] owns one [`Engine`] per kind and addresses them by type:
//!
//! ```rust,ignore
//! dashboard
//!     .perform_action::<QualityCheck>(&id, &QualityCheckAction::Approve)
//!     .await?;
//! let checks = dashboard.get_snapshot::<QualityCheck>();
//! ```

mod audit;
mod certificate;
mod quality_check;
mod temperature;
mod vendor;

pub use audit::{Audit, AuditAction, AuditStatus, DRAFT_ID_PREFIX};
pub use certificate::{Certificate, CertificateAction, CertificateStatus};
pub use quality_check::{QualityCheck, QualityCheckAction, QualityCheckStatus, QualityResult};
pub use temperature::{ComplianceStatus, TemperatureAction, TemperatureReading, TemperatureRecord};
pub use vendor::{Vendor, VendorAction, VendorStatus};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::action::Action;
use crate::clock::{Clock, TokioClock};
use crate::config::{ConfigError, EngineConfig};
use crate::engine::{Engine, RefreshHandle};
use crate::entity::{Entity, RecordId};
use crate::error::ReconcileError;
use crate::notify::{Notifier, TracingNotifier};
use crate::reconcile::MergeReport;
use crate::remote::Remote;

// =============================================================================
// DashboardKind
// =============================================================================

/// A record kind managed by the [`Dashboard`].
pub trait DashboardKind: Entity<Id = RecordId> + Serialize + DeserializeOwned {
    /// The actions an administrator can take on this kind.
    type Action: Action<Self> + fmt::Debug;

    /// Returns the dashboard's engine for this kind.
    fn engine(dashboard: &Dashboard) -> &Engine<Self>;
}

macro_rules! dashboard_kind {
    ($kind:ty, $action:ty, $field:ident) => {
        impl DashboardKind for $kind {
            type Action = $action;

            fn engine(dashboard: &Dashboard) -> &Engine<Self> {
                &dashboard.$field
            }
        }
    };
}

dashboard_kind!(QualityCheck, QualityCheckAction, quality_checks);
dashboard_kind!(Certificate, CertificateAction, certificates);
dashboard_kind!(TemperatureRecord, TemperatureAction, temperature_records);
dashboard_kind!(Audit, AuditAction, audits);
dashboard_kind!(Vendor, VendorAction, vendors);

// =============================================================================
// Dashboard
// =============================================================================

/// One remote per dashboard kind.
pub struct DashboardRemotes {
    /// Quality-check API.
    pub quality_checks: Arc<dyn Remote<QualityCheck>>,
    /// Certificate API.
    pub certificates: Arc<dyn Remote<Certificate>>,
    /// Temperature-record API.
    pub temperature_records: Arc<dyn Remote<TemperatureRecord>>,
    /// Audit API.
    pub audits: Arc<dyn Remote<Audit>>,
    /// Vendor API.
    pub vendors: Arc<dyn Remote<Vendor>>,
}

impl fmt::Debug for DashboardRemotes {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("DashboardRemotes").finish_non_exhaustive()
    }
}

/// Facade over one engine per record kind.
#[derive(Debug, Clone)]
pub struct Dashboard {
    quality_checks: Engine<QualityCheck>,
    certificates: Engine<Certificate>,
    temperature_records: Engine<TemperatureRecord>,
    audits: Engine<Audit>,
    vendors: Engine<Vendor>,
}

impl Dashboard {
    /// Builds every engine with the same configuration, clock and notifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn new(
        remotes: DashboardRemotes,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        macro_rules! engine {
            ($remote:expr) => {
                Engine::builder_shared($remote)
                    .config(config)
                    .shared_clock(Arc::clone(&clock))
                    .shared_notifier(Arc::clone(&notifier))
                    .build()?
            };
        }

        Ok(Self {
            quality_checks: engine!(remotes.quality_checks),
            certificates: engine!(remotes.certificates),
            temperature_records: engine!(remotes.temperature_records),
            audits: engine!(remotes.audits),
            vendors: engine!(remotes.vendors),
        })
    }

    /// Builds a dashboard with the default configuration, tokio's clock and
    /// notifications forwarded to `tracing`.
    ///
    /// # Errors
    ///
    /// Never fails with the default configuration; the signature matches
    /// [`new`](Self::new).
    pub fn with_defaults(remotes: DashboardRemotes) -> Result<Self, ConfigError> {
        Self::new(
            remotes,
            EngineConfig::default(),
            Arc::new(TokioClock),
            Arc::new(TracingNotifier),
        )
    }

    /// Returns the engine for kind `K`.
    #[must_use]
    pub fn engine<K: DashboardKind>(&self) -> &Engine<K> {
        K::engine(self)
    }

    /// Returns a detached copy of every record of kind `K`.
    #[must_use]
    pub fn get_snapshot<K: DashboardKind>(&self) -> Vec<K> {
        K::engine(self).snapshot()
    }

    /// Returns `true` if a mutation is in flight for record `id` of kind `K`.
    #[must_use]
    pub fn is_busy<K: DashboardKind>(&self, id: &RecordId) -> bool {
        K::engine(self).is_busy(id)
    }

    /// Performs `action` on record `id` of kind `K`.
    ///
    /// # Errors
    ///
    /// See [`Engine::perform_action`].
    pub async fn perform_action<K: DashboardKind>(
        &self,
        id: &RecordId,
        action: &K::Action,
    ) -> Result<K, ReconcileError> {
        K::engine(self).perform_action(id, action).await
    }

    /// Deletes record `id` of kind `K` once the remote confirms.
    ///
    /// # Errors
    ///
    /// See [`Engine::delete`].
    pub async fn delete<K: DashboardKind>(&self, id: &RecordId) -> Result<K, ReconcileError> {
        K::engine(self).delete(id).await
    }

    /// Refreshes kind `K`.
    ///
    /// # Errors
    ///
    /// See [`Engine::refresh`].
    pub async fn refresh<K: DashboardKind>(&self) -> Result<MergeReport, ReconcileError> {
        K::engine(self).refresh().await
    }

    /// Refreshes every kind concurrently. One failing kind does not stop the
    /// others.
    pub async fn refresh_all(&self) -> RefreshSummary {
        let (quality_checks, certificates, temperature_records, audits, vendors) = futures::join!(
            self.quality_checks.refresh(),
            self.certificates.refresh(),
            self.temperature_records.refresh(),
            self.audits.refresh(),
            self.vendors.refresh(),
        );
        RefreshSummary {
            results: vec![
                (QualityCheck::KIND, quality_checks),
                (Certificate::KIND, certificates),
                (TemperatureRecord::KIND, temperature_records),
                (Audit::KIND, audits),
                (Vendor::KIND, vendors),
            ],
        }
    }

    /// Schedules an audit optimistically. The returned audit carries the
    /// server-assigned id.
    ///
    /// # Errors
    ///
    /// See [`Engine::create`].
    pub async fn schedule_audit(
        &self,
        vendor_name: impl Into<String>,
        auditor: impl Into<String>,
        scheduled_date: NaiveDate,
    ) -> Result<Audit, ReconcileError> {
        self.audits
            .create(Audit::schedule(vendor_name, auditor, scheduled_date))
            .await
    }

    /// Starts a periodic refresh for every kind.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, or with a zero interval.
    pub fn spawn_periodic_refresh(&self, interval: Duration) -> Vec<RefreshHandle> {
        vec![
            self.quality_checks.spawn_periodic_refresh(interval),
            self.certificates.spawn_periodic_refresh(interval),
            self.temperature_records.spawn_periodic_refresh(interval),
            self.audits.spawn_periodic_refresh(interval),
            self.vendors.spawn_periodic_refresh(interval),
        ]
    }
}

/// Per-kind results of [`Dashboard::refresh_all`].
#[derive(Debug, Clone)]
pub struct RefreshSummary {
    /// Kind label and refresh result, in a fixed kind order.
    pub results: Vec<(&'static str, Result<MergeReport, ReconcileError>)>,
}

impl RefreshSummary {
    /// Returns `true` if every kind refreshed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|(_, result)| result.is_ok())
    }

    /// Iterates over the kinds that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ReconcileError> {
        self.results
            .iter()
            .filter_map(|(_, result)| result.as_ref().err())
    }
}
