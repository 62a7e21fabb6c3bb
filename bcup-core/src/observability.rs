/*!
Observability setup: structured logging and, with the `metrics` feature,
Prometheus counters for backup activity.
*/

#[cfg(feature = "metrics")]
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry as TracingRegistry};

use crate::{BcupError, Result};

#[cfg(feature = "metrics")]
static METRICS: OnceLock<Option<BcupMetrics>> = OnceLock::new();

/// Counters for backup operations
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct BcupMetrics {
    pub backups_created_total: IntCounter,
    pub backups_deleted_total: IntCounter,
    pub documents_restored_total: IntCounter,
    pub document_restore_failures_total: IntCounter,
    pub backup_size_bytes: Histogram,

    registry: Registry,
}

#[cfg(feature = "metrics")]
fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter> {
    let counter = IntCounter::new(name, help)
        .map_err(|e| BcupError::validation(format!("Failed to create {name} metric: {e}")))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| BcupError::validation(format!("Failed to register {name}: {e}")))?;
    Ok(counter)
}

#[cfg(feature = "metrics")]
impl BcupMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let backups_created_total = counter(
            &registry,
            "bcup_backups_created_total",
            "Backup files written",
        )?;
        let backups_deleted_total = counter(
            &registry,
            "bcup_backups_deleted_total",
            "Backup files deleted explicitly or by retention",
        )?;
        let documents_restored_total = counter(
            &registry,
            "bcup_documents_restored_total",
            "Documents written back to the database by restores",
        )?;
        let document_restore_failures_total = counter(
            &registry,
            "bcup_document_restore_failures_total",
            "Document writes that failed during restores",
        )?;

        let backup_size_bytes = Histogram::with_opts(
            HistogramOpts::new("bcup_backup_size_bytes", "Compressed size of written backups")
                .buckets(prometheus::exponential_buckets(1024.0, 4.0, 10).unwrap_or_default()),
        )
        .map_err(|e| BcupError::validation(format!("Failed to create bcup_backup_size_bytes metric: {e}")))?;
        registry
            .register(Box::new(backup_size_bytes.clone()))
            .map_err(|e| BcupError::validation(format!("Failed to register bcup_backup_size_bytes: {e}")))?;

        Ok(Self {
            backups_created_total,
            backups_deleted_total,
            documents_restored_total,
            document_restore_failures_total,
            backup_size_bytes,
            registry,
        })
    }

    /// Global metrics instance, `None` if the registry could not be built
    pub fn global() -> Option<&'static BcupMetrics> {
        METRICS
            .get_or_init(|| match Self::new() {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    tracing::warn!(error = %e, "Metrics disabled");
                    None
                }
            })
            .as_ref()
    }

    pub fn record_backup_created(&self, size_bytes: u64) {
        self.backups_created_total.inc();
        self.backup_size_bytes.observe(size_bytes as f64);
    }

    pub fn record_backup_deleted(&self) {
        self.backups_deleted_total.inc();
    }

    pub fn record_restore(&self, restored: usize, failed: usize) {
        self.documents_restored_total.inc_by(restored as u64);
        self.document_restore_failures_total.inc_by(failed as u64);
    }

    /// Gather metrics in Prometheus text format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| BcupError::validation(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer)
            .map_err(|e| BcupError::validation(format!("Failed to convert metrics to string: {e}")))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. With `json` set, events
/// are written as one JSON object per line.
pub fn init_observability(default_filter: &str, json: bool) -> Result<()> {
    #[cfg(feature = "metrics")]
    BcupMetrics::global();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| BcupError::validation(format!("Invalid log filter {default_filter:?}: {e}")))?;

    let installed = if json {
        set_global_default(
            TracingRegistry::default().with(filter).with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(false),
            ),
        )
    } else {
        set_global_default(TracingRegistry::default().with(filter).with(fmt::layer()))
    };
    installed.map_err(|e| BcupError::validation(format!("Failed to set global tracing subscriber: {e}")))?;

    tracing::debug!(json, "Observability initialized");
    Ok(())
}

/// Human-readable logs at `info`
pub fn init_default_observability() -> Result<()> {
    init_observability("info", false)
}
