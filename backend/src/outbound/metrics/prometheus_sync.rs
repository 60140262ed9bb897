//! Prometheus adapter for flight sync counters.
//!
//! Outcomes are exported through a single counter registered with the
//! registry that backs the `/metrics` endpoint.

use async_trait::async_trait;
use prometheus::{CounterVec, Opts, Registry};

use crate::domain::ports::{SyncMetrics, SyncMetricsError, SyncMetricsEvent};

/// Prometheus-backed sync metrics recorder.
///
/// # Exported metrics
///
/// - **Name**: `flight_syncs_total`
/// - **Type**: Counter
/// - **Labels**:
///   - `status`: `success` or `failure`
///   - `kind`: `cache` or `upstream` for successes; the failure kind label
///     (`adapter_not_found`, `circuit_open`, `upstream`, `flight_not_found`,
///     `persistence`, `conflict`) for failures
pub struct PrometheusSyncMetrics {
    syncs_total: CounterVec,
}

impl PrometheusSyncMetrics {
    /// Create and register metrics with the given registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name is already registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let syncs_total = CounterVec::new(
            Opts::new("flight_syncs_total", "Total flight syncs by outcome"),
            &["status", "kind"],
        )?;
        registry.register(Box::new(syncs_total.clone()))?;
        Ok(Self { syncs_total })
    }

    fn record(&self, event: &SyncMetricsEvent) {
        let (status, kind) = match event {
            SyncMetricsEvent::Success { from_cache: true } => ("success", "cache"),
            SyncMetricsEvent::Success { from_cache: false } => ("success", "upstream"),
            SyncMetricsEvent::Failure { kind } => ("failure", kind.as_label()),
        };
        self.syncs_total.with_label_values(&[status, kind]).inc();
    }
}

#[async_trait]
impl SyncMetrics for PrometheusSyncMetrics {
    async fn record_sync(&self, event: &SyncMetricsEvent) -> Result<(), SyncMetricsError> {
        self.record(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::SyncFailureKind;

    #[test]
    fn registers_metric_with_registry() {
        let registry = Registry::new();
        let metrics =
            PrometheusSyncMetrics::new(&registry).expect("metric registration should succeed");

        metrics.record(&SyncMetricsEvent::Success { from_cache: false });

        let families = registry.gather();
        assert!(
            families.iter().any(|f| f.name() == "flight_syncs_total"),
            "metric should be registered"
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = Registry::new();
        let _first = PrometheusSyncMetrics::new(&registry).expect("first registration");

        assert!(PrometheusSyncMetrics::new(&registry).is_err());
    }

    #[tokio::test]
    async fn cache_hits_and_failures_use_distinct_labels() {
        let registry = Registry::new();
        let metrics =
            PrometheusSyncMetrics::new(&registry).expect("metric registration should succeed");

        metrics
            .record_sync(&SyncMetricsEvent::Success { from_cache: true })
            .await
            .expect("recording should succeed");
        metrics
            .record_sync(&SyncMetricsEvent::Failure {
                kind: SyncFailureKind::CircuitOpen,
            })
            .await
            .expect("recording should succeed");
        metrics
            .record_sync(&SyncMetricsEvent::Failure {
                kind: SyncFailureKind::CircuitOpen,
            })
            .await
            .expect("recording should succeed");

        let hits = metrics.syncs_total.with_label_values(&["success", "cache"]);
        let open = metrics
            .syncs_total
            .with_label_values(&["failure", "circuit_open"]);
        assert_eq!(hits.get() as u64, 1);
        assert_eq!(open.get() as u64, 2);
    }
}
