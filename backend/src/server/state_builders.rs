//! Builders wiring outbound adapters into the sync engine behind the HTTP
//! state.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use flight_sync::domain::ports::{SyncMetrics, SyncSubscriber, SyncWebhookPayload};
use flight_sync::domain::sync::{AdapterRegistry, CircuitBreakerConfig, SyncServicePorts};
use flight_sync::domain::{SyncScheduler, SynchronizationService};
use flight_sync::inbound::http::state::HttpState;
use flight_sync::outbound::airline::{HttpAirlineAdapter, HttpAirlineSettings};
use flight_sync::outbound::memory::InMemoryFlightRecordRepository;
use flight_sync::outbound::notifications::{ChannelSyncSubscriber, TracingSyncSubscriber};

use super::ServerConfig;

/// Engine state plus the notification stream the binary drains.
pub(crate) struct SyncRuntime {
    pub(crate) http_state: HttpState,
    pub(crate) notifications: UnboundedReceiver<SyncWebhookPayload>,
}

/// Register one HTTP adapter per catalogue entry.
///
/// # Errors
///
/// Returns [`std::io::Error`] naming the entry whose adapter cannot be
/// constructed, so misconfiguration fails startup instead of a batch.
pub(crate) fn build_registry(
    adapters: &[HttpAirlineSettings],
    clock: Arc<dyn Clock>,
    breaker: CircuitBreakerConfig,
) -> std::io::Result<AdapterRegistry> {
    let mut registry = AdapterRegistry::new(clock, breaker);
    for settings in adapters {
        let adapter = HttpAirlineAdapter::new(settings.clone()).map_err(|e| {
            std::io::Error::other(format!(
                "airline adapter {} misconfigured: {e}",
                settings.airline_code
            ))
        })?;
        registry.register(Arc::new(adapter));
    }
    if registry.is_empty() {
        warn!("no airline adapters configured; every sync will fail with ADAPTER_NOT_FOUND");
    }
    Ok(registry)
}

/// Build the service, its scheduler, and the notification channel.
///
/// # Errors
///
/// Propagates adapter construction failures from [`build_registry`].
pub(crate) fn build_sync_runtime(
    config: &ServerConfig,
    metrics: Arc<dyn SyncMetrics>,
) -> std::io::Result<SyncRuntime> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let registry = build_registry(&config.adapters, Arc::clone(&clock), config.sync.breaker)?;
    info!(adapters = registry.len(), "registered airline adapters");

    let repository = Arc::new(InMemoryFlightRecordRepository::new());
    let sync = Arc::new(SynchronizationService::new(
        SyncServicePorts::new(registry, repository.clone(), metrics),
        Arc::clone(&clock),
        config.sync.clone(),
    ));
    let (subscriber, notifications) = ChannelSyncSubscriber::channel();
    sync.subscribe(Arc::new(subscriber));

    let scheduler = SyncScheduler::new(sync.clone(), repository, clock, config.scheduler.clone());
    Ok(SyncRuntime {
        http_state: HttpState::new(sync, scheduler),
        notifications,
    })
}

/// Relay queued notifications until every sender is dropped.
pub(crate) async fn drain_notifications(mut notifications: UnboundedReceiver<SyncWebhookPayload>) {
    let relay = TracingSyncSubscriber;
    while let Some(payload) = notifications.recv().await {
        if let Err(error) = relay.notify(&payload) {
            warn!(event_id = %payload.event_id, error = %error, "notification relay failed");
        }
    }
}

/// Prometheus-backed sync counters registered on the exporter's registry.
///
/// # Errors
///
/// Returns [`std::io::Error`] if metric registration fails.
#[cfg(feature = "metrics")]
pub(crate) fn build_sync_metrics(
    registry: &prometheus::Registry,
) -> std::io::Result<Arc<dyn SyncMetrics>> {
    let metrics = flight_sync::outbound::metrics::PrometheusSyncMetrics::new(registry)
        .map_err(|e| std::io::Error::other(format!("sync metrics registration failed: {e}")))?;
    Ok(Arc::new(metrics))
}

/// Sync counters are discarded without the `metrics` feature.
#[cfg(not(feature = "metrics"))]
pub(crate) fn build_sync_metrics() -> Arc<dyn SyncMetrics> {
    Arc::new(flight_sync::domain::ports::NoOpSyncMetrics)
}
