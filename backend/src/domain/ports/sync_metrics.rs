//! Domain port surface for flight sync success/failure counters.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording sync metrics.
    pub enum SyncMetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } =>
            "sync metrics exporter failed: {message}",
    }
}

/// Failure reason labels for flight syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SyncFailureKind {
    /// No adapter is registered for the airline.
    AdapterNotFound,
    /// The adapter's circuit breaker short-circuited the call.
    CircuitOpen,
    /// Upstream failed or timed out.
    Upstream,
    /// Upstream reported the flight does not exist.
    FlightNotFound,
    /// Persistence rejected the write.
    Persistence,
    /// A conflicting value could not be written back.
    Conflict,
}

impl SyncFailureKind {
    /// Metric label for this kind.
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::AdapterNotFound => "adapter_not_found",
            Self::CircuitOpen => "circuit_open",
            Self::Upstream => "upstream",
            Self::FlightNotFound => "flight_not_found",
            Self::Persistence => "persistence",
            Self::Conflict => "conflict",
        }
    }
}

/// Outcome of one flight sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMetricsEvent {
    /// Sync succeeded; `from_cache` marks a cache hit.
    Success { from_cache: bool },
    /// Sync failed for `kind`.
    Failure { kind: SyncFailureKind },
}

/// Metrics recording port for flight sync counters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncMetrics: Send + Sync {
    /// Record one sync outcome.
    async fn record_sync(&self, event: &SyncMetricsEvent) -> Result<(), SyncMetricsError>;
}

/// No-op implementation used when metrics are disabled or in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSyncMetrics;

#[async_trait]
impl SyncMetrics for NoOpSyncMetrics {
    async fn record_sync(&self, _event: &SyncMetricsEvent) -> Result<(), SyncMetricsError> {
        Ok(())
    }
}
