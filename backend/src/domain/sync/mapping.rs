//! Mapping helpers from port and breaker errors to domain sync failures.

use chrono::{DateTime, Utc};

use super::circuit_breaker::CircuitBreakerError;
use crate::domain::Error;
use crate::domain::ports::{AirlineAdapterError, FlightRecordRepositoryError, SyncFailureKind};

/// Internal failure of one sync, carried until it is folded into a result.
#[derive(Debug, Clone)]
pub(super) struct SyncFailure {
    pub(super) kind: SyncFailureKind,
    pub(super) error: Error,
    pub(super) source: Option<String>,
}

impl SyncFailure {
    pub(super) const fn new(kind: SyncFailureKind, error: Error) -> Self {
        Self {
            kind,
            error,
            source: None,
        }
    }

    pub(super) fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_owned());
        self
    }
}

pub(super) fn map_breaker_error(
    error: CircuitBreakerError<AirlineAdapterError>,
    now: DateTime<Utc>,
) -> SyncFailure {
    match error {
        CircuitBreakerError::Open {
            name,
            next_retry_time,
        } => {
            let retry_after = u64::try_from((next_retry_time - now).num_seconds())
                .unwrap_or(0)
                .max(1);
            SyncFailure::new(
                SyncFailureKind::CircuitOpen,
                Error::circuit_breaker_open(format!("circuit breaker for {name} is open"))
                    .with_retry_after(retry_after),
            )
        }
        CircuitBreakerError::Inner(error) => {
            SyncFailure::new(SyncFailureKind::Upstream, map_adapter_error(error))
        }
    }
}

pub(super) fn map_adapter_error(error: AirlineAdapterError) -> Error {
    match &error {
        AirlineAdapterError::Timeout { .. } => Error::timeout(error.to_string()),
        AirlineAdapterError::RateLimited { .. } => Error::rate_limited(error.to_string()),
        AirlineAdapterError::Transport { .. }
        | AirlineAdapterError::Unauthorized { .. }
        | AirlineAdapterError::Decode { .. }
        | AirlineAdapterError::Configuration { .. } => {
            Error::service_unavailable(error.to_string())
        }
    }
}

pub(super) fn map_persistence_error(error: &FlightRecordRepositoryError) -> Error {
    match error {
        FlightRecordRepositoryError::Connection { .. } => {
            Error::service_unavailable(error.to_string())
        }
        FlightRecordRepositoryError::Query { .. } => Error::internal(error.to_string()),
    }
}

pub(super) fn persistence_failure(error: &FlightRecordRepositoryError) -> SyncFailure {
    SyncFailure::new(SyncFailureKind::Persistence, map_persistence_error(error))
}
