//! Request and result shapes of the synchronization service.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use super::circuit_breaker::CircuitState;
use super::conflict::{ConflictResolutionMode, FlightDataConflict};
use crate::domain::ports::SyncWebhookPayload;
use crate::domain::{Error, FlightRecord, SyncStatus};

/// One flight to synchronize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFlightRequest {
    pub flight_number: String,
    pub airline_code: String,
    pub departure_date: NaiveDate,
    /// Exact scheduled departure, when known, so failures can be recorded
    /// on the stored row.
    pub scheduled_departure: Option<DateTime<Utc>>,
    /// Skip the cache read; the breaker still applies.
    pub force_refresh: bool,
    /// Overrides the service's default mode.
    pub conflict_resolution_mode: Option<ConflictResolutionMode>,
}

impl SyncFlightRequest {
    /// Request for a flight on `departure_date` using service defaults.
    pub fn new(
        flight_number: impl Into<String>,
        airline_code: impl Into<String>,
        departure_date: NaiveDate,
    ) -> Self {
        Self {
            flight_number: flight_number.into(),
            airline_code: airline_code.into(),
            departure_date,
            scheduled_departure: None,
            force_refresh: false,
            conflict_resolution_mode: None,
        }
    }

    /// Request addressed to a stored row.
    pub fn for_record(record: &FlightRecord) -> Self {
        Self {
            scheduled_departure: Some(record.scheduled_departure),
            ..Self::new(
                record.flight_number.clone(),
                record.airline_code.clone(),
                record.scheduled_departure.date_naive(),
            )
        }
    }

    /// Bypass the cache read.
    #[must_use]
    pub const fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }
}

/// Structured result of one sync; failures are data, never raised.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    pub flight_number: String,
    pub airline_code: String,
    pub departure_date: NaiveDate,
    pub success: bool,
    pub flight: Option<FlightRecord>,
    pub from_cache: bool,
    pub sync_status: Option<SyncStatus>,
    /// Adapter name used, when one was resolved.
    pub source: Option<String>,
    pub conflicts: Vec<FlightDataConflict>,
    /// Notification fanned out by this sync, if any field changed.
    pub notification: Option<SyncWebhookPayload>,
    pub error: Option<Error>,
    pub duration: Duration,
}

/// Partitioned results of a batch; `successful.len() + failed.len()`
/// equals the number of requests.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSyncResult {
    pub total: usize,
    pub successful: Vec<SyncResult>,
    pub failed: Vec<SyncResult>,
    pub duration: Duration,
}

/// One remembered sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub source: Option<String>,
    pub from_cache: bool,
    pub error: Option<String>,
}

/// A registered source and whether it currently accepts calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSource {
    pub name: String,
    pub airline_code: String,
    pub priority: u32,
    pub circuit_state: CircuitState,
}

/// Sync view of one stored flight.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatusReport {
    pub flight: FlightRecord,
    pub recent_history: Vec<SyncHistoryEntry>,
    pub available_sources: Vec<AvailableSource>,
}

/// Operator input for resolving a pending conflict.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictResolutionRequest {
    /// Defaults to MANUAL when a source or override is given, else to the
    /// service's configured mode.
    pub mode: Option<ConflictResolutionMode>,
    pub selected_source: Option<String>,
    pub override_value: Option<Value>,
}

/// A conflict after resolution together with the updated row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConflict {
    pub conflict: FlightDataConflict,
    pub flight: FlightRecord,
}

/// Result of processing one upstream webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookOutcome {
    pub processed: bool,
    pub event_id: String,
    pub result: SyncResult,
}

/// Result of a cache clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheClearOutcome {
    pub cleared: usize,
    pub remaining: usize,
}
