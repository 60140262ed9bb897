//! Flight synchronization HTTP handlers.
//!
//! ```text
//! POST /api/v1/sync/flights/sync
//! POST /api/v1/sync/flights/batch
//! GET  /api/v1/sync/flights/{id}/status
//! ```

use actix_web::{get, post, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::SyncWebhookPayload;
use crate::domain::sync::{
    AvailableSource, BatchSyncResult, ConflictResolutionMode, FlightDataConflict,
    SyncFlightRequest, SyncHistoryEntry, SyncResult, SyncStatusReport,
};
use crate::domain::{Error, FlightRecord, SyncStatus};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, parse_date, parse_uuid, required_text, too_many_items_error,
};

/// Largest batch accepted in one request.
pub const MAX_BATCH_SIZE: usize = 500;

/// Request payload naming one flight to synchronize.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncFlightRequestBody {
    #[schema(example = "LH400")]
    pub flight_number: Option<String>,
    #[schema(example = "LH")]
    pub airline_code: Option<String>,
    #[schema(example = "2026-02-25")]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
    pub conflict_resolution_mode: Option<ConflictResolutionMode>,
}

impl SyncFlightRequestBody {
    fn into_request(self) -> Result<SyncFlightRequest, Error> {
        let flight_number = required_text(self.flight_number, FieldName::new("flightNumber"))?;
        let airline_code = required_text(self.airline_code, FieldName::new("airlineCode"))?;
        let departure_date = parse_date(self.departure_date, FieldName::new("departureDate"))?;
        Ok(SyncFlightRequest {
            force_refresh: self.force_refresh,
            conflict_resolution_mode: self.conflict_resolution_mode,
            ..SyncFlightRequest::new(
                flight_number.to_ascii_uppercase(),
                airline_code.to_ascii_uppercase(),
                departure_date,
            )
        })
    }
}

/// Request payload for a batch of flights.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSyncRequestBody {
    #[serde(default)]
    pub flights: Vec<SyncFlightRequestBody>,
    pub conflict_resolution_mode: Option<ConflictResolutionMode>,
}

/// Result of one flight sync.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResultResponse {
    pub flight_number: String,
    pub airline_code: String,
    pub departure_date: NaiveDate,
    pub success: bool,
    pub flight: Option<FlightRecord>,
    pub from_cache: bool,
    pub sync_status: Option<SyncStatus>,
    pub source: Option<String>,
    pub conflicts: Vec<FlightDataConflict>,
    pub notification: Option<SyncWebhookPayload>,
    pub error: Option<Error>,
    pub duration_ms: u64,
}

impl From<SyncResult> for SyncResultResponse {
    fn from(value: SyncResult) -> Self {
        Self {
            flight_number: value.flight_number,
            airline_code: value.airline_code,
            departure_date: value.departure_date,
            success: value.success,
            flight: value.flight,
            from_cache: value.from_cache,
            sync_status: value.sync_status,
            source: value.source,
            conflicts: value.conflicts,
            notification: value.notification,
            error: value.error,
            duration_ms: u64::try_from(value.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Partitioned batch results.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSyncResponse {
    pub total: usize,
    pub successful: Vec<SyncResultResponse>,
    pub failed: Vec<SyncResultResponse>,
    pub duration_ms: u64,
}

impl From<BatchSyncResult> for BatchSyncResponse {
    fn from(value: BatchSyncResult) -> Self {
        Self {
            total: value.total,
            successful: value.successful.into_iter().map(Into::into).collect(),
            failed: value.failed.into_iter().map(Into::into).collect(),
            duration_ms: u64::try_from(value.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Sync view of one stored flight.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub flight: FlightRecord,
    pub recent_history: Vec<SyncHistoryEntry>,
    pub available_sources: Vec<AvailableSource>,
    /// Next scheduler tick; absent while the scheduler is stopped.
    pub next_scheduled_sync: Option<DateTime<Utc>>,
}

impl SyncStatusResponse {
    fn new(report: SyncStatusReport, next_scheduled_sync: Option<DateTime<Utc>>) -> Self {
        Self {
            flight: report.flight,
            recent_history: report.recent_history,
            available_sources: report.available_sources,
            next_scheduled_sync,
        }
    }
}

/// Synchronize one flight from its airline's adapter.
///
/// A failed sync is reported through the error envelope; the status class
/// follows the failure code.
#[utoipa::path(
    post,
    path = "/api/v1/sync/flights/sync",
    request_body = SyncFlightRequestBody,
    responses(
        (status = 200, description = "Flight synchronized", body = SyncResultResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 404, description = "Unknown airline or flight", body = Error),
        (status = 429, description = "Upstream throttled", body = Error),
        (status = 503, description = "Circuit breaker open", body = Error),
        (status = 504, description = "Upstream timed out", body = Error)
    ),
    tags = ["sync"],
    operation_id = "syncFlight"
)]
#[post("/flights/sync")]
pub async fn sync_flight(
    state: web::Data<HttpState>,
    payload: web::Json<SyncFlightRequestBody>,
) -> ApiResult<web::Json<SyncResultResponse>> {
    let request = payload.into_inner().into_request()?;
    let result = state.sync.sync_flight(request).await;
    match result.error.clone() {
        Some(error) if !result.success => Err(error),
        _ => Ok(web::Json(SyncResultResponse::from(result))),
    }
}

/// Synchronize many flights; individual failures are listed, not raised.
#[utoipa::path(
    post,
    path = "/api/v1/sync/flights/batch",
    request_body = BatchSyncRequestBody,
    responses(
        (status = 200, description = "Batch processed", body = BatchSyncResponse),
        (status = 400, description = "Invalid request", body = Error)
    ),
    tags = ["sync"],
    operation_id = "batchSyncFlights"
)]
#[post("/flights/batch")]
pub async fn batch_sync_flights(
    state: web::Data<HttpState>,
    payload: web::Json<BatchSyncRequestBody>,
) -> ApiResult<web::Json<BatchSyncResponse>> {
    let BatchSyncRequestBody {
        flights,
        conflict_resolution_mode,
    } = payload.into_inner();
    if flights.len() > MAX_BATCH_SIZE {
        return Err(too_many_items_error(FieldName::new("flights"), MAX_BATCH_SIZE));
    }
    let requests = flights
        .into_iter()
        .map(SyncFlightRequestBody::into_request)
        .collect::<Result<Vec<_>, _>>()?;

    let batch = state
        .sync
        .batch_sync_flights(requests, conflict_resolution_mode)
        .await;
    Ok(web::Json(BatchSyncResponse::from(batch)))
}

/// Sync status, recent history, and available sources for a stored flight.
#[utoipa::path(
    get,
    path = "/api/v1/sync/flights/{id}/status",
    params(("id" = String, Path, description = "Stored flight identifier")),
    responses(
        (status = 200, description = "Sync status", body = SyncStatusResponse),
        (status = 400, description = "Invalid identifier", body = Error),
        (status = 404, description = "Flight not found", body = Error)
    ),
    tags = ["sync"],
    operation_id = "getFlightSyncStatus"
)]
#[get("/flights/{id}/status")]
pub async fn flight_sync_status(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<SyncStatusResponse>> {
    let id = parse_uuid(&path.into_inner(), FieldName::new("id"))?;
    let report = state.sync.sync_status(id).await?;
    Ok(web::Json(SyncStatusResponse::new(
        report,
        state.scheduler.next_run(),
    )))
}

#[cfg(test)]
#[path = "flights_tests.rs"]
mod tests;
