//! Operational HTTP handlers: breakers, cache, scheduler, and configuration.
//!
//! ```text
//! GET    /api/v1/sync/circuit-breakers
//! GET    /api/v1/sync/circuit-breakers/{airline}
//! GET    /api/v1/sync/cache/stats
//! DELETE /api/v1/sync/cache?source=&flightNumber=
//! GET    /api/v1/sync/scheduler
//! POST   /api/v1/sync/scheduler/run?batchSize=
//! GET    /api/v1/sync/config
//! PATCH  /api/v1/sync/config
//! ```

use std::collections::BTreeMap;

use actix_web::{delete, get, patch, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::sync::{
    CacheClearOutcome, CacheScope, CacheStats, CircuitBreakerStatus, SyncConfigPatch, SyncJob,
    SyncServiceConfigView,
};
use crate::domain::sync_scheduler::{
    AppliedSyncConfig, RunOutcome, SchedulerConfigView, SchedulerStatus,
};
use crate::domain::Error;
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, required_text};

/// Breaker status keyed by airline code.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakersResponse {
    pub breakers: BTreeMap<String, CircuitBreakerStatus>,
}

/// Optional filters for clearing cache entries.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ClearCacheQuery {
    /// Adapter name whose entries are cleared.
    pub source: Option<String>,
    /// Flight number whose entries are cleared.
    pub flight_number: Option<String>,
}

/// Optional batch size override for a forced run.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ForceRunQuery {
    pub batch_size: Option<usize>,
}

/// Result of a forced scheduler run.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForceRunResponse {
    /// True when another run was already in progress.
    pub skipped: bool,
    pub job: Option<SyncJob>,
}

/// Current service and scheduler configuration.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfigResponse {
    pub service: SyncServiceConfigView,
    pub scheduler: SchedulerConfigView,
}

/// Breaker status for every registered adapter.
#[utoipa::path(
    get,
    path = "/api/v1/sync/circuit-breakers",
    responses(
        (status = 200, description = "Breaker status per airline", body = CircuitBreakersResponse)
    ),
    tags = ["operations"],
    operation_id = "listCircuitBreakers"
)]
#[get("/circuit-breakers")]
pub async fn list_circuit_breakers(
    state: web::Data<HttpState>,
) -> web::Json<CircuitBreakersResponse> {
    web::Json(CircuitBreakersResponse {
        breakers: state.sync.circuit_breaker_statuses(),
    })
}

/// Breaker status for one airline's adapter.
#[utoipa::path(
    get,
    path = "/api/v1/sync/circuit-breakers/{airline}",
    params(("airline" = String, Path, description = "IATA airline code")),
    responses(
        (status = 200, description = "Breaker status", body = CircuitBreakerStatus),
        (status = 404, description = "No adapter for the airline", body = Error)
    ),
    tags = ["operations"],
    operation_id = "getCircuitBreaker"
)]
#[get("/circuit-breakers/{airline}")]
pub async fn get_circuit_breaker(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<CircuitBreakerStatus>> {
    let airline = required_text(Some(path.into_inner()), FieldName::new("airline"))?;
    let status = state.sync.circuit_breaker_status(&airline)?;
    Ok(web::Json(status))
}

/// Cache counters and a sample of live entries.
#[utoipa::path(
    get,
    path = "/api/v1/sync/cache/stats",
    responses((status = 200, description = "Cache statistics", body = CacheStats)),
    tags = ["operations"],
    operation_id = "getCacheStats"
)]
#[get("/cache/stats")]
pub async fn cache_stats(state: web::Data<HttpState>) -> web::Json<CacheStats> {
    web::Json(state.sync.cache_stats())
}

/// Clear cache entries; without filters the whole cache is cleared.
#[utoipa::path(
    delete,
    path = "/api/v1/sync/cache",
    params(ClearCacheQuery),
    responses((status = 200, description = "Entries cleared", body = CacheClearOutcome)),
    tags = ["operations"],
    operation_id = "clearCache"
)]
#[delete("/cache")]
pub async fn clear_cache(
    state: web::Data<HttpState>,
    query: web::Query<ClearCacheQuery>,
) -> web::Json<CacheClearOutcome> {
    let ClearCacheQuery {
        source,
        flight_number,
    } = query.into_inner();
    let scope = CacheScope {
        source: non_blank(source),
        flight_number: non_blank(flight_number).map(|number| number.to_ascii_uppercase()),
    };
    web::Json(state.sync.clear_cache(&scope))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Scheduler status, statistics, and the most recent job.
#[utoipa::path(
    get,
    path = "/api/v1/sync/scheduler",
    responses((status = 200, description = "Scheduler status", body = SchedulerStatus)),
    tags = ["operations"],
    operation_id = "getSchedulerStatus"
)]
#[get("/scheduler")]
pub async fn scheduler_status(state: web::Data<HttpState>) -> web::Json<SchedulerStatus> {
    web::Json(state.scheduler.get_status())
}

/// Run a resynchronization pass now.
#[utoipa::path(
    post,
    path = "/api/v1/sync/scheduler/run",
    params(ForceRunQuery),
    responses(
        (status = 200, description = "Run finished or skipped", body = ForceRunResponse),
        (status = 400, description = "Invalid batch size", body = Error)
    ),
    tags = ["operations"],
    operation_id = "forceSchedulerRun"
)]
#[post("/scheduler/run")]
pub async fn force_scheduler_run(
    state: web::Data<HttpState>,
    query: web::Query<ForceRunQuery>,
) -> ApiResult<web::Json<ForceRunResponse>> {
    let batch_size = query.into_inner().batch_size;
    if batch_size == Some(0) {
        return Err(Error::invalid_request("batchSize must be greater than zero")
            .with_details(serde_json::json!({ "field": "batchSize" })));
    }

    let response = match state.scheduler.force_run(batch_size).await {
        RunOutcome::Completed(job) => ForceRunResponse {
            skipped: false,
            job: Some(job),
        },
        RunOutcome::Skipped => ForceRunResponse {
            skipped: true,
            job: None,
        },
    };
    Ok(web::Json(response))
}

/// Current configuration.
#[utoipa::path(
    get,
    path = "/api/v1/sync/config",
    responses((status = 200, description = "Configuration", body = SyncConfigResponse)),
    tags = ["operations"],
    operation_id = "getSyncConfig"
)]
#[get("/config")]
pub async fn get_sync_config(state: web::Data<HttpState>) -> web::Json<SyncConfigResponse> {
    web::Json(SyncConfigResponse {
        service: state.sync.config(),
        scheduler: state.scheduler.config(),
    })
}

/// Apply a partial configuration update.
#[utoipa::path(
    patch,
    path = "/api/v1/sync/config",
    request_body = SyncConfigPatch,
    responses(
        (status = 200, description = "Configuration applied", body = AppliedSyncConfig),
        (status = 400, description = "Invalid value", body = Error)
    ),
    tags = ["operations"],
    operation_id = "updateSyncConfig"
)]
#[patch("/config")]
pub async fn update_sync_config(
    state: web::Data<HttpState>,
    payload: web::Json<SyncConfigPatch>,
) -> ApiResult<web::Json<AppliedSyncConfig>> {
    let applied = state.scheduler.update_config(&payload.into_inner())?;
    Ok(web::Json(applied))
}

#[cfg(test)]
#[path = "operations_tests.rs"]
mod tests;
