//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every synchronization endpoint, the health probes,
//! and the schemas they exchange. The document backs Swagger UI in debug
//! builds and is exported via `cargo run --bin openapi-dump` for tooling.

use utoipa::OpenApi;

use crate::domain::sync::{
    CacheClearOutcome, CacheStats, CircuitBreakerStatus, ConflictResolutionMode,
    FlightDataConflict, SyncConfigPatch, SyncJob,
};
use crate::domain::sync_scheduler::{AppliedSyncConfig, SchedulerStatus};
use crate::domain::{Error, ErrorCode, FlightRecord};
use crate::inbound::http::conflicts::{
    PendingConflictsResponse, ResolveConflictRequestBody, ResolvedConflictResponse,
};
use crate::inbound::http::flights::{
    BatchSyncRequestBody, BatchSyncResponse, SyncFlightRequestBody, SyncResultResponse,
    SyncStatusResponse,
};
use crate::inbound::http::operations::{
    CircuitBreakersResponse, ForceRunResponse, SyncConfigResponse,
};
use crate::inbound::http::webhooks::WebhookResponse;

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Flight sync API",
        description = "Synchronization of stored flight records with upstream airline sources.",
        license(
            name = "Apache-2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0.html"
        )
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::flights::sync_flight,
        crate::inbound::http::flights::batch_sync_flights,
        crate::inbound::http::flights::flight_sync_status,
        crate::inbound::http::conflicts::list_pending_conflicts,
        crate::inbound::http::conflicts::resolve_conflict,
        crate::inbound::http::webhooks::receive_webhook,
        crate::inbound::http::operations::list_circuit_breakers,
        crate::inbound::http::operations::get_circuit_breaker,
        crate::inbound::http::operations::cache_stats,
        crate::inbound::http::operations::clear_cache,
        crate::inbound::http::operations::scheduler_status,
        crate::inbound::http::operations::force_scheduler_run,
        crate::inbound::http::operations::get_sync_config,
        crate::inbound::http::operations::update_sync_config,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        FlightRecord,
        FlightDataConflict,
        ConflictResolutionMode,
        SyncJob,
        SyncFlightRequestBody,
        BatchSyncRequestBody,
        SyncResultResponse,
        BatchSyncResponse,
        SyncStatusResponse,
        PendingConflictsResponse,
        ResolveConflictRequestBody,
        ResolvedConflictResponse,
        WebhookResponse,
        CircuitBreakersResponse,
        CircuitBreakerStatus,
        CacheStats,
        CacheClearOutcome,
        SchedulerStatus,
        ForceRunResponse,
        SyncConfigResponse,
        SyncConfigPatch,
        AppliedSyncConfig,
    )),
    tags(
        (name = "sync", description = "Flight synchronization"),
        (name = "conflicts", description = "Review of cross-source disagreements"),
        (name = "webhooks", description = "Signed upstream events"),
        (name = "operations", description = "Breakers, cache, scheduler, and configuration"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
