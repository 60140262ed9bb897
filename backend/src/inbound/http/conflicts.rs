//! Conflict review HTTP handlers.
//!
//! ```text
//! GET  /api/v1/sync/conflicts
//! POST /api/v1/sync/conflicts/{id}/resolve
//! ```

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::sync::{
    ConflictResolutionMode, ConflictResolutionRequest, FlightDataConflict, ResolvedConflict,
};
use crate::domain::{Error, FlightRecord};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_uuid};

/// Operator decision for one pending conflict.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveConflictRequestBody {
    /// Defaults to MANUAL when a source or override is given.
    pub mode: Option<ConflictResolutionMode>,
    /// Must name one of the two disagreeing sources.
    pub selected_source: Option<String>,
    #[serde(alias = "overrideData")]
    pub override_value: Option<Value>,
}

/// Pending conflicts awaiting an operator.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingConflictsResponse {
    pub conflicts: Vec<FlightDataConflict>,
}

/// A settled conflict and the row it updated.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConflictResponse {
    pub conflict: FlightDataConflict,
    pub flight: FlightRecord,
}

impl From<ResolvedConflict> for ResolvedConflictResponse {
    fn from(value: ResolvedConflict) -> Self {
        Self {
            conflict: value.conflict,
            flight: value.flight,
        }
    }
}

/// List conflicts retained for manual review, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/sync/conflicts",
    responses((status = 200, description = "Pending conflicts", body = PendingConflictsResponse)),
    tags = ["conflicts"],
    operation_id = "listPendingConflicts"
)]
#[get("/conflicts")]
pub async fn list_pending_conflicts(
    state: web::Data<HttpState>,
) -> web::Json<PendingConflictsResponse> {
    web::Json(PendingConflictsResponse {
        conflicts: state.sync.pending_conflicts(),
    })
}

/// Resolve a pending conflict and write the chosen value.
#[utoipa::path(
    post,
    path = "/api/v1/sync/conflicts/{id}/resolve",
    params(("id" = String, Path, description = "Conflict identifier")),
    request_body = ResolveConflictRequestBody,
    responses(
        (status = 200, description = "Conflict resolved", body = ResolvedConflictResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 404, description = "Conflict not found", body = Error),
        (status = 409, description = "Conflict cannot be resolved as asked", body = Error)
    ),
    tags = ["conflicts"],
    operation_id = "resolveConflict"
)]
#[post("/conflicts/{id}/resolve")]
pub async fn resolve_conflict(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    payload: web::Json<ResolveConflictRequestBody>,
) -> ApiResult<web::Json<ResolvedConflictResponse>> {
    let id = parse_uuid(&path.into_inner(), FieldName::new("id"))?;
    let ResolveConflictRequestBody {
        mode,
        selected_source,
        override_value,
    } = payload.into_inner();

    let resolved = state
        .sync
        .resolve_conflict_by_id(
            id,
            ConflictResolutionRequest {
                mode,
                selected_source,
                override_value,
            },
        )
        .await?;
    Ok(web::Json(ResolvedConflictResponse::from(resolved)))
}

#[cfg(test)]
#[path = "conflicts_tests.rs"]
mod tests;
