//! Upstream webhook receiver.
//!
//! ```text
//! POST /api/v1/sync/webhooks   (X-Signature: sha256=<hex hmac>)
//! ```
//!
//! The body is taken as raw bytes so the signature is checked over exactly
//! what the upstream signed.

use actix_web::{HttpRequest, post, web};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::Error;
use crate::inbound::http::ApiResult;
use crate::inbound::http::flights::SyncResultResponse;
use crate::inbound::http::state::HttpState;

/// Header carrying the hex HMAC-SHA256 of the body.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Acknowledgement of one processed webhook.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub processed: bool,
    pub event_id: String,
    pub result: SyncResultResponse,
}

/// Verify, parse, and act on an upstream flight event.
#[utoipa::path(
    post,
    path = "/api/v1/sync/webhooks",
    params((
        "X-Signature" = String,
        Header,
        description = "Hex HMAC-SHA256 of the raw body, optionally prefixed with sha256="
    )),
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Event processed", body = WebhookResponse),
        (status = 400, description = "Malformed event", body = Error),
        (status = 401, description = "Signature missing or invalid", body = Error)
    ),
    tags = ["webhooks"],
    operation_id = "receiveWebhook"
)]
#[post("/webhooks")]
pub async fn receive_webhook(
    state: web::Data<HttpState>,
    request: HttpRequest,
    body: web::Bytes,
) -> ApiResult<web::Json<WebhookResponse>> {
    let signature = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.sync.process_webhook(&body, signature).await?;
    Ok(web::Json(WebhookResponse {
        processed: outcome.processed,
        event_id: outcome.event_id,
        result: SyncResultResponse::from(outcome.result),
    }))
}

#[cfg(test)]
#[path = "webhooks_tests.rs"]
mod tests;
