//! Tests for flight synchronization handlers.

use super::*;
use crate::domain::ports::AirlineAdapterError;
use crate::domain::sync::{CircuitBreakerConfig, SyncServiceConfig};
use crate::inbound::http::test_utils::{TestContext, test_app};
use actix_web::http::StatusCode;
use actix_web::http::header::RETRY_AFTER;
use actix_web::test as actix_test;
use rstest::rstest;
use serde_json::{Value, json};
use std::time::Duration;

fn lh001_body() -> Value {
    json!({
        "flightNumber": "LH001",
        "airlineCode": "LH",
        "departureDate": "2026-02-25"
    })
}

fn post_json(uri: &str, body: &Value) -> actix_test::TestRequest {
    actix_test::TestRequest::post().uri(uri).set_json(body)
}

#[rstest]
#[actix_web::test]
async fn sync_flight_persists_then_serves_from_cache() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let req = post_json("/api/v1/sync/flights/sync", &lh001_body()).to_request();
    let first = actix_test::call_service(&app, req).await;
    assert_eq!(first.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(first).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["fromCache"], false);
    assert_eq!(body["source"], "Lufthansa");
    assert_eq!(body["flight"]["flightNumber"], "LH001");
    assert_eq!(body["flight"]["status"], "SCHEDULED");

    let req = post_json("/api/v1/sync/flights/sync", &lh001_body()).to_request();
    let second = actix_test::call_service(&app, req).await;
    let body: Value = actix_test::read_body_json(second).await;
    assert_eq!(body["fromCache"], true);
    assert_eq!(ctx.lufthansa.calls(), 1);
}

#[rstest]
#[actix_web::test]
async fn identifiers_are_normalized_to_upper_case() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let payload = json!({
        "flightNumber": " lh001 ",
        "airlineCode": "lh",
        "departureDate": "2026-02-25"
    });
    let req = post_json("/api/v1/sync/flights/sync", &payload).to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(ctx.lufthansa.requested(), vec!["LH001"]);
}

#[rstest]
#[actix_web::test]
async fn unknown_airline_is_not_found() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let payload = json!({
        "flightNumber": "ZZ9",
        "airlineCode": "ZZ",
        "departureDate": "2026-02-25"
    });
    let req = post_json("/api/v1/sync/flights/sync", &payload).to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["code"], "ADAPTER_NOT_FOUND");
}

#[rstest]
#[case(json!({ "airlineCode": "LH", "departureDate": "2026-02-25" }), "flightNumber")]
#[case(json!({ "flightNumber": "LH001", "airlineCode": "  ", "departureDate": "2026-02-25" }), "airlineCode")]
#[case(json!({ "flightNumber": "LH001", "airlineCode": "LH", "departureDate": "25.02.2026" }), "departureDate")]
#[actix_web::test]
async fn invalid_payloads_name_the_field(#[case] payload: Value, #[case] field: &str) {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let req = post_json("/api/v1/sync/flights/sync", &payload).to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["code"], "INVALID_REQUEST");
    assert_eq!(body["details"]["field"], field);
}

#[rstest]
#[actix_web::test]
async fn malformed_json_uses_the_error_envelope() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let req = actix_test::TestRequest::post()
        .uri("/api/v1/sync/flights/sync")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[rstest]
#[actix_web::test]
async fn open_breaker_answers_503_with_retry_after() {
    let ctx = TestContext::new(SyncServiceConfig {
        breaker: CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(60),
        },
        ..SyncServiceConfig::default()
    });
    ctx.lufthansa
        .set_fallback(Err(AirlineAdapterError::transport("connection reset")));
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let req = post_json("/api/v1/sync/flights/sync", &lh001_body()).to_request();
    let upstream = actix_test::call_service(&app, req).await;
    assert_eq!(upstream.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = actix_test::read_body_json(upstream).await;
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");

    let req = post_json("/api/v1/sync/flights/sync", &lh001_body()).to_request();
    let rejected = actix_test::call_service(&app, req).await;
    assert_eq!(rejected.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        rejected
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok()),
        Some("60")
    );
    let body: Value = actix_test::read_body_json(rejected).await;
    assert_eq!(body["code"], "CIRCUIT_BREAKER_OPEN");
    assert_eq!(body["retryAfter"], 60);
    assert_eq!(ctx.lufthansa.calls(), 1);
}

#[rstest]
#[actix_web::test]
async fn upstream_timeout_maps_to_504() {
    let ctx = TestContext::default();
    ctx.lufthansa
        .set_fallback(Err(AirlineAdapterError::timeout("no answer in 5s")));
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let req = post_json("/api/v1/sync/flights/sync", &lh001_body()).to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[rstest]
#[actix_web::test]
async fn batch_lists_failures_without_failing_the_request() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let payload = json!({
        "flights": [
            lh001_body(),
            { "flightNumber": "ZZ001", "airlineCode": "ZZ", "departureDate": "2026-02-25" }
        ]
    });
    let req = post_json("/api/v1/sync/flights/batch", &payload).to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["successful"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["failed"][0]["flightNumber"], "ZZ001");
    assert_eq!(body["failed"][0]["error"]["code"], "ADAPTER_NOT_FOUND");
}

#[rstest]
#[actix_web::test]
async fn oversized_batch_is_rejected() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;
    let flights: Vec<Value> = (0..=MAX_BATCH_SIZE).map(|_| lh001_body()).collect();

    let payload = json!({ "flights": flights });
    let req = post_json("/api/v1/sync/flights/batch", &payload).to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["details"]["code"], "too_many_items");
    assert_eq!(ctx.lufthansa.calls(), 0);
}

#[rstest]
#[actix_web::test]
async fn status_reports_history_and_sources() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;
    let req = post_json("/api/v1/sync/flights/sync", &lh001_body()).to_request();
    let synced = actix_test::call_service(&app, req).await;
    let synced: Value = actix_test::read_body_json(synced).await;
    let id = synced["flight"]["id"].as_str().expect("flight id").to_owned();

    let req = actix_test::TestRequest::get()
        .uri(&format!("/api/v1/sync/flights/{id}/status"))
        .to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["flight"]["id"], id.as_str());
    assert_eq!(body["recentHistory"][0]["success"], true);
    let sources: Vec<&str> = body["availableSources"]
        .as_array()
        .expect("sources array")
        .iter()
        .filter_map(|source| source["name"].as_str())
        .collect();
    assert!(sources.contains(&"Lufthansa"));
    assert!(body["nextScheduledSync"].is_null());
}

#[rstest]
#[case("00000000-0000-0000-0000-000000000404", StatusCode::NOT_FOUND)]
#[case("not-a-uuid", StatusCode::BAD_REQUEST)]
#[actix_web::test]
async fn status_rejects_unknown_or_malformed_ids(#[case] id: &str, #[case] expected: StatusCode) {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let req = actix_test::TestRequest::get()
        .uri(&format!("/api/v1/sync/flights/{id}/status"))
        .to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), expected);
}
