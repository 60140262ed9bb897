//! Tests for operational handlers.

use super::*;
use crate::domain::ports::AirlineAdapterError;
use crate::domain::sync::{CircuitBreakerConfig, SyncServiceConfig};
use crate::inbound::http::test_utils::{TestContext, test_app};
use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use rstest::rstest;
use serde_json::{Value, json};
use std::time::Duration;

fn get(uri: &str) -> Request {
    actix_test::TestRequest::get().uri(uri).to_request()
}

async fn sync_lh001(
    app: &impl Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
) -> StatusCode {
    let req = actix_test::TestRequest::post()
        .uri("/api/v1/sync/flights/sync")
        .set_json(json!({
            "flightNumber": "LH001",
            "airlineCode": "LH",
            "departureDate": "2026-02-25"
        }))
        .to_request();
    actix_test::call_service(app, req).await.status()
}

#[rstest]
#[actix_web::test]
async fn breakers_are_listed_per_airline() {
    let ctx = TestContext::new(SyncServiceConfig {
        breaker: CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(30),
        },
        ..SyncServiceConfig::default()
    });
    ctx.lufthansa
        .set_fallback(Err(AirlineAdapterError::transport("connection reset")));
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;
    assert_eq!(sync_lh001(&app).await, StatusCode::SERVICE_UNAVAILABLE);

    let res = actix_test::call_service(&app, get("/api/v1/sync/circuit-breakers")).await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["breakers"]["LH"]["state"], "OPEN");
    assert_eq!(body["breakers"]["LH"]["resetTimeoutMs"], 30_000);
    assert_eq!(body["breakers"]["XA"]["state"], "CLOSED");
}

#[rstest]
#[case("lh", StatusCode::OK)]
#[case("ZZ", StatusCode::NOT_FOUND)]
#[actix_web::test]
async fn single_breaker_lookup(#[case] airline: &str, #[case] expected: StatusCode) {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let res = actix_test::call_service(
        &app,
        get(&format!("/api/v1/sync/circuit-breakers/{airline}")),
    )
    .await;

    assert_eq!(res.status(), expected);
}

#[rstest]
#[actix_web::test]
async fn cache_stats_count_hits_and_misses() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;
    assert_eq!(sync_lh001(&app).await, StatusCode::OK);
    assert_eq!(sync_lh001(&app).await, StatusCode::OK);

    let res = actix_test::call_service(&app, get("/api/v1/sync/cache/stats")).await;

    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["entries"], 1);
    assert_eq!(body["hits"], 1);
    assert_eq!(body["misses"], 1);
    assert_eq!(body["ttlSeconds"], 300);
    assert_eq!(body["sample"][0]["source"], "Lufthansa");
}

#[rstest]
#[actix_web::test]
async fn cache_clear_honours_filters() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;
    assert_eq!(sync_lh001(&app).await, StatusCode::OK);

    let untouched = actix_test::call_service(
        &app,
        actix_test::TestRequest::delete()
            .uri("/api/v1/sync/cache?source=Aggregator")
            .to_request(),
    )
    .await;
    let untouched: Value = actix_test::read_body_json(untouched).await;
    assert_eq!(untouched, json!({ "cleared": 0, "remaining": 1 }));

    let cleared = actix_test::call_service(
        &app,
        actix_test::TestRequest::delete()
            .uri("/api/v1/sync/cache?flightNumber=lh001")
            .to_request(),
    )
    .await;
    let cleared: Value = actix_test::read_body_json(cleared).await;
    assert_eq!(cleared, json!({ "cleared": 1, "remaining": 0 }));

    assert_eq!(sync_lh001(&app).await, StatusCode::OK);
    assert_eq!(ctx.lufthansa.calls(), 2);
}

#[rstest]
#[actix_web::test]
async fn forced_run_resyncs_stale_flights() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;
    assert_eq!(sync_lh001(&app).await, StatusCode::OK);
    ctx.clock.advance_seconds(3_600);

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/sync/scheduler/run?batchSize=10")
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["skipped"], false);
    assert_eq!(body["job"]["jobType"], "SCHEDULED");
    assert_eq!(body["job"]["status"], "COMPLETED");
    assert_eq!(body["job"]["flightsProcessed"], 1);
    assert_eq!(ctx.lufthansa.calls(), 2);

    let status = actix_test::call_service(&app, get("/api/v1/sync/scheduler")).await;
    let status: Value = actix_test::read_body_json(status).await;
    assert_eq!(status["stats"]["totalRuns"], 1);
    assert_eq!(status["stats"]["totalFlightsSynced"], 1);
    assert_eq!(status["lastJob"]["id"], body["job"]["id"]);
    assert_eq!(status["started"], false);
}

#[rstest]
#[actix_web::test]
async fn forced_run_rejects_zero_batch() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/sync/scheduler/run?batchSize=0")
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["details"]["field"], "batchSize");
}

#[rstest]
#[actix_web::test]
async fn config_patch_is_reflected_in_reads() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::patch()
            .uri("/api/v1/sync/config")
            .set_json(json!({
                "cacheTtlSeconds": 60,
                "batchSize": 25,
                "conflictResolutionMode": "AUTOMATIC"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let applied: Value = actix_test::read_body_json(res).await;
    assert_eq!(applied["service"]["cacheTtlSeconds"], 60);
    assert_eq!(applied["scheduler"]["batchSize"], 25);

    let res = actix_test::call_service(&app, get("/api/v1/sync/config")).await;
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["service"]["conflictResolutionMode"], "AUTOMATIC");
    assert_eq!(body["service"]["webhookSigningEnabled"], true);
    assert_eq!(body["scheduler"]["batchSize"], 25);
}

#[rstest]
#[actix_web::test]
async fn zero_values_are_rejected_without_side_effects() {
    let ctx = TestContext::default();
    let app = actix_test::init_service(test_app(ctx.state.clone())).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::patch()
            .uri("/api/v1/sync/config")
            .set_json(json!({ "batchSize": 50, "circuitBreakerThreshold": 0 }))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = actix_test::call_service(&app, get("/api/v1/sync/config")).await;
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body["scheduler"]["batchSize"], 100);
    assert_eq!(body["service"]["circuitBreakerThreshold"], 5);
}
