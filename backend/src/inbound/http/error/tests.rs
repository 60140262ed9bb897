//! Tests for HTTP error mapping.

use super::*;
use actix_web::ResponseError;
use actix_web::body::to_bytes;
use actix_web::http::StatusCode;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case(Error::invalid_request("bad"), StatusCode::BAD_REQUEST)]
#[case(Error::not_found("missing"), StatusCode::NOT_FOUND)]
#[case(Error::adapter_not_found("no LH adapter"), StatusCode::NOT_FOUND)]
#[case(Error::circuit_breaker_open("open"), StatusCode::SERVICE_UNAVAILABLE)]
#[case(Error::conflict_unresolvable("pick one"), StatusCode::CONFLICT)]
#[case(Error::webhook_verification_failed("bad mac"), StatusCode::UNAUTHORIZED)]
#[case(Error::timeout("slow"), StatusCode::GATEWAY_TIMEOUT)]
#[case(Error::rate_limited("slow down"), StatusCode::TOO_MANY_REQUESTS)]
#[case(Error::service_unavailable("down"), StatusCode::SERVICE_UNAVAILABLE)]
#[case(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
fn status_code_matches_error_code(#[case] err: Error, #[case] status: StatusCode) {
    assert_eq!(ResponseError::status_code(&err), status);
}

async fn body_of(error: &Error) -> (StatusCode, Option<String>, serde_json::Value) {
    let response = ResponseError::error_response(error);
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let bytes = to_bytes(response.into_body())
        .await
        .expect("reading response body succeeds");
    let body = serde_json::from_slice(&bytes).expect("error JSON deserialises");
    (status, retry_after, body)
}

#[rstest]
#[actix_web::test]
async fn retry_hint_is_sent_as_header_and_body() {
    let err = Error::rate_limited("LH throttled").with_retry_after(42);

    let (status, retry_after, body) = body_of(&err).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(retry_after.as_deref(), Some("42"));
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(body["retryAfter"], 42);
}

#[rstest]
#[actix_web::test]
async fn internal_errors_are_redacted() {
    let err = Error::internal("pool handle leaked").with_details(json!({ "secret": "x" }));

    let (status, retry_after, body) = body_of(&err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(retry_after.is_none());
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert_eq!(body["message"], "Internal server error");
    assert!(body.get("details").is_none());
}

#[rstest]
#[actix_web::test]
async fn client_errors_keep_details() {
    let err = Error::invalid_request("flightNumber is required")
        .with_details(json!({ "field": "flightNumber" }));

    let (status, _, body) = body_of(&err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "flightNumber is required");
    assert_eq!(body["details"]["field"], "flightNumber");
}

#[rstest]
fn actix_errors_become_internal() {
    let actix_err = actix_web::error::ErrorBadRequest("nope");
    let err = Error::from(actix_err);
    assert_eq!(err.code(), ErrorCode::InternalError);
}
