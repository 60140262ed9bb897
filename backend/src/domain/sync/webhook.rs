//! Upstream webhook verification and decoding.
//!
//! Signatures are hex-encoded HMAC-SHA256 digests of the raw request body,
//! keyed with a shared secret. An optional `sha256=` prefix is accepted.
//! Verification runs before the body is parsed.

use chrono::{DateTime, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::domain::Error;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Event pushed by an upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundWebhookEvent {
    /// Upstream event id; a fresh id is derived when absent.
    pub event_id: Option<String>,
    /// Upstream event name, informational only.
    pub event_type: Option<String>,
    pub flight_number: String,
    pub airline_code: String,
    pub departure_date: NaiveDate,
    pub scheduled_departure: Option<DateTime<Utc>>,
}

/// Compute the hex signature for `body`.
///
/// # Errors
///
/// Returns `INTERNAL_ERROR` if the MAC cannot be keyed.
///
/// # Examples
/// ```
/// use flight_sync::domain::sync::sign_payload;
///
/// let signature = sign_payload("secret", br#"{"flightNumber":"LH001"}"#)?;
/// assert_eq!(signature.len(), 64);
/// # Ok::<(), flight_sync::domain::Error>(())
/// ```
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, Error> {
    let mut mac = new_mac(secret)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check `signature` against `body` in constant time.
///
/// # Errors
///
/// Returns `WEBHOOK_VERIFICATION_FAILED` when no secret is configured, the
/// signature is missing or not hex, or the digest does not match.
pub fn verify_signature(
    secret: Option<&str>,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), Error> {
    let secret = secret
        .filter(|secret| !secret.is_empty())
        .ok_or_else(|| Error::webhook_verification_failed("webhook secret is not configured"))?;
    let signature = signature
        .map(str::trim)
        .filter(|signature| !signature.is_empty())
        .ok_or_else(|| Error::webhook_verification_failed("webhook signature is missing"))?;
    let encoded = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
    let expected = hex::decode(encoded)
        .map_err(|_| Error::webhook_verification_failed("webhook signature is not hex"))?;

    let mut mac = new_mac(secret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| Error::webhook_verification_failed("webhook signature mismatch"))
}

/// Decode a verified body.
///
/// # Errors
///
/// Returns `INVALID_REQUEST` when the body is not a valid event.
pub fn parse_event(body: &[u8]) -> Result<InboundWebhookEvent, Error> {
    serde_json::from_slice(body)
        .map_err(|error| Error::invalid_request(format!("malformed webhook payload: {error}")))
}

fn new_mac(secret: &str) -> Result<HmacSha256, Error> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|error| Error::internal(format!("webhook MAC init failed: {error}")))
}
