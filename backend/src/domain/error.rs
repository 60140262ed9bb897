//! Domain-level error types.
//!
//! These errors are transport agnostic. Inbound adapters map them to HTTP
//! responses; the synchronization engine also embeds the code and message in
//! structured sync results so batch callers never see a raised error.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[non_exhaustive]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// The requested resource does not exist.
    NotFound,
    /// No adapter is registered for the requested airline.
    AdapterNotFound,
    /// The adapter's circuit breaker is open; upstream was not contacted.
    CircuitBreakerOpen,
    /// A data conflict cannot be resolved with the supplied input.
    ConflictUnresolvable,
    /// A webhook signature is missing or does not match.
    WebhookVerificationFailed,
    /// An upstream call exceeded its deadline.
    Timeout,
    /// An upstream source throttled the request.
    RateLimited,
    /// A dependency is temporarily unavailable.
    ServiceUnavailable,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

impl ErrorCode {
    /// Wire representation of the code, as serialised in error envelopes.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::AdapterNotFound => "ADAPTER_NOT_FOUND",
            Self::CircuitBreakerOpen => "CIRCUIT_BREAKER_OPEN",
            Self::ConflictUnresolvable => "CONFLICT_UNRESOLVABLE",
            Self::WebhookVerificationFailed => "WEBHOOK_VERIFICATION_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::RateLimited => "RATE_LIMITED",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` is never blank; blank input is replaced by the code name.
///
/// # Examples
/// ```
/// use flight_sync::domain::{Error, ErrorCode};
///
/// let err = Error::circuit_breaker_open("LH breaker open").with_retry_after(30);
/// assert_eq!(err.code(), ErrorCode::CircuitBreakerOpen);
/// assert_eq!(err.retry_after(), Some(30));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    #[schema(example = "ADAPTER_NOT_FOUND")]
    code: ErrorCode,
    #[schema(example = "no adapter registered for airline XX")]
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    /// Seconds the caller should wait before retrying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl Error {
    /// Create a new error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            code.as_str().to_owned()
        } else {
            message
        };
        Self {
            code,
            message,
            details: None,
            retry_after: None,
        }
    }

    /// Stable machine-readable error code.
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to adapters.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary error details for adapters.
    pub const fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Retry hint in seconds, set for throttling and open-breaker failures.
    pub const fn retry_after(&self) -> Option<u64> {
        self.retry_after
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use flight_sync::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::invalid_request("bad").with_details(json!({ "field": "flightNumber" }));
    /// assert!(err.details().is_some());
    /// ```
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach a retry hint expressed in whole seconds.
    #[must_use]
    pub const fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::AdapterNotFound`].
    pub fn adapter_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AdapterNotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::CircuitBreakerOpen`].
    pub fn circuit_breaker_open(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CircuitBreakerOpen, message)
    }

    /// Convenience constructor for [`ErrorCode::ConflictUnresolvable`].
    pub fn conflict_unresolvable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConflictUnresolvable, message)
    }

    /// Convenience constructor for [`ErrorCode::WebhookVerificationFailed`].
    pub fn webhook_verification_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::WebhookVerificationFailed, message)
    }

    /// Convenience constructor for [`ErrorCode::Timeout`].
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    /// Convenience constructor for [`ErrorCode::RateLimited`].
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    /// Convenience constructor for [`ErrorCode::ServiceUnavailable`].
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}
