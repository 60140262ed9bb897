//! Runtime configuration for the synchronization service.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::circuit_breaker::CircuitBreakerConfig;
use super::conflict::ConflictResolutionMode;
use crate::domain::Error;

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncServiceConfig {
    /// Lifetime of cached upstream snapshots.
    pub cache_ttl: Duration,
    /// Thresholds for every adapter's breaker.
    pub breaker: CircuitBreakerConfig,
    /// Mode used when a request does not name one.
    pub conflict_resolution_mode: ConflictResolutionMode,
    /// Concurrent syncs within one batch.
    pub max_concurrent_syncs: usize,
    /// Sync attempts remembered per flight.
    pub history_limit: usize,
    /// Flights with remembered history; the least recently synced is
    /// forgotten first.
    pub history_flight_limit: usize,
    /// Entries included in cache statistics samples.
    pub cache_sample_size: usize,
    /// Shared secret for upstream webhook signatures.
    pub webhook_secret: Option<String>,
}

impl Default for SyncServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            breaker: CircuitBreakerConfig::default(),
            conflict_resolution_mode: ConflictResolutionMode::Priority,
            max_concurrent_syncs: 4,
            history_limit: 10,
            history_flight_limit: 10_000,
            cache_sample_size: 20,
            webhook_secret: None,
        }
    }
}

/// Partial configuration update; absent fields are left unchanged.
///
/// Scheduler fields are applied by the scheduler, the rest by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfigPatch {
    pub cache_ttl_seconds: Option<u64>,
    pub batch_size: Option<usize>,
    pub circuit_breaker_threshold: Option<u32>,
    pub circuit_breaker_timeout_ms: Option<u64>,
    pub prioritize_active: Option<bool>,
    pub conflict_resolution_mode: Option<ConflictResolutionMode>,
    pub max_concurrent_syncs: Option<usize>,
    pub interval_seconds: Option<u64>,
}

impl SyncConfigPatch {
    /// Reject zero-valued sizes, thresholds, and durations.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` naming the first offending field.
    pub fn validate(&self) -> Result<(), Error> {
        let zero_field = [
            ("cacheTtlSeconds", self.cache_ttl_seconds.is_some_and(|v| v == 0)),
            ("batchSize", self.batch_size.is_some_and(|v| v == 0)),
            (
                "circuitBreakerThreshold",
                self.circuit_breaker_threshold.is_some_and(|v| v == 0),
            ),
            (
                "circuitBreakerTimeoutMs",
                self.circuit_breaker_timeout_ms.is_some_and(|v| v == 0),
            ),
            (
                "maxConcurrentSyncs",
                self.max_concurrent_syncs.is_some_and(|v| v == 0),
            ),
            ("intervalSeconds", self.interval_seconds.is_some_and(|v| v == 0)),
        ]
        .into_iter()
        .find_map(|(field, is_zero)| is_zero.then_some(field));

        match zero_field {
            Some(field) => Err(Error::invalid_request(format!("{field} must be greater than zero"))
                .with_details(serde_json::json!({ "field": field }))),
            None => Ok(()),
        }
    }
}

/// Service configuration as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncServiceConfigView {
    pub cache_ttl_seconds: u64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout_ms: u64,
    pub conflict_resolution_mode: ConflictResolutionMode,
    pub max_concurrent_syncs: usize,
    pub webhook_signing_enabled: bool,
}

impl From<&SyncServiceConfig> for SyncServiceConfigView {
    fn from(config: &SyncServiceConfig) -> Self {
        Self {
            cache_ttl_seconds: config.cache_ttl.as_secs(),
            circuit_breaker_threshold: config.breaker.failure_threshold,
            circuit_breaker_timeout_ms: u64::try_from(config.breaker.reset_timeout.as_millis())
                .unwrap_or(u64::MAX),
            conflict_resolution_mode: config.conflict_resolution_mode,
            max_concurrent_syncs: config.max_concurrent_syncs,
            webhook_signing_enabled: config
                .webhook_secret
                .as_deref()
                .is_some_and(|secret| !secret.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Patch validation coverage.

    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[rstest]
    fn empty_patch_is_valid() {
        assert!(SyncConfigPatch::default().validate().is_ok());
    }

    #[rstest]
    #[case(SyncConfigPatch { batch_size: Some(0), ..SyncConfigPatch::default() }, "batchSize")]
    #[case(SyncConfigPatch { cache_ttl_seconds: Some(0), ..SyncConfigPatch::default() }, "cacheTtlSeconds")]
    #[case(SyncConfigPatch { interval_seconds: Some(0), ..SyncConfigPatch::default() }, "intervalSeconds")]
    fn zero_values_are_rejected(#[case] patch: SyncConfigPatch, #[case] field: &str) {
        let err = patch.validate().expect_err("zero must be rejected");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert_eq!(err.details().and_then(|d| d["field"].as_str()), Some(field));
    }

    #[rstest]
    fn view_hides_webhook_secret() {
        let config = SyncServiceConfig {
            webhook_secret: Some("s3cret".to_owned()),
            ..SyncServiceConfig::default()
        };
        let view = SyncServiceConfigView::from(&config);
        assert!(view.webhook_signing_enabled);
        assert_eq!(view.cache_ttl_seconds, 300);
        assert_eq!(view.circuit_breaker_timeout_ms, 60_000);
    }
}
