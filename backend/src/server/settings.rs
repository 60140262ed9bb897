//! Process settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `FLIGHT_SYNC_*` environment variables, or a
//! config file; accessors supply the defaults for anything left unset.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use flight_sync::domain::SchedulerConfig;
use flight_sync::domain::sync::{
    CircuitBreakerConfig, ConflictResolutionMode, SyncServiceConfig,
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Settings values that cannot be turned into runtime configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The bind address is not a socket address.
    #[error("invalid bind address {value}: {source}")]
    BindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    /// The conflict mode names no known policy.
    #[error("{0}")]
    ConflictMode(String),
    /// A size, threshold, or duration was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Configuration for the flight sync process.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "FLIGHT_SYNC")]
pub struct FlightSyncSettings {
    /// Socket address the HTTP server binds to.
    pub bind_addr: Option<String>,
    /// JSON catalogue of airline APIs.
    pub adapters_path: Option<PathBuf>,
    /// Shared secret for upstream webhook signatures.
    pub webhook_secret: Option<String>,
    /// Lifetime of cached upstream snapshots.
    pub cache_ttl_seconds: Option<u64>,
    /// Consecutive failures that open an adapter's breaker.
    pub breaker_threshold: Option<u32>,
    /// Time an open breaker waits before probing again.
    pub breaker_timeout_ms: Option<u64>,
    /// `PRIORITY`, `AUTOMATIC`, or `MANUAL`.
    pub conflict_resolution_mode: Option<String>,
    /// Concurrent syncs within one batch.
    pub max_concurrent_syncs: Option<usize>,
    /// Run the periodic resynchronization loop.
    pub scheduler_enabled: Option<bool>,
    /// Seconds between scheduler ticks.
    pub scheduler_interval_seconds: Option<u64>,
    /// Flights per scheduled batch.
    pub scheduler_batch_size: Option<usize>,
    /// Sync soon-departing and delayed flights first.
    pub scheduler_prioritize_active: Option<bool>,
}

impl FlightSyncSettings {
    /// Socket address to bind, defaulting to all interfaces on port 8080.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::BindAddr`] when the value does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let value = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        value.parse().map_err(|source| SettingsError::BindAddr {
            value: value.to_owned(),
            source,
        })
    }

    /// Webhook secret, ignoring blank values.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
    }

    /// Service configuration with defaults applied.
    ///
    /// # Errors
    ///
    /// Rejects zero-valued sizes and durations and unknown conflict modes.
    pub fn sync_config(&self) -> Result<SyncServiceConfig, SettingsError> {
        let defaults = SyncServiceConfig::default();
        let conflict_resolution_mode = match self.conflict_resolution_mode.as_deref() {
            Some(raw) => raw
                .parse::<ConflictResolutionMode>()
                .map_err(SettingsError::ConflictMode)?,
            None => defaults.conflict_resolution_mode,
        };

        Ok(SyncServiceConfig {
            cache_ttl: seconds_or(
                self.cache_ttl_seconds,
                defaults.cache_ttl,
                "cacheTtlSeconds",
            )?,
            breaker: CircuitBreakerConfig {
                failure_threshold: non_zero(
                    self.breaker_threshold,
                    defaults.breaker.failure_threshold,
                    "breakerThreshold",
                )?,
                reset_timeout: match self.breaker_timeout_ms {
                    Some(0) => return Err(SettingsError::Zero("breakerTimeoutMs")),
                    Some(ms) => Duration::from_millis(ms),
                    None => defaults.breaker.reset_timeout,
                },
            },
            conflict_resolution_mode,
            max_concurrent_syncs: non_zero(
                self.max_concurrent_syncs,
                defaults.max_concurrent_syncs,
                "maxConcurrentSyncs",
            )?,
            webhook_secret: self.webhook_secret().map(str::to_owned),
            ..defaults
        })
    }

    /// Scheduler configuration with defaults applied.
    ///
    /// # Errors
    ///
    /// Rejects a zero interval or batch size.
    pub fn scheduler_config(&self) -> Result<SchedulerConfig, SettingsError> {
        let defaults = SchedulerConfig::default();
        Ok(SchedulerConfig {
            enabled: self.scheduler_enabled.unwrap_or(defaults.enabled),
            interval: seconds_or(
                self.scheduler_interval_seconds,
                defaults.interval,
                "schedulerIntervalSeconds",
            )?,
            batch_size: non_zero(
                self.scheduler_batch_size,
                defaults.batch_size,
                "schedulerBatchSize",
            )?,
            prioritize_active: self
                .scheduler_prioritize_active
                .unwrap_or(defaults.prioritize_active),
            ..defaults
        })
    }
}

fn non_zero<T>(value: Option<T>, default: T, field: &'static str) -> Result<T, SettingsError>
where
    T: PartialEq + Default,
{
    match value {
        Some(value) if value == T::default() => Err(SettingsError::Zero(field)),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

fn seconds_or(
    value: Option<u64>,
    default: Duration,
    field: &'static str,
) -> Result<Duration, SettingsError> {
    non_zero(value.map(Duration::from_secs), default, field)
}

#[cfg(test)]
mod tests {
    //! Settings parsing and defaulting.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 6] = [
        "FLIGHT_SYNC_BIND_ADDR",
        "FLIGHT_SYNC_WEBHOOK_SECRET",
        "FLIGHT_SYNC_CACHE_TTL_SECONDS",
        "FLIGHT_SYNC_CONFLICT_RESOLUTION_MODE",
        "FLIGHT_SYNC_SCHEDULER_ENABLED",
        "FLIGHT_SYNC_SCHEDULER_BATCH_SIZE",
    ];

    fn load_from_empty_args() -> FlightSyncSettings {
        FlightSyncSettings::load_from_iter([OsString::from("flight-sync")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_nothing_is_set() {
        let _guard = lock_env(VARS.map(|var| (var, None::<String>)));

        let settings = load_from_empty_args();
        let sync = settings.sync_config().expect("sync config");
        let scheduler = settings.scheduler_config().expect("scheduler config");

        assert_eq!(
            settings.bind_addr().expect("bind addr"),
            SocketAddr::from(([0, 0, 0, 0], 8080))
        );
        assert_eq!(sync, SyncServiceConfig::default());
        assert_eq!(scheduler, SchedulerConfig::default());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("FLIGHT_SYNC_BIND_ADDR", Some("127.0.0.1:9090".to_owned())),
            ("FLIGHT_SYNC_WEBHOOK_SECRET", Some("hush".to_owned())),
            ("FLIGHT_SYNC_CACHE_TTL_SECONDS", Some("60".to_owned())),
            ("FLIGHT_SYNC_CONFLICT_RESOLUTION_MODE", Some("manual".to_owned())),
            ("FLIGHT_SYNC_SCHEDULER_ENABLED", Some("false".to_owned())),
            ("FLIGHT_SYNC_SCHEDULER_BATCH_SIZE", Some("25".to_owned())),
        ]);

        let settings = load_from_empty_args();
        let sync = settings.sync_config().expect("sync config");
        let scheduler = settings.scheduler_config().expect("scheduler config");

        assert_eq!(
            settings.bind_addr().expect("bind addr"),
            SocketAddr::from(([127, 0, 0, 1], 9090))
        );
        assert_eq!(sync.webhook_secret.as_deref(), Some("hush"));
        assert_eq!(sync.cache_ttl, Duration::from_secs(60));
        assert_eq!(sync.conflict_resolution_mode, ConflictResolutionMode::Manual);
        assert!(!scheduler.enabled);
        assert_eq!(scheduler.batch_size, 25);
    }

    #[rstest]
    #[case(FlightSyncSettings { cache_ttl_seconds: Some(0), ..FlightSyncSettings::default() })]
    #[case(FlightSyncSettings { breaker_threshold: Some(0), ..FlightSyncSettings::default() })]
    #[case(FlightSyncSettings { conflict_resolution_mode: Some("coin-flip".to_owned()), ..FlightSyncSettings::default() })]
    fn invalid_service_values_are_rejected(#[case] settings: FlightSyncSettings) {
        assert!(settings.sync_config().is_err());
    }

    #[rstest]
    fn blank_webhook_secret_disables_signing() {
        let settings = FlightSyncSettings {
            webhook_secret: Some("   ".to_owned()),
            ..FlightSyncSettings::default()
        };

        assert_eq!(settings.webhook_secret(), None);
        assert_eq!(settings.sync_config().expect("sync config").webhook_secret, None);
    }

    #[rstest]
    fn malformed_bind_addr_is_reported() {
        let settings = FlightSyncSettings {
            bind_addr: Some("localhost".to_owned()),
            ..FlightSyncSettings::default()
        };

        assert!(matches!(
            settings.bind_addr(),
            Err(SettingsError::BindAddr { .. })
        ));
    }
}
