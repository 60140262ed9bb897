//! Flight synchronization engine.
//!
//! [`SynchronizationService`] fetches one flight through its airline's
//! adapter (guarded by that adapter's [`CircuitBreaker`] and shielded by the
//! shared [`TtlCache`]), upserts the snapshot, settles cross-source conflicts,
//! and fans change notifications out to subscribers.
//!
//! Within one sync the cache write happens before the upsert, and the upsert
//! completes before any subscriber is notified.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use mockable::Clock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::ports::{
    FlightRecordRepository, SyncFailureKind, SyncMetrics, SyncMetricsEvent, SyncSubscriber,
    SyncWebhookPayload,
};
use crate::domain::{AirlineFlightData, Error, FlightIdentity, FlightRecord, SyncStatus};

mod change;
mod circuit_breaker;
mod config;
mod conflict;
mod job;
mod mapping;
mod outcome;
mod registry;
mod ttl_cache;
mod webhook;

pub use change::{build_notification, classify_event, diff_monitored};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStatus, CircuitState,
    HALF_OPEN_SUCCESS_THRESHOLD,
};
pub use config::{SyncConfigPatch, SyncServiceConfig, SyncServiceConfigView};
pub use conflict::{
    ConflictResolution, ConflictResolutionMode, FlightDataConflict, detect_conflicts,
    resolve_automatically, resolve_by_priority,
};
pub use job::{SyncError, SyncJob, SyncJobStatus, SyncJobType};
pub use outcome::{
    AvailableSource, BatchSyncResult, CacheClearOutcome, ConflictResolutionRequest,
    ResolvedConflict, SyncFlightRequest, SyncHistoryEntry, SyncResult, SyncStatusReport,
    WebhookOutcome,
};
pub use registry::{AdapterRegistry, RegisteredAdapter, UNREGISTERED_PRIORITY};
pub use ttl_cache::{CacheEntrySample, CacheKey, CacheScope, CacheStats, TtlCache};
pub use webhook::{InboundWebhookEvent, parse_event, sign_payload, verify_signature};

use mapping::{SyncFailure, map_breaker_error, map_persistence_error, persistence_failure};

/// Port bundle required by the synchronization service.
pub struct SyncServicePorts {
    /// Adapters and their breakers.
    pub registry: AdapterRegistry,
    /// Flight persistence adapter.
    pub repository: Arc<dyn FlightRecordRepository>,
    /// Sync metrics adapter.
    pub metrics: Arc<dyn SyncMetrics>,
}

impl SyncServicePorts {
    /// Build a strongly-typed service port bundle.
    pub fn new(
        registry: AdapterRegistry,
        repository: Arc<dyn FlightRecordRepository>,
        metrics: Arc<dyn SyncMetrics>,
    ) -> Self {
        Self {
            registry,
            repository,
            metrics,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HistoryKey {
    airline_code: String,
    flight_number: String,
    date: NaiveDate,
}

impl HistoryKey {
    fn new(airline_code: &str, flight_number: &str, date: NaiveDate) -> Self {
        Self {
            airline_code: airline_code.trim().to_ascii_uppercase(),
            flight_number: flight_number.to_owned(),
            date,
        }
    }
}

struct SyncSuccess {
    record: FlightRecord,
    from_cache: bool,
    source: String,
    conflicts: Vec<FlightDataConflict>,
    notification: Option<SyncWebhookPayload>,
}

struct PersistedSnapshot {
    previous: Option<FlightRecord>,
    record: FlightRecord,
    conflicts: Vec<FlightDataConflict>,
}

/// Domain-owned flight synchronization service.
pub struct SynchronizationService {
    registry: AdapterRegistry,
    repository: Arc<dyn FlightRecordRepository>,
    metrics: Arc<dyn SyncMetrics>,
    clock: Arc<dyn Clock>,
    cache: TtlCache<AirlineFlightData>,
    config: RwLock<SyncServiceConfig>,
    subscribers: RwLock<Vec<Arc<dyn SyncSubscriber>>>,
    pending_conflicts: Mutex<HashMap<Uuid, FlightDataConflict>>,
    history: Mutex<HashMap<HistoryKey, VecDeque<SyncHistoryEntry>>>,
    last_job: Mutex<Option<SyncJob>>,
}

impl SynchronizationService {
    /// Build a service; every registered breaker adopts `config.breaker`.
    ///
    /// ```rust,ignore
    /// let service = SynchronizationService::new(ports, clock, SyncServiceConfig::default());
    /// ```
    pub fn new(ports: SyncServicePorts, clock: Arc<dyn Clock>, config: SyncServiceConfig) -> Self {
        for registered in ports.registry.get_all_adapters() {
            registered.breaker().reconfigure(
                Some(config.breaker.failure_threshold),
                Some(config.breaker.reset_timeout),
            );
        }

        Self {
            registry: ports.registry,
            repository: ports.repository,
            metrics: ports.metrics,
            cache: TtlCache::new(config.cache_ttl, Arc::clone(&clock)),
            clock,
            config: RwLock::new(config),
            subscribers: RwLock::new(Vec::new()),
            pending_conflicts: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
            last_job: Mutex::new(None),
        }
    }

    /// Registered adapters.
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Add a change-notification subscriber.
    pub fn subscribe(&self, subscriber: Arc<dyn SyncSubscriber>) {
        write_lock(&self.subscribers).push(subscriber);
    }

    /// Synchronize one flight.
    ///
    /// Never raises: adapter lookup, breaker, upstream, and persistence
    /// failures are reported in the returned [`SyncResult`].
    ///
    /// ```rust,ignore
    /// let result = service.sync_flight(SyncFlightRequest::new("LH001", "LH", date)).await;
    /// assert!(result.success || result.error.is_some());
    /// ```
    pub async fn sync_flight(&self, request: SyncFlightRequest) -> SyncResult {
        let started = Instant::now();
        let outcome = self.try_sync_flight(&request).await;
        let duration = started.elapsed();

        match outcome {
            Ok(success) => self.finish_success(request, success, duration).await,
            Err(failure) => self.finish_failure(request, failure, duration).await,
        }
    }

    /// Synchronize many flights with bounded concurrency.
    ///
    /// Results keep input order within each partition, and every request
    /// lands in exactly one of `successful` or `failed`.
    pub async fn batch_sync_flights(
        &self,
        requests: Vec<SyncFlightRequest>,
        mode: Option<ConflictResolutionMode>,
    ) -> BatchSyncResult {
        let started = Instant::now();
        let total = requests.len();
        let concurrency = read_lock(&self.config).max_concurrent_syncs.max(1);

        let results: Vec<SyncResult> = stream::iter(requests)
            .map(|mut request| {
                if request.conflict_resolution_mode.is_none() {
                    request.conflict_resolution_mode = mode;
                }
                self.sync_flight(request)
            })
            .buffered(concurrency)
            .collect()
            .await;
        let (successful, failed): (Vec<_>, Vec<_>) =
            results.into_iter().partition(|result| result.success);

        info!(
            total,
            successful = successful.len(),
            failed = failed.len(),
            "batch sync finished"
        );
        BatchSyncResult {
            total,
            successful,
            failed,
            duration: started.elapsed(),
        }
    }

    /// Settle `conflict` under `mode` and persist the outcome.
    ///
    /// MANUAL retains the conflict on the row for an operator instead of
    /// writing a value.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` when the conflicted row is gone, `CONFLICT_UNRESOLVABLE`
    /// when the value does not fit the field, or a persistence error.
    pub async fn resolve_conflict(
        &self,
        conflict: FlightDataConflict,
        mode: ConflictResolutionMode,
    ) -> Result<ResolvedConflict, Error> {
        let record = self.load_conflicted_record(&conflict.flight).await?;
        match mode {
            ConflictResolutionMode::Manual => self.retain_conflict(record, conflict).await,
            ConflictResolutionMode::Priority => {
                let (value, source) = resolve_by_priority(&conflict, |name| {
                    self.registry.priority_of_source(name)
                });
                let source = Some(source);
                self.write_resolution(record, conflict, mode, value, source, SyncStatus::ExactMatch)
                    .await
            }
            ConflictResolutionMode::Automatic => {
                let value = resolve_automatically(&conflict);
                let source = source_of_value(&conflict, &value);
                self.write_resolution(record, conflict, mode, value, source, SyncStatus::ExactMatch)
                    .await
            }
        }
    }

    /// Resolve a pending conflict by id.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` for unknown ids; `CONFLICT_UNRESOLVABLE` when MANUAL
    /// resolution names neither a party source nor an override value.
    pub async fn resolve_conflict_by_id(
        &self,
        id: Uuid,
        request: ConflictResolutionRequest,
    ) -> Result<ResolvedConflict, Error> {
        let conflict = lock(&self.pending_conflicts)
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("conflict {id} not found")))?;

        let has_operator_choice =
            request.selected_source.is_some() || request.override_value.is_some();
        let mode = request.mode.unwrap_or_else(|| {
            if has_operator_choice {
                ConflictResolutionMode::Manual
            } else {
                read_lock(&self.config).conflict_resolution_mode
            }
        });
        if mode != ConflictResolutionMode::Manual {
            return self.resolve_conflict(conflict, mode).await;
        }

        let (value, source, status) = manual_choice(&conflict, &request)?;
        let record = self.load_conflicted_record(&conflict.flight).await?;
        self.write_resolution(record, conflict, mode, value, source, status)
            .await
    }

    /// Verify, decode, and act on an upstream webhook.
    ///
    /// The signature is checked against the raw body before anything is
    /// parsed; the derived sync always bypasses the cache.
    ///
    /// # Errors
    ///
    /// `WEBHOOK_VERIFICATION_FAILED` for unsigned or mis-signed bodies and
    /// `INVALID_REQUEST` for malformed ones. Sync failures are reported in
    /// the outcome instead.
    pub async fn process_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, Error> {
        let secret = read_lock(&self.config).webhook_secret.clone();
        verify_signature(secret.as_deref(), body, signature)?;
        let event = parse_event(body)?;

        let event_id = event
            .event_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let request = SyncFlightRequest {
            scheduled_departure: event.scheduled_departure,
            ..SyncFlightRequest::new(
                event.flight_number.trim().to_ascii_uppercase(),
                event.airline_code.trim().to_ascii_uppercase(),
                event.departure_date,
            )
        }
        .with_force_refresh(true);

        let result = self.sync_flight(request).await;
        info!(
            event_id = %event_id,
            event_type = event.event_type.as_deref().unwrap_or("unspecified"),
            processed = result.success,
            "processed upstream webhook"
        );
        Ok(WebhookOutcome {
            processed: result.success,
            event_id,
            result,
        })
    }

    /// Sync view of the stored flight `flight_id`.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` for unknown ids, or a persistence error.
    pub async fn sync_status(&self, flight_id: Uuid) -> Result<SyncStatusReport, Error> {
        let flight = self
            .repository
            .find_by_id(flight_id)
            .await
            .map_err(|error| map_persistence_error(&error))?
            .ok_or_else(|| Error::not_found(format!("flight {flight_id} not found")))?;

        let key = HistoryKey::new(
            &flight.airline_code,
            &flight.flight_number,
            flight.scheduled_departure.date_naive(),
        );
        let recent_history = lock(&self.history)
            .get(&key)
            .map(|entries| entries.iter().rev().cloned().collect())
            .unwrap_or_default();
        let available_sources = self
            .registry
            .get_all_adapters()
            .into_iter()
            .map(|registered| AvailableSource {
                name: registered.adapter().name().to_owned(),
                airline_code: registered.adapter().airline_code().to_owned(),
                priority: registered.adapter().priority(),
                circuit_state: registered.breaker().state(),
            })
            .collect();

        Ok(SyncStatusReport {
            flight,
            recent_history,
            available_sources,
        })
    }

    /// Store `job` as the most recent job.
    pub fn record_job(&self, job: SyncJob) {
        *lock(&self.last_job) = Some(job);
    }

    /// Most recent job, if any ran.
    pub fn last_sync_job(&self) -> Option<SyncJob> {
        lock(&self.last_job).clone()
    }

    /// Breaker status per registered adapter, keyed by airline code.
    pub fn circuit_breaker_statuses(&self) -> BTreeMap<String, CircuitBreakerStatus> {
        self.registry
            .get_all_adapters()
            .into_iter()
            .map(|registered| {
                (
                    registered.adapter().airline_code().to_ascii_uppercase(),
                    registered.breaker().status(),
                )
            })
            .collect()
    }

    /// Breaker status for one airline's adapter.
    ///
    /// # Errors
    ///
    /// `ADAPTER_NOT_FOUND` when no adapter serves `airline_code`.
    pub fn circuit_breaker_status(&self, airline_code: &str) -> Result<CircuitBreakerStatus, Error> {
        self.registry
            .get_adapter(airline_code)
            .map(|registered| registered.breaker().status())
            .ok_or_else(|| adapter_not_found(airline_code))
    }

    /// Cache counters and sampled entries.
    pub fn cache_stats(&self) -> CacheStats {
        let sample_size = read_lock(&self.config).cache_sample_size;
        self.cache.stats(sample_size)
    }

    /// Clear cache entries matching `scope`.
    pub fn clear_cache(&self, scope: &CacheScope) -> CacheClearOutcome {
        let cleared = self.cache.clear_matching(scope);
        let remaining = self.cache.len();
        info!(cleared, remaining, "cleared sync cache");
        CacheClearOutcome { cleared, remaining }
    }

    /// Pending MANUAL conflicts, oldest first.
    pub fn pending_conflicts(&self) -> Vec<FlightDataConflict> {
        let mut conflicts: Vec<FlightDataConflict> =
            lock(&self.pending_conflicts).values().cloned().collect();
        conflicts.sort_by(|left, right| {
            left.detected_at
                .cmp(&right.detected_at)
                .then_with(|| left.flight.cmp(&right.flight))
                .then_with(|| left.field.cmp(&right.field))
        });
        conflicts
    }

    /// Current configuration.
    pub fn config(&self) -> SyncServiceConfigView {
        SyncServiceConfigView::from(&*read_lock(&self.config))
    }

    /// Apply the service-level fields of `patch`.
    ///
    /// # Errors
    ///
    /// `INVALID_REQUEST` when a field is zero.
    pub fn apply_config(&self, patch: &SyncConfigPatch) -> Result<SyncServiceConfigView, Error> {
        patch.validate()?;
        let mut config = write_lock(&self.config);
        if let Some(seconds) = patch.cache_ttl_seconds {
            config.cache_ttl = Duration::from_secs(seconds);
            self.cache.set_ttl(config.cache_ttl);
        }
        if let Some(threshold) = patch.circuit_breaker_threshold {
            config.breaker.failure_threshold = threshold;
        }
        if let Some(millis) = patch.circuit_breaker_timeout_ms {
            config.breaker.reset_timeout = Duration::from_millis(millis);
        }
        if patch.circuit_breaker_threshold.is_some() || patch.circuit_breaker_timeout_ms.is_some() {
            for registered in self.registry.get_all_adapters() {
                registered.breaker().reconfigure(
                    patch.circuit_breaker_threshold,
                    patch.circuit_breaker_timeout_ms.map(Duration::from_millis),
                );
            }
        }
        if let Some(mode) = patch.conflict_resolution_mode {
            config.conflict_resolution_mode = mode;
        }
        if let Some(concurrency) = patch.max_concurrent_syncs {
            config.max_concurrent_syncs = concurrency;
        }
        info!(?patch, "applied sync configuration");
        Ok(SyncServiceConfigView::from(&*config))
    }

    async fn try_sync_flight(&self, request: &SyncFlightRequest) -> Result<SyncSuccess, SyncFailure> {
        let registered = self.registry.get_adapter(&request.airline_code).ok_or_else(|| {
            SyncFailure::new(
                SyncFailureKind::AdapterNotFound,
                adapter_not_found(&request.airline_code),
            )
        })?;
        let adapter = registered.adapter();
        let source = adapter.name().to_owned();
        let key = CacheKey::new(
            request.flight_number.clone(),
            request.departure_date,
            source.clone(),
        );

        let cached = if request.force_refresh {
            None
        } else {
            self.cache.get(&key)
        };
        let from_cache = cached.is_some();
        let data = match cached {
            Some(data) => data,
            None => {
                let fetched = registered
                    .breaker()
                    .execute(|| {
                        adapter.fetch_flight_data(&request.flight_number, request.departure_date)
                    })
                    .await
                    .map_err(|error| map_breaker_error(error, self.clock.utc()).with_source(&source))?;
                let data = fetched.ok_or_else(|| {
                    SyncFailure::new(
                        SyncFailureKind::FlightNotFound,
                        Error::not_found(format!(
                            "{source} has no flight {} on {}",
                            request.flight_number, request.departure_date
                        )),
                    )
                    .with_source(&source)
                })?;
                self.cache.set(key, data.clone());
                data
            }
        };

        let mode = request
            .conflict_resolution_mode
            .unwrap_or_else(|| read_lock(&self.config).conflict_resolution_mode);
        let persisted = self
            .persist_snapshot(&data, mode)
            .await
            .map_err(|failure| failure.with_source(&source))?;

        let notification = persisted.previous.as_ref().and_then(|previous| {
            build_notification(previous, &persisted.record, self.clock.utc())
        });
        if let Some(payload) = &notification {
            self.dispatch(payload);
        }

        Ok(SyncSuccess {
            record: persisted.record,
            from_cache,
            source,
            conflicts: persisted.conflicts,
            notification,
        })
    }

    async fn persist_snapshot(
        &self,
        data: &AirlineFlightData,
        mode: ConflictResolutionMode,
    ) -> Result<PersistedSnapshot, SyncFailure> {
        let now = self.clock.utc();
        let previous = self
            .repository
            .find_by_identity(&data.identity())
            .await
            .map_err(|error| persistence_failure(&error))?;

        let (mut record, conflicts) = match &previous {
            None => {
                let mut record = FlightRecord::from_airline_data(Uuid::new_v4(), data);
                record.sync_status = SyncStatus::ExactMatch;
                (record, Vec::new())
            }
            Some(previous) => self.merge_snapshot(previous, data, mode, now)?,
        };
        record.sync_attempts = record.sync_attempts.saturating_add(1);
        record.last_synced_at = Some(record.last_synced_at.map_or(now, |last| last.max(now)));
        record.last_sync_error = None;

        let stored = self
            .repository
            .upsert(&record)
            .await
            .map_err(|error| persistence_failure(&error))?;

        if !conflicts.is_empty() {
            info!(
                flight = %stored.flight_number,
                conflicts = conflicts.len(),
                ?mode,
                "cross-source conflicts detected"
            );
        }
        Ok(PersistedSnapshot {
            previous,
            record: stored,
            conflicts,
        })
    }

    fn merge_snapshot(
        &self,
        previous: &FlightRecord,
        data: &AirlineFlightData,
        mode: ConflictResolutionMode,
        now: DateTime<Utc>,
    ) -> Result<(FlightRecord, Vec<FlightDataConflict>), SyncFailure> {
        let mut conflicts = detect_conflicts(previous, data, now);
        let mut record = previous.clone();
        record.apply_airline_data(data);
        let conflict_failure = |error: Error| SyncFailure::new(SyncFailureKind::Conflict, error);

        if conflicts.is_empty() {
            self.settle_pending_status(&mut record);
            return Ok((record, conflicts));
        }

        match mode {
            ConflictResolutionMode::Manual => {
                for conflict in &conflicts {
                    record
                        .apply_field(conflict.field, &conflict.current_value)
                        .map_err(conflict_failure)?;
                }
                record.data_source.clone_from(&previous.data_source);
                self.register_pending(&conflicts);
                record.conflict_data = self.pending_payload(&record.identity());
                record.sync_status = SyncStatus::Conflict;
            }
            ConflictResolutionMode::Priority | ConflictResolutionMode::Automatic => {
                let mut kept_current = false;
                for conflict in &mut conflicts {
                    let (value, source) = if mode == ConflictResolutionMode::Priority {
                        let (value, source) = resolve_by_priority(conflict, |name| {
                            self.registry.priority_of_source(name)
                        });
                        (value, Some(source))
                    } else {
                        let value = resolve_automatically(conflict);
                        let source = source_of_value(conflict, &value);
                        (value, source)
                    };
                    record
                        .apply_field(conflict.field, &value)
                        .map_err(conflict_failure)?;
                    kept_current |= value == conflict.current_value;
                    conflict.resolution = Some(ConflictResolution {
                        mode,
                        resolved_value: value,
                        resolved_source: source,
                        resolved_at: now,
                    });
                }
                if kept_current {
                    record.data_source.clone_from(&previous.data_source);
                }
                self.settle_pending_status(&mut record);
            }
        }
        Ok((record, conflicts))
    }

    /// EXACT_MATCH unless conflicts for this flight still await an operator.
    fn settle_pending_status(&self, record: &mut FlightRecord) {
        record.conflict_data = self.pending_payload(&record.identity());
        record.sync_status = if record.conflict_data.is_some() {
            SyncStatus::Conflict
        } else {
            SyncStatus::ExactMatch
        };
    }

    async fn retain_conflict(
        &self,
        mut record: FlightRecord,
        conflict: FlightDataConflict,
    ) -> Result<ResolvedConflict, Error> {
        record.apply_field(conflict.field, &conflict.current_value)?;
        self.register_pending(std::slice::from_ref(&conflict));
        record.conflict_data = self.pending_payload(&record.identity());
        record.sync_status = SyncStatus::Conflict;

        let flight = self
            .repository
            .upsert(&record)
            .await
            .map_err(|error| map_persistence_error(&error))?;
        info!(conflict_id = %conflict.id, field = %conflict.field, "conflict held for manual review");
        Ok(ResolvedConflict { conflict, flight })
    }

    async fn write_resolution(
        &self,
        mut record: FlightRecord,
        mut conflict: FlightDataConflict,
        mode: ConflictResolutionMode,
        value: serde_json::Value,
        source: Option<String>,
        status: SyncStatus,
    ) -> Result<ResolvedConflict, Error> {
        let previous = record.clone();
        record.apply_field(conflict.field, &value)?;

        let removed = lock(&self.pending_conflicts).remove(&conflict.id);
        record.conflict_data = self.pending_payload(&record.identity());
        record.sync_status = if record.conflict_data.is_some() {
            SyncStatus::Conflict
        } else {
            status
        };

        let flight = match self.repository.upsert(&record).await {
            Ok(flight) => flight,
            Err(error) => {
                if let Some(pending) = removed {
                    lock(&self.pending_conflicts).insert(pending.id, pending);
                }
                return Err(map_persistence_error(&error));
            }
        };

        conflict.resolution = Some(ConflictResolution {
            mode,
            resolved_value: value,
            resolved_source: source,
            resolved_at: self.clock.utc(),
        });
        if let Some(payload) = build_notification(&previous, &flight, self.clock.utc()) {
            self.dispatch(&payload);
        }
        info!(conflict_id = %conflict.id, field = %conflict.field, ?mode, "conflict resolved");
        Ok(ResolvedConflict { conflict, flight })
    }

    async fn load_conflicted_record(&self, flight: &FlightIdentity) -> Result<FlightRecord, Error> {
        self.repository
            .find_by_identity(flight)
            .await
            .map_err(|error| map_persistence_error(&error))?
            .ok_or_else(|| {
                Error::not_found(format!(
                    "flight {} departing {} not found",
                    flight.flight_number, flight.scheduled_departure
                ))
            })
    }

    /// Track conflicts awaiting an operator, replacing older ones on the
    /// same flight and field.
    fn register_pending(&self, conflicts: &[FlightDataConflict]) {
        let mut pending = lock(&self.pending_conflicts);
        for conflict in conflicts {
            pending.retain(|_, existing| {
                existing.flight != conflict.flight || existing.field != conflict.field
            });
            pending.insert(conflict.id, conflict.clone());
        }
    }

    fn pending_payload(&self, flight: &FlightIdentity) -> Option<serde_json::Value> {
        let mut conflicts: Vec<FlightDataConflict> = lock(&self.pending_conflicts)
            .values()
            .filter(|conflict| conflict.flight == *flight)
            .cloned()
            .collect();
        if conflicts.is_empty() {
            return None;
        }
        conflicts.sort_by(|left, right| left.field.cmp(&right.field));
        serde_json::to_value(conflicts).ok()
    }

    fn dispatch(&self, payload: &SyncWebhookPayload) {
        let subscribers = read_lock(&self.subscribers).clone();
        for (index, subscriber) in subscribers.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| subscriber.notify(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => warn!(
                    subscriber = index,
                    event_id = %payload.event_id,
                    error = %failure,
                    "sync subscriber failed"
                ),
                Err(_) => error!(
                    subscriber = index,
                    event_id = %payload.event_id,
                    "sync subscriber panicked"
                ),
            }
        }
        debug!(
            event_id = %payload.event_id,
            event_type = ?payload.event_type,
            subscribers = subscribers.len(),
            "dispatched sync notification"
        );
    }

    async fn finish_success(
        &self,
        request: SyncFlightRequest,
        success: SyncSuccess,
        duration: Duration,
    ) -> SyncResult {
        self.record_metric(SyncMetricsEvent::Success {
            from_cache: success.from_cache,
        })
        .await;
        self.push_history(
            &request,
            SyncHistoryEntry {
                timestamp: self.clock.utc(),
                success: true,
                source: Some(success.source.clone()),
                from_cache: success.from_cache,
                error: None,
            },
        );

        SyncResult {
            flight_number: request.flight_number,
            airline_code: request.airline_code,
            departure_date: request.departure_date,
            success: true,
            sync_status: Some(success.record.sync_status),
            flight: Some(success.record),
            from_cache: success.from_cache,
            source: Some(success.source),
            conflicts: success.conflicts,
            notification: success.notification,
            error: None,
            duration,
        }
    }

    async fn finish_failure(
        &self,
        request: SyncFlightRequest,
        failure: SyncFailure,
        duration: Duration,
    ) -> SyncResult {
        warn!(
            flight = %request.flight_number,
            airline = %request.airline_code,
            code = %failure.error.code(),
            error = %failure.error,
            "flight sync failed"
        );
        self.record_metric(SyncMetricsEvent::Failure { kind: failure.kind })
            .await;
        // No adapter means no flight this service tracks.
        if failure.kind != SyncFailureKind::AdapterNotFound {
            self.push_history(
                &request,
                SyncHistoryEntry {
                    timestamp: self.clock.utc(),
                    success: false,
                    source: failure.source.clone(),
                    from_cache: false,
                    error: Some(failure.error.message().to_owned()),
                },
            );
        }
        let flight = self.record_failed_attempt(&request, &failure.error).await;

        SyncResult {
            flight_number: request.flight_number,
            airline_code: request.airline_code,
            departure_date: request.departure_date,
            success: false,
            sync_status: flight.as_ref().map(|record| record.sync_status),
            flight,
            from_cache: false,
            source: failure.source,
            conflicts: Vec::new(),
            notification: None,
            error: Some(failure.error),
            duration,
        }
    }

    /// Bump `sync_attempts` and stamp `last_sync_error` on the stored row,
    /// located by exact departure when known and by departure date otherwise.
    async fn record_failed_attempt(
        &self,
        request: &SyncFlightRequest,
        error: &Error,
    ) -> Option<FlightRecord> {
        let lookup = match request.scheduled_departure {
            Some(scheduled_departure) => {
                let identity = FlightIdentity::new(
                    request.flight_number.clone(),
                    request.airline_code.clone(),
                    scheduled_departure,
                );
                self.repository.find_by_identity(&identity).await
            }
            None => {
                self.repository
                    .find_by_flight_on_date(
                        &request.flight_number,
                        &request.airline_code,
                        request.departure_date,
                    )
                    .await
            }
        };
        let mut record = match lookup {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(lookup_error) => {
                warn!(error = %lookup_error, "could not load flight to record sync failure");
                return None;
            }
        };
        record.sync_attempts = record.sync_attempts.saturating_add(1);
        record.last_sync_error = Some(format!("{}: {}", error.code(), error.message()));

        match self.repository.upsert(&record).await {
            Ok(stored) => Some(stored),
            Err(store_error) => {
                warn!(error = %store_error, "could not record sync failure on flight");
                Some(record)
            }
        }
    }

    fn push_history(&self, request: &SyncFlightRequest, entry: SyncHistoryEntry) {
        let (limit, flight_limit) = {
            let config = read_lock(&self.config);
            (config.history_limit.max(1), config.history_flight_limit.max(1))
        };
        let key = HistoryKey::new(
            &request.airline_code,
            &request.flight_number,
            request.departure_date,
        );
        let mut history = lock(&self.history);
        if !history.contains_key(&key) {
            while history.len() >= flight_limit {
                let Some(stalest) = least_recent_key(&history) else {
                    break;
                };
                history.remove(&stalest);
            }
        }
        let entries = history.entry(key).or_default();
        entries.push_back(entry);
        while entries.len() > limit {
            entries.pop_front();
        }
    }

    async fn record_metric(&self, event: SyncMetricsEvent) {
        // Metrics failures never change a sync outcome.
        if let Err(error) = self.metrics.record_sync(&event).await {
            debug!(error = %error, "sync metrics write failed");
        }
    }
}

fn manual_choice(
    conflict: &FlightDataConflict,
    request: &ConflictResolutionRequest,
) -> Result<(serde_json::Value, Option<String>, SyncStatus), Error> {
    if let Some(value) = &request.override_value {
        return Ok((value.clone(), None, SyncStatus::ManualOverride));
    }
    match request.selected_source.as_deref() {
        Some(source) if source == conflict.source1 => Ok((
            conflict.current_value.clone(),
            Some(conflict.source1.clone()),
            SyncStatus::ExactMatch,
        )),
        Some(source) if source == conflict.source2 => Ok((
            conflict.new_value.clone(),
            Some(conflict.source2.clone()),
            SyncStatus::ExactMatch,
        )),
        Some(source) => Err(Error::conflict_unresolvable(format!(
            "source {source} is not party to conflict {}",
            conflict.id
        ))),
        None => Err(Error::conflict_unresolvable(
            "manual resolution requires selectedSource or overrideValue",
        )),
    }
}

fn source_of_value(conflict: &FlightDataConflict, value: &serde_json::Value) -> Option<String> {
    if *value == conflict.current_value {
        Some(conflict.source1.clone())
    } else if *value == conflict.new_value {
        Some(conflict.source2.clone())
    } else {
        None
    }
}

fn least_recent_key(
    history: &HashMap<HistoryKey, VecDeque<SyncHistoryEntry>>,
) -> Option<HistoryKey> {
    history
        .iter()
        .min_by_key(|(_, entries)| entries.back().map(|entry| entry.timestamp))
        .map(|(key, _)| key.clone())
}

fn adapter_not_found(airline_code: &str) -> Error {
    Error::adapter_not_found(format!("no adapter registered for airline {airline_code}"))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
