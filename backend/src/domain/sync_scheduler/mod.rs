//! Periodic resynchronization of stale flights.
//!
//! The scheduler selects flights departing soon whose last sync is older
//! than the staleness window, orders them, and feeds them in batches to the
//! [`SynchronizationService`]. Runs never overlap: a tick arriving while a
//! run is in progress is skipped with a warning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::domain::ports::{FlightRecordRepository, SyncCandidateQuery};
use crate::domain::sync::{
    SyncConfigPatch, SyncError, SyncFlightRequest, SyncJob, SyncJobType, SyncResult,
    SyncServiceConfigView, SynchronizationService,
};
use crate::domain::{Error, ErrorCode, FlightRecord, FlightStatus};

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Whether `start` arms the periodic loop.
    pub enabled: bool,
    /// Period between ticks.
    pub interval: Duration,
    /// Flights handed to the service per batch.
    pub batch_size: usize,
    /// Order candidates by departure with delayed flights first.
    pub prioritize_active: bool,
    /// How far ahead departures are considered.
    pub lookahead: Duration,
    /// Rows synced more recently than this are skipped.
    pub staleness: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(15 * 60),
            batch_size: 100,
            prioritize_active: true,
            lookahead: Duration::from_secs(7 * 24 * 60 * 60),
            staleness: Duration::from_secs(30 * 60),
        }
    }
}

/// Scheduler configuration as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfigView {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub batch_size: usize,
    pub prioritize_active: bool,
    pub lookahead_seconds: u64,
    pub staleness_seconds: u64,
}

impl From<&SchedulerConfig> for SchedulerConfigView {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            enabled: config.enabled,
            interval_seconds: config.interval.as_secs(),
            batch_size: config.batch_size,
            prioritize_active: config.prioritize_active,
            lookahead_seconds: config.lookahead.as_secs(),
            staleness_seconds: config.staleness.as_secs(),
        }
    }
}

/// Cumulative run statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub total_runs: u64,
    pub total_flights_synced: u64,
    pub total_failures: u64,
    /// Running mean over all completed runs.
    pub average_run_duration_ms: u64,
}

impl SchedulerStats {
    fn record_run(&mut self, synced: usize, failed: usize, duration: Duration) {
        self.total_runs += 1;
        self.total_flights_synced += synced as u64;
        self.total_failures += failed as u64;
        let elapsed_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let previous_total =
            u128::from(self.average_run_duration_ms) * u128::from(self.total_runs - 1);
        let mean = (previous_total + u128::from(elapsed_ms)) / u128::from(self.total_runs);
        self.average_run_duration_ms = u64::try_from(mean).unwrap_or(u64::MAX);
    }
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub enabled: bool,
    /// Whether the periodic loop is armed.
    pub started: bool,
    /// Whether a run is in progress.
    pub is_running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub stats: SchedulerStats,
    pub config: SchedulerConfigView,
    pub last_job: Option<SyncJob>,
}

/// Configuration after an operator update.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedSyncConfig {
    pub service: SyncServiceConfigView,
    pub scheduler: SchedulerConfigView,
    pub applied_at: DateTime<Utc>,
}

/// What a run attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run executed; the job records its result.
    Completed(SyncJob),
    /// Another run was in progress.
    Skipped,
}

#[derive(Debug, Default)]
struct RunState {
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
    stats: SchedulerStats,
}

struct SchedulerInner {
    service: Arc<SynchronizationService>,
    repository: Arc<dyn FlightRecordRepository>,
    clock: Arc<dyn Clock>,
    config: Mutex<SchedulerConfig>,
    running: AtomicBool,
    state: Mutex<RunState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Releases the running flag when a run ends, including by panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic driver for [`SynchronizationService`] batches.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
}

impl SyncScheduler {
    /// Create a stopped scheduler.
    pub fn new(
        service: Arc<SynchronizationService>,
        repository: Arc<dyn FlightRecordRepository>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                service,
                repository,
                clock,
                config: Mutex::new(config),
                running: AtomicBool::new(false),
                state: Mutex::new(RunState::default()),
                task: Mutex::new(None),
            }),
        }
    }

    /// Arm the periodic loop. Must be called within a Tokio runtime.
    ///
    /// Returns `false` when the scheduler is disabled or already started.
    pub fn start(&self) -> bool {
        let (enabled, period) = {
            let config = lock(&self.inner.config);
            (config.enabled, config.interval)
        };
        if !enabled {
            info!("flight sync scheduler disabled; not starting");
            return false;
        }

        let mut task = lock(&self.inner.task);
        if task.is_some() {
            warn!("flight sync scheduler already started");
            return false;
        }

        let weak = Arc::downgrade(&self.inner);
        *task = Some(tokio::spawn(tick_loop(weak, period)));
        lock(&self.inner.state).next_run = Some(self.inner.next_run_after(period));
        info!(interval_secs = period.as_secs(), "flight sync scheduler started");
        true
    }

    /// Disarm the periodic loop. A run already in flight finishes.
    ///
    /// Returns `false` when the scheduler was not started.
    pub fn stop(&self) -> bool {
        let Some(handle) = lock(&self.inner.task).take() else {
            return false;
        };
        handle.abort();
        lock(&self.inner.state).next_run = None;
        info!("flight sync scheduler stopped");
        true
    }

    /// Whether the periodic loop is armed.
    pub fn is_started(&self) -> bool {
        lock(&self.inner.task).is_some()
    }

    /// Run one resynchronization pass now.
    ///
    /// `batch_size` overrides the configured batch size for this run only.
    pub async fn force_run(&self, batch_size: Option<usize>) -> RunOutcome {
        self.inner.run_sync(batch_size).await
    }

    /// Current status, statistics, and most recent job.
    pub fn get_status(&self) -> SchedulerStatus {
        let config = lock(&self.inner.config).clone();
        let (last_run, next_run, stats) = {
            let state = lock(&self.inner.state);
            (state.last_run, state.next_run, state.stats)
        };
        SchedulerStatus {
            enabled: config.enabled,
            started: self.is_started(),
            is_running: self.inner.running.load(Ordering::Acquire),
            last_run,
            next_run,
            stats,
            config: SchedulerConfigView::from(&config),
            last_job: self.inner.service.last_sync_job(),
        }
    }

    /// When the periodic loop next fires, if it is armed.
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        lock(&self.inner.state).next_run
    }

    /// Zero the cumulative statistics.
    pub fn reset_stats(&self) {
        lock(&self.inner.state).stats = SchedulerStats::default();
    }

    /// Current scheduler configuration.
    pub fn config(&self) -> SchedulerConfigView {
        SchedulerConfigView::from(&*lock(&self.inner.config))
    }

    /// Apply `patch` to the service and the scheduler.
    ///
    /// An interval change restarts a started loop so the new period takes
    /// effect immediately.
    ///
    /// # Errors
    ///
    /// `INVALID_REQUEST` when a field is zero; nothing is applied then.
    pub fn update_config(&self, patch: &SyncConfigPatch) -> Result<AppliedSyncConfig, Error> {
        patch.validate()?;
        let service = self.inner.service.apply_config(patch)?;

        let (interval_changed, scheduler) = {
            let mut config = lock(&self.inner.config);
            if let Some(batch_size) = patch.batch_size {
                config.batch_size = batch_size;
            }
            if let Some(prioritize) = patch.prioritize_active {
                config.prioritize_active = prioritize;
            }
            let interval = patch.interval_seconds.map(Duration::from_secs);
            let changed = interval.is_some_and(|period| period != config.interval);
            if let Some(period) = interval {
                config.interval = period;
            }
            (changed, SchedulerConfigView::from(&*config))
        };

        if interval_changed && self.stop() {
            info!(
                interval_secs = scheduler.interval_seconds,
                "restarting flight sync scheduler with new interval"
            );
            self.start();
        }

        Ok(AppliedSyncConfig {
            service,
            scheduler,
            applied_at: self.inner.clock.utc(),
        })
    }
}

impl SchedulerInner {
    fn next_run_after(&self, period: Duration) -> DateTime<Utc> {
        shift(self.clock.utc(), period, true)
    }

    async fn run_sync(&self, batch_override: Option<usize>) -> RunOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("flight sync run already in progress; skipping");
            return RunOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        let started = Instant::now();
        let now = self.clock.utc();
        let config = lock(&self.config).clone();
        let started_loop = lock(&self.task).is_some();
        {
            let mut state = lock(&self.state);
            state.last_run = Some(now);
            if started_loop {
                state.next_run = Some(shift(now, config.interval, true));
            }
        }

        let mut job = SyncJob::pending(SyncJobType::Scheduled, now).start(now);
        self.service.record_job(job.clone());

        let query = SyncCandidateQuery {
            departs_from: now,
            departs_until: shift(now, config.lookahead, true),
            stale_before: shift(now, config.staleness, false),
        };
        let mut candidates = match self.repository.find_sync_candidates(&query).await {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(error = %err, "failed to load flight sync candidates");
                job.fail(
                    self.clock.utc(),
                    SyncError {
                        flight_number: String::new(),
                        airline_code: String::new(),
                        code: ErrorCode::ServiceUnavailable,
                        message: err.to_string(),
                    },
                );
                self.service.record_job(job.clone());
                return RunOutcome::Completed(job);
            }
        };
        if config.prioritize_active {
            prioritize(&mut candidates);
        }

        let batch_size = batch_override.unwrap_or(config.batch_size).max(1);
        let mut updated = 0;
        let mut errors = Vec::new();
        for chunk in candidates.chunks(batch_size) {
            let (synced, failures) = self.run_batch(chunk).await;
            updated += synced;
            errors.extend(failures);
        }

        let processed = candidates.len();
        let failed = errors.len();
        job.complete(self.clock.utc(), processed, updated, errors);
        self.service.record_job(job.clone());

        let duration = started.elapsed();
        lock(&self.state).stats.record_run(updated, failed, duration);
        info!(
            processed,
            updated,
            failed,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "flight sync run finished"
        );
        RunOutcome::Completed(job)
    }

    /// Sync one batch on its own task so a panic fails only this batch.
    async fn run_batch(&self, chunk: &[FlightRecord]) -> (usize, Vec<SyncError>) {
        let requests: Vec<SyncFlightRequest> =
            chunk.iter().map(SyncFlightRequest::for_record).collect();
        let service = Arc::clone(&self.service);
        let handle =
            tokio::spawn(async move { service.batch_sync_flights(requests, None).await });

        match handle.await {
            Ok(batch) => (
                batch.successful.len(),
                batch.failed.iter().map(sync_error).collect(),
            ),
            Err(join_error) => {
                error!(
                    error = %join_error,
                    batch_len = chunk.len(),
                    "flight sync batch aborted"
                );
                let message = format!("batch aborted: {join_error}");
                let errors = chunk
                    .iter()
                    .map(|record| SyncError {
                        flight_number: record.flight_number.clone(),
                        airline_code: record.airline_code.clone(),
                        code: ErrorCode::InternalError,
                        message: message.clone(),
                    })
                    .collect();
                (0, errors)
            }
        }
    }
}

async fn tick_loop(scheduler: Weak<SchedulerInner>, period: Duration) {
    let start = tokio::time::Instant::now() + period;
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(inner) = scheduler.upgrade() else {
            break;
        };
        lock(&inner.state).next_run = Some(inner.next_run_after(period));
        tokio::spawn(async move {
            inner.run_sync(None).await;
        });
    }
}

/// Move `instant` by `by`, saturating at the representable bounds.
fn shift(instant: DateTime<Utc>, by: Duration, forward: bool) -> DateTime<Utc> {
    let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
    if forward {
        instant
            .checked_add_signed(delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    } else {
        instant
            .checked_sub_signed(delta)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Earliest departure first; delayed flights lead within the same slot.
fn prioritize(candidates: &mut [FlightRecord]) {
    candidates.sort_by(|left, right| {
        left.scheduled_departure
            .cmp(&right.scheduled_departure)
            .then_with(|| is_delayed(right).cmp(&is_delayed(left)))
    });
}

fn is_delayed(record: &FlightRecord) -> bool {
    record.status == FlightStatus::Delayed || record.delay_minutes > 0
}

fn sync_error(result: &SyncResult) -> SyncError {
    let (code, message) = result.error.as_ref().map_or_else(
        || (ErrorCode::InternalError, "sync failed".to_owned()),
        |err| (err.code(), err.message().to_owned()),
    );
    SyncError {
        flight_number: result.flight_number.clone(),
        airline_code: result.airline_code.clone(),
        code,
        message,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
