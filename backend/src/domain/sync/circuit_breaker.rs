//! Per-adapter circuit breaker.
//!
//! State machine: CLOSED opens once `failure_threshold` failures accumulate
//! (there is no decay window while CLOSED). OPEN fails fast until
//! `reset_timeout` has elapsed, then the next observation moves it to
//! HALF_OPEN with both counters reset. Two consecutive HALF_OPEN successes
//! close it; any HALF_OPEN failure reopens it and re-arms the timeout.
//!
//! The OPEN to HALF_OPEN transition is evaluated lazily against the injected
//! clock whenever the breaker is used or inspected.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

/// Consecutive HALF_OPEN successes needed to close the breaker.
pub const HALF_OPEN_SUCCESS_THRESHOLD: u32 = 2;

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures required to open the breaker.
    pub failure_threshold: u32,
    /// Time spent OPEN before probing upstream again.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls fail fast without reaching upstream.
    Open,
    /// Calls pass through while recovery is confirmed.
    HalfOpen,
}

/// Point-in-time breaker snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    /// Earliest instant a call will be admitted again; set only when OPEN.
    pub next_retry_time: Option<DateTime<Utc>>,
}

/// Failure returned by [`CircuitBreaker::execute`].
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// The breaker is open; the operation was not invoked.
    #[error("circuit breaker {name} is open until {next_retry_time}")]
    Open {
        name: String,
        next_retry_time: DateTime<Utc>,
    },
    /// The operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitInternalState {
    Closed,
    Open { opened_at: DateTime<Utc> },
    HalfOpen,
}

#[derive(Debug, Clone)]
struct BreakerState {
    config: CircuitBreakerConfig,
    circuit: CircuitInternalState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
}

impl BreakerState {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: CircuitBreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                reset_timeout: config.reset_timeout,
            },
            circuit: CircuitInternalState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
        }
    }

    /// Apply the delayed OPEN to HALF_OPEN transition if it is due.
    fn refresh(&mut self, now: DateTime<Utc>, name: &str) {
        if let CircuitInternalState::Open { opened_at } = self.circuit {
            if now >= retry_time(opened_at, self.config.reset_timeout) {
                self.circuit = CircuitInternalState::HalfOpen;
                self.failure_count = 0;
                self.success_count = 0;
                info!(breaker = name, "circuit breaker half-open");
            }
        }
    }

    fn next_retry_time(&self) -> Option<DateTime<Utc>> {
        match self.circuit {
            CircuitInternalState::Open { opened_at } => {
                Some(retry_time(opened_at, self.config.reset_timeout))
            }
            CircuitInternalState::Closed | CircuitInternalState::HalfOpen => None,
        }
    }

    fn record_success(&mut self, name: &str) {
        if self.circuit != CircuitInternalState::HalfOpen {
            return;
        }
        self.success_count = self.success_count.saturating_add(1);
        if self.success_count >= HALF_OPEN_SUCCESS_THRESHOLD {
            self.circuit = CircuitInternalState::Closed;
            self.failure_count = 0;
            self.success_count = 0;
            info!(breaker = name, "circuit breaker closed");
        }
    }

    fn record_failure(&mut self, now: DateTime<Utc>, name: &str) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_time = Some(now);
        match self.circuit {
            CircuitInternalState::HalfOpen => {
                self.circuit = CircuitInternalState::Open { opened_at: now };
                self.success_count = 0;
                warn!(breaker = name, "circuit breaker reopened from half-open");
            }
            CircuitInternalState::Closed
                if self.failure_count >= self.config.failure_threshold =>
            {
                self.circuit = CircuitInternalState::Open { opened_at: now };
                warn!(
                    breaker = name,
                    failures = self.failure_count,
                    "circuit breaker opened"
                );
            }
            CircuitInternalState::Closed | CircuitInternalState::Open { .. } => {}
        }
    }

    fn public_state(&self) -> CircuitState {
        match self.circuit {
            CircuitInternalState::Closed => CircuitState::Closed,
            CircuitInternalState::Open { .. } => CircuitState::Open,
            CircuitInternalState::HalfOpen => CircuitState::HalfOpen,
        }
    }
}

fn retry_time(opened_at: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(timeout)
        .ok()
        .and_then(|delta| opened_at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Failure isolator wrapping calls to one upstream adapter.
pub struct CircuitBreaker {
    name: String,
    clock: Arc<dyn Clock>,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a CLOSED breaker.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use flight_sync::domain::sync::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    /// use mockable::DefaultClock;
    ///
    /// let breaker = CircuitBreaker::new(
    ///     "Lufthansa",
    ///     CircuitBreakerConfig::default(),
    ///     Arc::new(DefaultClock),
    /// );
    /// assert_eq!(breaker.state(), CircuitState::Closed);
    /// ```
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            clock,
            state: Mutex::new(BreakerState::new(config)),
        }
    }

    /// Name of the adapter this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `operation` unless the breaker is open.
    ///
    /// The state lock is released while `operation` runs, so concurrent
    /// callers only serialize their state reads and writes.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBreakerError::Open`] without invoking `operation` when
    /// the breaker is open, or [`CircuitBreakerError::Inner`] carrying the
    /// operation's own error.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut state = self.lock_state();
            state.refresh(self.clock.utc(), &self.name);
            if let Some(next_retry_time) = state.next_retry_time() {
                return Err(CircuitBreakerError::Open {
                    name: self.name.clone(),
                    next_retry_time,
                });
            }
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(CircuitBreakerError::Inner(error))
            }
        }
    }

    /// Count one success; only meaningful while HALF_OPEN.
    pub fn record_success(&self) {
        let mut state = self.lock_state();
        state.refresh(self.clock.utc(), &self.name);
        state.record_success(&self.name);
    }

    /// Count one failure and open the breaker when the threshold is reached.
    pub fn record_failure(&self) {
        let now = self.clock.utc();
        let mut state = self.lock_state();
        state.refresh(now, &self.name);
        state.record_failure(now, &self.name);
    }

    /// Current state, after applying any due OPEN to HALF_OPEN transition.
    pub fn state(&self) -> CircuitState {
        let mut state = self.lock_state();
        state.refresh(self.clock.utc(), &self.name);
        state.public_state()
    }

    /// Snapshot state, counters, and retry hint.
    pub fn status(&self) -> CircuitBreakerStatus {
        let mut state = self.lock_state();
        state.refresh(self.clock.utc(), &self.name);
        CircuitBreakerStatus {
            name: self.name.clone(),
            state: state.public_state(),
            failure_count: state.failure_count,
            success_count: state.success_count,
            failure_threshold: state.config.failure_threshold,
            reset_timeout_ms: u64::try_from(state.config.reset_timeout.as_millis())
                .unwrap_or(u64::MAX),
            last_failure_time: state.last_failure_time,
            next_retry_time: state.next_retry_time(),
        }
    }

    /// Change thresholds; current state and counters are kept.
    pub fn reconfigure(&self, failure_threshold: Option<u32>, reset_timeout: Option<Duration>) {
        let mut state = self.lock_state();
        if let Some(threshold) = failure_threshold {
            state.config.failure_threshold = threshold.max(1);
        }
        if let Some(timeout) = reset_timeout {
            state.config.reset_timeout = timeout;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
