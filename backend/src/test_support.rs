//! Test utilities for the flight sync crate.
//!
//! This module provides shared helpers for both unit tests (in `src/`) and
//! integration tests (in `tests/`). It is only compiled for tests or with the
//! `test-support` feature.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use serde_json::json;

use crate::domain::ports::{
    AirlineAdapter, AirlineAdapterError, SyncSubscriber, SyncSubscriberError, SyncWebhookPayload,
};
use crate::domain::{
    AirlineFlightData, FlightSearchFilters, FlightStatus, FlightStatusUpdate,
};

/// Clock whose time only moves when a test advances it.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *self.lock_clock() += delta;
    }

    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.lock_clock() = now;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Scheduled departure used by [`flight_data`]: 2026-02-25 09:30 UTC.
pub fn departure() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 2, 25, 9, 30, 0).single() {
        Some(instant) => instant,
        None => panic!("fixture departure"),
    }
}

/// Calendar date of [`departure`].
pub fn departure_date() -> NaiveDate {
    departure().date_naive()
}

/// On-time FRA to JFK snapshot produced by `source`.
pub fn flight_data(flight_number: &str, airline_code: &str, source: &str) -> AirlineFlightData {
    let scheduled_departure = departure();
    AirlineFlightData {
        flight_number: flight_number.to_owned(),
        airline_code: airline_code.to_owned(),
        origin: "FRA".to_owned(),
        destination: "JFK".to_owned(),
        scheduled_departure,
        scheduled_arrival: Some(scheduled_departure + TimeDelta::hours(9)),
        estimated_departure: None,
        estimated_arrival: None,
        actual_departure: None,
        actual_arrival: None,
        status: FlightStatus::Scheduled,
        delay_minutes: 0,
        gate: Some("A12".to_owned()),
        terminal: Some("1".to_owned()),
        cancellation_reason: None,
        seats_available: Some(40),
        price_cents: Some(54_900),
        price_currency: Some("EUR".to_owned()),
        source: source.to_owned(),
        raw: json!({ "flight": flight_number }),
    }
}

type ScriptedResult = Result<Option<AirlineFlightData>, AirlineAdapterError>;

/// Adapter answering from a script of queued results.
///
/// Queued results are consumed first; afterwards every call returns the
/// fallback, which defaults to "not found". Returned snapshots carry the
/// requested flight number.
pub struct ScriptedAirlineAdapter {
    airline_code: String,
    name: String,
    priority: u32,
    script: Mutex<VecDeque<ScriptedResult>>,
    fallback: Mutex<ScriptedResult>,
    healthy: AtomicBool,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl ScriptedAirlineAdapter {
    pub fn new(airline_code: &str, name: &str, priority: u32) -> Self {
        Self {
            airline_code: airline_code.to_owned(),
            name: name.to_owned(),
            priority,
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(None)),
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Answer every unscripted call with `data`.
    #[must_use]
    pub fn returning(self, data: AirlineFlightData) -> Self {
        self.set_fallback(Ok(Some(data)));
        self
    }

    /// Answer every unscripted call with `error`.
    #[must_use]
    pub fn failing(self, error: AirlineAdapterError) -> Self {
        self.set_fallback(Err(error));
        self
    }

    /// Queue one result ahead of the fallback.
    pub fn push(&self, result: ScriptedResult) {
        lock(&self.script).push_back(result);
    }

    /// Replace the fallback result.
    pub fn set_fallback(&self, result: ScriptedResult) {
        *lock(&self.fallback) = result;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of `fetch_flight_data` calls that reached the adapter.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Flight numbers passed to `fetch_flight_data`, in call order.
    pub fn requested(&self) -> Vec<String> {
        lock(&self.requested).clone()
    }

    fn next_result(&self, flight_number: &str) -> ScriptedResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requested).push(flight_number.to_owned());
        let queued = lock(&self.script).pop_front();
        let result = match queued {
            Some(result) => result,
            None => lock(&self.fallback).clone(),
        };
        result.map(|data| {
            data.map(|mut data| {
                flight_number.clone_into(&mut data.flight_number);
                data
            })
        })
    }
}

#[async_trait]
impl AirlineAdapter for ScriptedAirlineAdapter {
    fn airline_code(&self) -> &str {
        &self.airline_code
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn fetch_flight_data(
        &self,
        flight_number: &str,
        _date: NaiveDate,
    ) -> Result<Option<AirlineFlightData>, AirlineAdapterError> {
        self.next_result(flight_number)
    }

    async fn fetch_flights(
        &self,
        _filters: &FlightSearchFilters,
    ) -> Result<Vec<AirlineFlightData>, AirlineAdapterError> {
        let fallback = lock(&self.fallback).clone();
        fallback.map(|data| data.into_iter().collect())
    }

    async fn fetch_flight_status(
        &self,
        _flight_number: &str,
        _date: NaiveDate,
    ) -> Result<Option<FlightStatusUpdate>, AirlineAdapterError> {
        let fallback = lock(&self.fallback).clone();
        fallback.map(|data| {
            data.map(|data| FlightStatusUpdate {
                status: data.status,
                delay_minutes: data.delay_minutes,
                gate: data.gate,
                terminal: data.terminal,
                estimated_departure: data.estimated_departure,
            })
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

/// Subscriber that remembers every payload it receives.
#[derive(Default)]
pub struct RecordingSubscriber(Mutex<Vec<SyncWebhookPayload>>);

impl RecordingSubscriber {
    pub fn payloads(&self) -> Vec<SyncWebhookPayload> {
        lock(&self.0).clone()
    }
}

impl SyncSubscriber for RecordingSubscriber {
    fn notify(&self, payload: &SyncWebhookPayload) -> Result<(), SyncSubscriberError> {
        lock(&self.0).push(payload.clone());
        Ok(())
    }
}

/// Subscriber that always reports a delivery failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSubscriber;

impl SyncSubscriber for FailingSubscriber {
    fn notify(&self, _payload: &SyncWebhookPayload) -> Result<(), SyncSubscriberError> {
        Err(SyncSubscriberError::delivery("consumer offline"))
    }
}

/// Subscriber that panics on every payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanickingSubscriber;

impl SyncSubscriber for PanickingSubscriber {
    fn notify(&self, _payload: &SyncWebhookPayload) -> Result<(), SyncSubscriberError> {
        panic!("subscriber exploded");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("test support mutex"),
    }
}
