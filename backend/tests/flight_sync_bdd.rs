//! Behaviour tests for end-to-end flight synchronization.

use std::sync::Arc;

use chrono::TimeDelta;
use flight_sync::domain::ports::{AirlineAdapterError, NoOpSyncMetrics, SyncEventType};
use flight_sync::domain::sync::{
    AdapterRegistry, SyncFlightRequest, SyncResult, SyncServiceConfig, SyncServicePorts,
};
use flight_sync::domain::{Error, ErrorCode, FlightStatus, SynchronizationService};
use flight_sync::outbound::memory::InMemoryFlightRecordRepository;
use flight_sync::test_support::{
    MutableClock, RecordingSubscriber, ScriptedAirlineAdapter, departure, departure_date,
    flight_data,
};
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, scenario, then, when};
use serde_json::json;
use tokio::runtime::Runtime;

const WEBHOOK_SECRET: &str = "bdd-secret";

#[derive(Clone)]
struct RuntimeHandle(Arc<Runtime>);

#[derive(Default, ScenarioState)]
struct FlightSyncWorld {
    runtime: Slot<RuntimeHandle>,
    service: Slot<Arc<SynchronizationService>>,
    lufthansa: Slot<Arc<ScriptedAirlineAdapter>>,
    subscriber: Slot<Arc<RecordingSubscriber>>,
    last_result: Slot<SyncResult>,
    webhook_error: Slot<Error>,
}

impl FlightSyncWorld {
    fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        let runtime = self.runtime.get().expect("runtime should be set");
        runtime.0.block_on(future)
    }

    fn sync_lh001(&self, force_refresh: bool) -> SyncResult {
        let service = self.service.get().expect("service should be set");
        let request =
            SyncFlightRequest::new("LH001", "LH", departure_date()).with_force_refresh(force_refresh);
        let result = self.block_on(service.sync_flight(request));
        self.last_result.set(result.clone());
        result
    }
}

#[fixture]
fn world() -> FlightSyncWorld {
    FlightSyncWorld::default()
}

#[given("a sync service with a Lufthansa adapter")]
fn a_sync_service_with_a_lufthansa_adapter(world: &FlightSyncWorld) {
    let clock = Arc::new(MutableClock::new(departure() - TimeDelta::hours(6)));
    let lufthansa = Arc::new(
        ScriptedAirlineAdapter::new("LH", "Lufthansa", 1)
            .returning(flight_data("LH001", "LH", "Lufthansa")),
    );
    let config = SyncServiceConfig {
        webhook_secret: Some(WEBHOOK_SECRET.to_owned()),
        ..SyncServiceConfig::default()
    };
    let mut registry = AdapterRegistry::new(clock.clone(), config.breaker);
    registry.register(lufthansa.clone());
    let service = Arc::new(SynchronizationService::new(
        SyncServicePorts::new(
            registry,
            Arc::new(InMemoryFlightRecordRepository::new()),
            Arc::new(NoOpSyncMetrics),
        ),
        clock,
        config,
    ));
    let subscriber = Arc::new(RecordingSubscriber::default());
    service.subscribe(subscriber.clone());

    world
        .runtime
        .set(RuntimeHandle(Arc::new(Runtime::new().expect("create runtime"))));
    world.service.set(service);
    world.lufthansa.set(lufthansa);
    world.subscriber.set(subscriber);
}

#[given("LH001 has been synchronized as scheduled")]
fn lh001_has_been_synchronized_as_scheduled(world: &FlightSyncWorld) {
    let result = world.sync_lh001(false);
    assert!(result.success, "seed sync should succeed: {:?}", result.error);
    assert_eq!(
        result.flight.map(|flight| flight.status),
        Some(FlightStatus::Scheduled)
    );
}

#[given("Lufthansa fails every request with a transport error")]
fn lufthansa_fails_every_request(world: &FlightSyncWorld) {
    let lufthansa = world.lufthansa.get().expect("adapter should be set");
    lufthansa.set_fallback(Err(AirlineAdapterError::transport("connection reset")));
}

#[when("Lufthansa reports LH001 delayed by 15 minutes")]
fn lufthansa_reports_lh001_delayed(world: &FlightSyncWorld) {
    let lufthansa = world.lufthansa.get().expect("adapter should be set");
    let mut delayed = flight_data("LH001", "LH", "Lufthansa");
    delayed.status = FlightStatus::Delayed;
    delayed.delay_minutes = 15;
    lufthansa.set_fallback(Ok(Some(delayed)));
}

#[when("LH001 is synchronized with a forced refresh")]
fn lh001_is_synchronized_with_a_forced_refresh(world: &FlightSyncWorld) {
    world.sync_lh001(true);
}

#[when("LH001 is synchronized 6 times")]
fn lh001_is_synchronized_six_times(world: &FlightSyncWorld) {
    for _ in 0..6 {
        world.sync_lh001(true);
    }
}

#[when("an unsigned webhook for LH001 arrives")]
fn an_unsigned_webhook_arrives(world: &FlightSyncWorld) {
    let service = world.service.get().expect("service should be set");
    let body = json!({
        "eventId": "evt-bdd",
        "flightNumber": "LH001",
        "airlineCode": "LH",
        "departureDate": departure_date()
    })
    .to_string();
    let outcome = world.block_on(service.process_webhook(body.as_bytes(), None));
    world
        .webhook_error
        .set(outcome.expect_err("unsigned webhook must be rejected"));
}

#[then("the stored LH001 is delayed by 15 minutes")]
fn the_stored_lh001_is_delayed(world: &FlightSyncWorld) {
    let result = world.last_result.get().expect("a sync should have run");
    let flight = result.flight.expect("synced flight");
    assert!(result.success);
    assert!(!result.from_cache);
    assert_eq!(flight.status, FlightStatus::Delayed);
    assert_eq!(flight.delay_minutes, 15);
}

#[then("exactly one FLIGHT_DELAYED notification records the delay change")]
fn exactly_one_delay_notification(world: &FlightSyncWorld) {
    let subscriber = world.subscriber.get().expect("subscriber should be set");
    let payloads = subscriber.payloads();
    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];
    assert_eq!(payload.event_type, SyncEventType::FlightDelayed);
    let change = payload
        .changes
        .get("delayMinutes")
        .expect("delayMinutes change");
    assert_eq!(change.old, json!(0));
    assert_eq!(change.new, json!(15));
}

#[then("the last sync fails with CIRCUIT_BREAKER_OPEN")]
fn the_last_sync_fails_with_breaker_open(world: &FlightSyncWorld) {
    let result = world.last_result.get().expect("a sync should have run");
    assert!(!result.success);
    let error = result.error.expect("failure carries an error");
    assert_eq!(error.code(), ErrorCode::CircuitBreakerOpen);
    assert!(error.retry_after().is_some());
}

#[then("Lufthansa was called 5 times")]
fn lufthansa_was_called_five_times(world: &FlightSyncWorld) {
    let lufthansa = world.lufthansa.get().expect("adapter should be set");
    assert_eq!(lufthansa.calls(), 5);
}

#[then("Lufthansa was called 0 times")]
fn lufthansa_was_never_called(world: &FlightSyncWorld) {
    let lufthansa = world.lufthansa.get().expect("adapter should be set");
    assert_eq!(lufthansa.calls(), 0);
}

#[then("the webhook is rejected with WEBHOOK_VERIFICATION_FAILED")]
fn the_webhook_is_rejected(world: &FlightSyncWorld) {
    let error = world.webhook_error.get().expect("webhook should have run");
    assert_eq!(error.code(), ErrorCode::WebhookVerificationFailed);
}

#[scenario(
    path = "tests/features/flight_sync.feature",
    name = "An upstream delay updates the stored flight and notifies subscribers"
)]
fn upstream_delay_notifies_subscribers(world: FlightSyncWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/flight_sync.feature",
    name = "Repeated upstream failures open the circuit breaker"
)]
fn repeated_failures_open_the_breaker(world: FlightSyncWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/flight_sync.feature",
    name = "An unsigned webhook never touches flight state"
)]
fn unsigned_webhook_is_rejected(world: FlightSyncWorld) {
    drop(world);
}
