//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, web};
use chrono::TimeDelta;

use crate::domain::ports::NoOpSyncMetrics;
use crate::domain::sync::{
    AdapterRegistry, ConflictResolutionMode, SyncServiceConfig, SyncServicePorts,
};
use crate::domain::{SchedulerConfig, SyncScheduler, SynchronizationService};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::{json_config, sync_scope};
use crate::outbound::memory::InMemoryFlightRecordRepository;
use crate::test_support::{MutableClock, ScriptedAirlineAdapter, departure, flight_data};

/// Shared secret configured for webhook tests.
pub const WEBHOOK_SECRET: &str = "topsecret";

/// Handler state over scripted Lufthansa (`LH`, priority 1) and aggregator
/// (`XA`, priority 5) adapters, both reporting LH flights.
pub struct TestContext {
    pub state: HttpState,
    pub clock: Arc<MutableClock>,
    pub lufthansa: Arc<ScriptedAirlineAdapter>,
    pub aggregator: Arc<ScriptedAirlineAdapter>,
    pub repository: Arc<InMemoryFlightRecordRepository>,
}

impl TestContext {
    pub fn new(config: SyncServiceConfig) -> Self {
        let clock = Arc::new(MutableClock::new(departure() - TimeDelta::hours(6)));
        let lufthansa = Arc::new(
            ScriptedAirlineAdapter::new("LH", "Lufthansa", 1)
                .returning(flight_data("LH001", "LH", "Lufthansa")),
        );
        let aggregator = Arc::new(
            ScriptedAirlineAdapter::new("XA", "Aggregator", 5)
                .returning(flight_data("LH001", "LH", "Aggregator")),
        );
        let mut registry = AdapterRegistry::new(clock.clone(), config.breaker);
        registry.register(lufthansa.clone());
        registry.register(aggregator.clone());

        let repository = Arc::new(InMemoryFlightRecordRepository::new());
        let sync = Arc::new(SynchronizationService::new(
            SyncServicePorts::new(registry, repository.clone(), Arc::new(NoOpSyncMetrics)),
            clock.clone(),
            config,
        ));
        let scheduler = SyncScheduler::new(
            sync.clone(),
            repository.clone(),
            clock.clone(),
            SchedulerConfig::default(),
        );

        Self {
            state: HttpState::new(sync, scheduler),
            clock,
            lufthansa,
            aggregator,
            repository,
        }
    }

    /// Context whose service resolves conflicts with `mode` and verifies
    /// webhooks against [`WEBHOOK_SECRET`].
    pub fn with_mode(mode: ConflictResolutionMode) -> Self {
        Self::new(SyncServiceConfig {
            conflict_resolution_mode: mode,
            webhook_secret: Some(WEBHOOK_SECRET.to_owned()),
            ..SyncServiceConfig::default()
        })
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::with_mode(ConflictResolutionMode::Priority)
    }
}

/// App exposing every sync route over `state`.
pub fn test_app(
    state: HttpState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(state))
        .app_data(json_config())
        .service(sync_scope())
}
