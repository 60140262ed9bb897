//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod airline_adapter;
mod flight_record_repository;
mod sync_metrics;
mod sync_subscriber;

pub use airline_adapter::{AirlineAdapter, AirlineAdapterError};
#[cfg(test)]
pub use flight_record_repository::MockFlightRecordRepository;
pub use flight_record_repository::{
    FlightRecordRepository, FlightRecordRepositoryError, SyncCandidateQuery,
};
#[cfg(test)]
pub use sync_metrics::MockSyncMetrics;
pub use sync_metrics::{
    NoOpSyncMetrics, SyncFailureKind, SyncMetrics, SyncMetricsError, SyncMetricsEvent,
};
#[cfg(test)]
pub use sync_subscriber::MockSyncSubscriber;
pub use sync_subscriber::{
    FieldChange, SyncEventType, SyncSubscriber, SyncSubscriberError, SyncWebhookPayload,
};
