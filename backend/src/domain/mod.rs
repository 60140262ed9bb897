//! Domain primitives, ports, and services.
//!
//! Purpose: Define strongly typed flight entities and the synchronization
//! engine that keeps them current. Types are transport agnostic; inbound
//! adapters map them to HTTP and outbound adapters to infrastructure.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - Flight types (`FlightRecord`, `AirlineFlightData`, ...): stored rows and
//!   upstream snapshots.
//! - `sync`: circuit breaker, cache, adapter registry, and the
//!   `SynchronizationService`.
//! - `sync_scheduler`: periodic resynchronization of stale flights.
//! - `ports`: traits implemented by outbound adapters.

pub mod error;
pub mod flight;
pub mod ports;
pub mod sync;
pub mod sync_scheduler;

pub use self::error::{Error, ErrorCode};
pub use self::flight::{
    AirlineFlightData, FlightField, FlightIdentity, FlightRecord, FlightSearchFilters,
    FlightStatus, FlightStatusUpdate, SyncStatus, UnknownFlightStatus,
};
pub use self::sync::{SyncServicePorts, SynchronizationService};
pub use self::sync_scheduler::{SchedulerConfig, SyncScheduler};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use flight_sync::domain::{ApiResult, Error};
///
/// fn lookup() -> ApiResult<()> {
///     Err(Error::not_found("no such flight"))
/// }
/// assert!(lookup().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
