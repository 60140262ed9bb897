//! Port for per-airline upstream flight data sources.
//!
//! Adapters report "flight not found" as `Ok(None)` and reserve `Err` for
//! transport, authentication, and decoding failures. Only the latter count
//! against an adapter's circuit breaker.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::define_port_error;
use crate::domain::{AirlineFlightData, FlightSearchFilters, FlightStatusUpdate};

define_port_error! {
    /// Errors raised by airline adapters.
    pub enum AirlineAdapterError {
        /// Network failure or unexpected upstream status.
        Transport { message: String } => "airline transport failed: {message}",
        /// Upstream did not answer within the adapter's deadline.
        Timeout { message: String } => "airline request timed out: {message}",
        /// Upstream throttled the request.
        RateLimited { message: String } => "airline rate limited request: {message}",
        /// Credentials were rejected.
        Unauthorized { message: String } => "airline rejected credentials: {message}",
        /// Upstream payload could not be decoded.
        Decode { message: String } => "airline payload decode failed: {message}",
        /// Adapter is missing credentials or endpoints.
        Configuration { message: String } => "airline adapter misconfigured: {message}",
    }
}

/// Uniform access to one airline's flight data.
#[async_trait]
pub trait AirlineAdapter: Send + Sync {
    /// IATA code of the airline this adapter serves.
    fn airline_code(&self) -> &str;

    /// Human-readable adapter name, recorded as a flight's data source.
    fn name(&self) -> &str;

    /// Rank used in priority conflict resolution; lower wins.
    fn priority(&self) -> u32;

    /// Fetch one flight's full snapshot for a departure date.
    ///
    /// ```rust,ignore
    /// let data = adapter.fetch_flight_data("LH001", date).await?;
    /// assert!(data.is_none() || data.is_some());
    /// ```
    async fn fetch_flight_data(
        &self,
        flight_number: &str,
        date: NaiveDate,
    ) -> Result<Option<AirlineFlightData>, AirlineAdapterError>;

    /// List flights matching search filters.
    async fn fetch_flights(
        &self,
        filters: &FlightSearchFilters,
    ) -> Result<Vec<AirlineFlightData>, AirlineAdapterError>;

    /// Fetch the lightweight status view of one flight.
    async fn fetch_flight_status(
        &self,
        flight_number: &str,
        date: NaiveDate,
    ) -> Result<Option<FlightStatusUpdate>, AirlineAdapterError>;

    /// Probe upstream availability.
    async fn health_check(&self) -> bool;
}
