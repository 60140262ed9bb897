//! DTOs for decoding airline flight API responses.
//!
//! Bodies are decoded into a `serde_json::Value` first so the untouched
//! payload can be kept as `raw`, then into these DTOs, then mapped into
//! domain snapshots in one pass.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{AirlineFlightData, FlightStatus, FlightStatusUpdate};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FlightDto {
    pub(super) flight_number: String,
    #[serde(default)]
    pub(super) airline_code: Option<String>,
    pub(super) origin: String,
    pub(super) destination: String,
    pub(super) scheduled_departure: DateTime<Utc>,
    #[serde(default)]
    pub(super) scheduled_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) estimated_departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) estimated_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) actual_departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) actual_arrival: Option<DateTime<Utc>>,
    pub(super) status: String,
    #[serde(default)]
    pub(super) delay_minutes: Option<u32>,
    #[serde(default)]
    pub(super) gate: Option<String>,
    #[serde(default)]
    pub(super) terminal: Option<String>,
    #[serde(default)]
    pub(super) cancellation_reason: Option<String>,
    #[serde(default)]
    pub(super) seats_available: Option<u32>,
    #[serde(default)]
    pub(super) price: Option<PriceDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PriceDto {
    pub(super) amount_cents: u64,
    pub(super) currency: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct FlightListDto {
    #[serde(default)]
    pub(super) flights: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FlightStatusDto {
    pub(super) status: String,
    #[serde(default)]
    pub(super) delay_minutes: Option<u32>,
    #[serde(default)]
    pub(super) gate: Option<String>,
    #[serde(default)]
    pub(super) terminal: Option<String>,
    #[serde(default)]
    pub(super) estimated_departure: Option<DateTime<Utc>>,
}

fn parse_status(raw: &str) -> Result<FlightStatus, String> {
    raw.parse::<FlightStatus>().map_err(|error| error.to_string())
}

/// Blank gate and terminal strings mean "unassigned".
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

impl FlightDto {
    pub(super) fn into_domain(
        self,
        airline_code: &str,
        source: &str,
        raw: Value,
    ) -> Result<AirlineFlightData, String> {
        let status = parse_status(&self.status)?;
        let (price_cents, price_currency) = match self.price {
            Some(price) => (Some(price.amount_cents), Some(price.currency)),
            None => (None, None),
        };

        Ok(AirlineFlightData {
            flight_number: self.flight_number,
            airline_code: self
                .airline_code
                .unwrap_or_else(|| airline_code.to_owned())
                .to_ascii_uppercase(),
            origin: self.origin,
            destination: self.destination,
            scheduled_departure: self.scheduled_departure,
            scheduled_arrival: self.scheduled_arrival,
            estimated_departure: self.estimated_departure,
            estimated_arrival: self.estimated_arrival,
            actual_departure: self.actual_departure,
            actual_arrival: self.actual_arrival,
            status,
            delay_minutes: self.delay_minutes.unwrap_or_default(),
            gate: non_blank(self.gate),
            terminal: non_blank(self.terminal),
            cancellation_reason: self.cancellation_reason,
            seats_available: self.seats_available,
            price_cents,
            price_currency,
            source: source.to_owned(),
            raw,
        })
    }
}

impl FlightStatusDto {
    pub(super) fn into_domain(self) -> Result<FlightStatusUpdate, String> {
        Ok(FlightStatusUpdate {
            status: parse_status(&self.status)?,
            delay_minutes: self.delay_minutes.unwrap_or_default(),
            gate: non_blank(self.gate),
            terminal: non_blank(self.terminal),
            estimated_departure: self.estimated_departure,
        })
    }
}
