//! Flight entities shared by the synchronization engine and its adapters.
//!
//! A [`FlightRecord`] is matched to upstream data strictly by its
//! [`FlightIdentity`] triple. The synthetic `id` only serves external lookups
//! and is never used to reconcile an adapter payload with a stored row.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Error;

/// Operational status reported for a flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    /// Operating to schedule.
    Scheduled,
    /// Departure pushed back.
    Delayed,
    /// Will not operate.
    Cancelled,
    /// Left the gate.
    Departed,
    /// Airborne.
    InFlight,
    /// Arrived at the destination.
    Landed,
    /// Arrived somewhere other than the destination.
    Diverted,
    /// Departure gate was reassigned.
    GateChanged,
}

impl FlightStatus {
    /// Wire name of the status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Delayed => "DELAYED",
            Self::Cancelled => "CANCELLED",
            Self::Departed => "DEPARTED",
            Self::InFlight => "IN_FLIGHT",
            Self::Landed => "LANDED",
            Self::Diverted => "DIVERTED",
            Self::GateChanged => "GATE_CHANGED",
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when an upstream status string has no [`FlightStatus`] equivalent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown flight status: {0}")]
pub struct UnknownFlightStatus(pub String);

impl FromStr for FlightStatus {
    type Err = UnknownFlightStatus;

    /// Parse case-insensitively, treating `-` and spaces like `_`.
    ///
    /// # Examples
    /// ```
    /// use flight_sync::domain::FlightStatus;
    ///
    /// assert_eq!("in-flight".parse::<FlightStatus>(), Ok(FlightStatus::InFlight));
    /// assert!("boarding".parse::<FlightStatus>().is_err());
    /// ```
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "SCHEDULED" => Ok(Self::Scheduled),
            "DELAYED" => Ok(Self::Delayed),
            "CANCELLED" | "CANCELED" => Ok(Self::Cancelled),
            "DEPARTED" => Ok(Self::Departed),
            "IN_FLIGHT" | "AIRBORNE" => Ok(Self::InFlight),
            "LANDED" | "ARRIVED" => Ok(Self::Landed),
            "DIVERTED" => Ok(Self::Diverted),
            "GATE_CHANGED" => Ok(Self::GateChanged),
            _ => Err(UnknownFlightStatus(value.to_owned())),
        }
    }
}

/// Reconciliation state of a stored flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Stored values reflect the last trusted upstream snapshot.
    ExactMatch,
    /// Sources disagree and an operator must decide.
    Conflict,
    /// Never confirmed by an upstream source.
    Unverified,
    /// An operator overrode the upstream value.
    ManualOverride,
}

/// Matching key for flights: number, carrier, and scheduled departure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlightIdentity {
    /// Marketing flight number, e.g. `LH001`.
    pub flight_number: String,
    /// IATA airline code, e.g. `LH`.
    pub airline_code: String,
    /// Scheduled departure instant.
    pub scheduled_departure: DateTime<Utc>,
}

impl FlightIdentity {
    /// Build an identity triple.
    pub fn new(
        flight_number: impl Into<String>,
        airline_code: impl Into<String>,
        scheduled_departure: DateTime<Utc>,
    ) -> Self {
        Self {
            flight_number: flight_number.into(),
            airline_code: airline_code.into(),
            scheduled_departure,
        }
    }

    /// Calendar date (UTC) used to address upstream sources and the cache.
    pub fn departure_date(&self) -> NaiveDate {
        self.scheduled_departure.date_naive()
    }
}

/// Normalized, source-agnostic flight snapshot produced by every adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AirlineFlightData {
    pub flight_number: String,
    pub airline_code: String,
    pub origin: String,
    pub destination: String,
    pub scheduled_departure: DateTime<Utc>,
    #[serde(default)]
    pub scheduled_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_arrival: Option<DateTime<Utc>>,
    pub status: FlightStatus,
    #[serde(default)]
    pub delay_minutes: u32,
    #[serde(default)]
    pub gate: Option<String>,
    #[serde(default)]
    pub terminal: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub seats_available: Option<u32>,
    #[serde(default)]
    pub price_cents: Option<u64>,
    #[serde(default)]
    pub price_currency: Option<String>,
    /// Name of the adapter that produced this snapshot.
    pub source: String,
    /// Upstream payload kept for debugging.
    #[serde(default)]
    pub raw: Value,
}

impl AirlineFlightData {
    /// Identity triple of this snapshot.
    pub fn identity(&self) -> FlightIdentity {
        FlightIdentity::new(
            self.flight_number.clone(),
            self.airline_code.clone(),
            self.scheduled_departure,
        )
    }
}

/// Partial status view returned by `fetch_flight_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlightStatusUpdate {
    pub status: FlightStatus,
    #[serde(default)]
    pub delay_minutes: u32,
    #[serde(default)]
    pub gate: Option<String>,
    #[serde(default)]
    pub terminal: Option<String>,
    #[serde(default)]
    pub estimated_departure: Option<DateTime<Utc>>,
}

/// Search filters accepted by `fetch_flights`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearchFilters {
    pub airline_code: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Persisted flight row owned by the synchronization engine.
///
/// ## Invariants
/// - `last_synced_at` never moves backwards.
/// - `sync_attempts` only increments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecord {
    pub id: Uuid,
    pub flight_number: String,
    pub airline_code: String,
    pub origin: String,
    pub destination: String,
    pub scheduled_departure: DateTime<Utc>,
    pub scheduled_arrival: Option<DateTime<Utc>>,
    pub estimated_departure: Option<DateTime<Utc>>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub status: FlightStatus,
    pub delay_minutes: u32,
    pub gate: Option<String>,
    pub terminal: Option<String>,
    pub cancellation_reason: Option<String>,
    pub seats_available: Option<u32>,
    pub price_cents: Option<u64>,
    pub price_currency: Option<String>,
    /// Adapter name that last wrote this row.
    pub data_source: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    pub sync_attempts: u32,
    pub last_sync_error: Option<String>,
    /// Conflicts retained for manual review.
    pub conflict_data: Option<Value>,
    pub raw_data: Option<Value>,
}

impl FlightRecord {
    /// Create an unverified record from an adapter snapshot.
    pub fn from_airline_data(id: Uuid, data: &AirlineFlightData) -> Self {
        let mut record = Self {
            id,
            flight_number: data.flight_number.clone(),
            airline_code: data.airline_code.clone(),
            origin: String::new(),
            destination: String::new(),
            scheduled_departure: data.scheduled_departure,
            scheduled_arrival: None,
            estimated_departure: None,
            estimated_arrival: None,
            actual_departure: None,
            actual_arrival: None,
            status: data.status,
            delay_minutes: 0,
            gate: None,
            terminal: None,
            cancellation_reason: None,
            seats_available: None,
            price_cents: None,
            price_currency: None,
            data_source: data.source.clone(),
            last_synced_at: None,
            sync_status: SyncStatus::Unverified,
            sync_attempts: 0,
            last_sync_error: None,
            conflict_data: None,
            raw_data: None,
        };
        record.apply_airline_data(data);
        record
    }

    /// Identity triple of this record.
    pub fn identity(&self) -> FlightIdentity {
        FlightIdentity::new(
            self.flight_number.clone(),
            self.airline_code.clone(),
            self.scheduled_departure,
        )
    }

    /// Overwrite route, operational, and capacity fields from a snapshot.
    ///
    /// Sync metadata other than `data_source` and `raw_data` is left to the
    /// caller.
    pub fn apply_airline_data(&mut self, data: &AirlineFlightData) {
        self.origin.clone_from(&data.origin);
        self.destination.clone_from(&data.destination);
        self.scheduled_arrival = data.scheduled_arrival;
        self.estimated_departure = data.estimated_departure;
        self.estimated_arrival = data.estimated_arrival;
        self.actual_departure = data.actual_departure;
        self.actual_arrival = data.actual_arrival;
        self.status = data.status;
        self.delay_minutes = data.delay_minutes;
        self.gate.clone_from(&data.gate);
        self.terminal.clone_from(&data.terminal);
        self.cancellation_reason.clone_from(&data.cancellation_reason);
        self.seats_available = data.seats_available;
        self.price_cents = data.price_cents;
        self.price_currency.clone_from(&data.price_currency);
        self.data_source.clone_from(&data.source);
        self.raw_data = Some(data.raw.clone());
    }

    /// Write a resolved value back by field.
    ///
    /// # Errors
    ///
    /// Returns [`super::ErrorCode::ConflictUnresolvable`] when `value` does
    /// not fit the field's type.
    ///
    /// # Examples
    /// ```rust,ignore
    /// use flight_sync::domain::FlightField;
    /// use serde_json::json;
    ///
    /// record.apply_field(FlightField::DelayMinutes, &json!(25))?;
    /// assert_eq!(record.delay_minutes, 25);
    /// ```
    pub fn apply_field(&mut self, field: FlightField, value: &Value) -> Result<(), Error> {
        match field {
            FlightField::Status => {
                self.status =
                    serde_json::from_value(value.clone()).map_err(|_| ill_typed(field, value))?;
            }
            FlightField::Gate => self.gate = optional_string(field, value)?,
            FlightField::Terminal => self.terminal = optional_string(field, value)?,
            FlightField::DelayMinutes => {
                self.delay_minutes = value
                    .as_u64()
                    .and_then(|minutes| u32::try_from(minutes).ok())
                    .ok_or_else(|| ill_typed(field, value))?;
            }
            FlightField::SeatsAvailable => {
                self.seats_available = optional_number(field, value)?
                    .map(|seats| u32::try_from(seats).map_err(|_| ill_typed(field, value)))
                    .transpose()?;
            }
            FlightField::PriceCents => self.price_cents = optional_number(field, value)?,
        }
        Ok(())
    }
}

fn ill_typed(field: FlightField, value: &Value) -> Error {
    Error::conflict_unresolvable(format!("value {value} is not valid for field {field}"))
}

fn optional_string(field: FlightField, value: &Value) -> Result<Option<String>, Error> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        _ => Err(ill_typed(field, value)),
    }
}

fn optional_number(field: FlightField, value: &Value) -> Result<Option<u64>, Error> {
    match value {
        Value::Null => Ok(None),
        other => other
            .as_u64()
            .map(Some)
            .ok_or_else(|| ill_typed(field, value)),
    }
}

/// Flight fields that can be compared between sources and written back.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum FlightField {
    Status,
    Gate,
    DelayMinutes,
    SeatsAvailable,
    Terminal,
    PriceCents,
}

impl FlightField {
    /// Fields whose change triggers a notification and whose disagreement
    /// between sources is a conflict.
    pub const MONITORED: [Self; 5] = [
        Self::Status,
        Self::Gate,
        Self::DelayMinutes,
        Self::SeatsAvailable,
        Self::Terminal,
    ];

    /// camelCase name used in change maps and conflict payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Gate => "gate",
            Self::DelayMinutes => "delayMinutes",
            Self::SeatsAvailable => "seatsAvailable",
            Self::Terminal => "terminal",
            Self::PriceCents => "priceCents",
        }
    }

    /// Current value of this field on a stored record.
    pub fn read_record(self, record: &FlightRecord) -> Value {
        match self {
            Self::Status => Value::from(record.status.as_str()),
            Self::Gate => record.gate.clone().into(),
            Self::DelayMinutes => record.delay_minutes.into(),
            Self::SeatsAvailable => record.seats_available.into(),
            Self::Terminal => record.terminal.clone().into(),
            Self::PriceCents => record.price_cents.into(),
        }
    }

    /// Value of this field in an adapter snapshot.
    pub fn read_data(self, data: &AirlineFlightData) -> Value {
        match self {
            Self::Status => Value::from(data.status.as_str()),
            Self::Gate => data.gate.clone().into(),
            Self::DelayMinutes => data.delay_minutes.into(),
            Self::SeatsAvailable => data.seats_available.into(),
            Self::Terminal => data.terminal.clone().into(),
            Self::PriceCents => data.price_cents.into(),
        }
    }
}

impl fmt::Display for FlightField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlightField {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "status" => Ok(Self::Status),
            "gate" => Ok(Self::Gate),
            "delayMinutes" => Ok(Self::DelayMinutes),
            "seatsAvailable" => Ok(Self::SeatsAvailable),
            "terminal" => Ok(Self::Terminal),
            "priceCents" => Ok(Self::PriceCents),
            other => Err(Error::conflict_unresolvable(format!(
                "field {other} cannot be resolved"
            ))),
        }
    }
}
