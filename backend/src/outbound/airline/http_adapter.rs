//! Reqwest-backed airline adapter.
//!
//! This adapter owns transport details only: URL construction, credentials,
//! timeout and HTTP error mapping, and JSON decoding into domain snapshots.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::dto::{FlightDto, FlightListDto, FlightStatusDto};
use crate::domain::ports::{AirlineAdapter, AirlineAdapterError};
use crate::domain::{AirlineFlightData, FlightSearchFilters, FlightStatusUpdate};

const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PRIORITY: u32 = 10;
const USER_AGENT: &str = "flight-sync/0.1";

/// Catalogue entry describing one airline API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpAirlineSettings {
    pub airline_code: String,
    pub name: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Airline adapter that performs authenticated HTTP GETs against one API.
pub struct HttpAirlineAdapter {
    client: Client,
    base_url: Url,
    api_key: String,
    airline_code: String,
    name: String,
    priority: u32,
}

impl HttpAirlineAdapter {
    /// Build an adapter from a catalogue entry.
    ///
    /// ```rust,ignore
    /// let adapter = HttpAirlineAdapter::new(settings)?;
    /// assert_eq!(adapter.airline_code(), "LH");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`AirlineAdapterError::Configuration`] when the API key is
    /// missing or blank, the base URL is invalid, or the client cannot be
    /// built.
    pub fn new(settings: HttpAirlineSettings) -> Result<Self, AirlineAdapterError> {
        let api_key = settings
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AirlineAdapterError::configuration(format!(
                    "{} adapter requires an API key",
                    settings.name
                ))
            })?;
        let base_url = Url::parse(&settings.base_url).map_err(|error| {
            AirlineAdapterError::configuration(format!(
                "invalid base URL {}: {error}",
                settings.base_url
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AirlineAdapterError::configuration(format!(
                "base URL {} cannot carry paths",
                settings.base_url
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms.max(1)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|error| AirlineAdapterError::configuration(error.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            airline_code: settings.airline_code.trim().to_ascii_uppercase(),
            name: settings.name,
            priority: settings.priority,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AirlineAdapterError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AirlineAdapterError::configuration("base URL cannot carry paths"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET `url`; `Ok(None)` for 404, the body bytes for 2xx.
    async fn get(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Option<Vec<u8>>, AirlineAdapterError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(Some(body.to_vec()))
    }
}

#[async_trait]
impl AirlineAdapter for HttpAirlineAdapter {
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
        date: NaiveDate,
    ) -> Result<Option<AirlineFlightData>, AirlineAdapterError> {
        let url = self.endpoint(&["flights", flight_number])?;
        let Some(body) = self.get(url, &[("date", date.to_string())]).await? else {
            return Ok(None);
        };
        parse_flight(&body, &self.airline_code, &self.name).map(Some)
    }

    async fn fetch_flights(
        &self,
        filters: &FlightSearchFilters,
    ) -> Result<Vec<AirlineFlightData>, AirlineAdapterError> {
        let url = self.endpoint(&["flights"])?;
        let query = search_query(filters);
        match self.get(url, &query).await? {
            Some(body) => parse_flight_list(&body, &self.airline_code, &self.name),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_flight_status(
        &self,
        flight_number: &str,
        date: NaiveDate,
    ) -> Result<Option<FlightStatusUpdate>, AirlineAdapterError> {
        let url = self.endpoint(&["flights", flight_number, "status"])?;
        let Some(body) = self.get(url, &[("date", date.to_string())]).await? else {
            return Ok(None);
        };
        parse_status(&body).map(Some)
    }

    async fn health_check(&self) -> bool {
        let url = match self.endpoint(&["health"]) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.get(url, &[]).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(error) => {
                debug!(adapter = %self.name, error = %error, "airline health check failed");
                false
            }
        }
    }
}

fn search_query(filters: &FlightSearchFilters) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(airline_code) = &filters.airline_code {
        query.push(("airlineCode", airline_code.clone()));
    }
    if let Some(origin) = &filters.origin {
        query.push(("origin", origin.clone()));
    }
    if let Some(destination) = &filters.destination {
        query.push(("destination", destination.clone()));
    }
    if let Some(date) = filters.departure_date {
        query.push(("date", date.to_string()));
    }
    if let Some(limit) = filters.limit {
        query.push(("limit", limit.to_string()));
    }
    query
}

fn decode_error(error: impl std::fmt::Display) -> AirlineAdapterError {
    AirlineAdapterError::decode(format!("invalid airline JSON payload: {error}"))
}

fn flight_from_value(
    raw: Value,
    airline_code: &str,
    source: &str,
) -> Result<AirlineFlightData, AirlineAdapterError> {
    let dto: FlightDto = serde_json::from_value(raw.clone()).map_err(decode_error)?;
    dto.into_domain(airline_code, source, raw)
        .map_err(AirlineAdapterError::decode)
}

fn parse_flight(
    body: &[u8],
    airline_code: &str,
    source: &str,
) -> Result<AirlineFlightData, AirlineAdapterError> {
    let raw: Value = serde_json::from_slice(body).map_err(decode_error)?;
    flight_from_value(raw, airline_code, source)
}

fn parse_flight_list(
    body: &[u8],
    airline_code: &str,
    source: &str,
) -> Result<Vec<AirlineFlightData>, AirlineAdapterError> {
    let raw: Value = serde_json::from_slice(body).map_err(decode_error)?;
    let items = match raw {
        Value::Array(items) => items,
        other => {
            let list: FlightListDto = serde_json::from_value(other).map_err(decode_error)?;
            list.flights
        }
    };
    items
        .into_iter()
        .map(|item| flight_from_value(item, airline_code, source))
        .collect()
}

fn parse_status(body: &[u8]) -> Result<FlightStatusUpdate, AirlineAdapterError> {
    let dto: FlightStatusDto = serde_json::from_slice(body).map_err(decode_error)?;
    dto.into_domain().map_err(AirlineAdapterError::decode)
}

fn map_transport_error(error: reqwest::Error) -> AirlineAdapterError {
    if error.is_timeout() {
        AirlineAdapterError::timeout(error.to_string())
    } else {
        AirlineAdapterError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> AirlineAdapterError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AirlineAdapterError::unauthorized(message)
        }
        StatusCode::TOO_MANY_REQUESTS => AirlineAdapterError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            AirlineAdapterError::timeout(message)
        }
        _ => AirlineAdapterError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
