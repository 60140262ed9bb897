//! Driven port for the persisted flight store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::define_port_error;
use crate::domain::{FlightIdentity, FlightRecord, FlightStatus};

define_port_error! {
    /// Errors raised by flight persistence adapters.
    pub enum FlightRecordRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "flight persistence connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "flight persistence query failed: {message}",
    }
}

/// Selection criteria for flights due a resynchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCandidateQuery {
    /// Inclusive lower bound on scheduled departure.
    pub departs_from: DateTime<Utc>,
    /// Inclusive upper bound on scheduled departure.
    pub departs_until: DateTime<Utc>,
    /// Rows synced at or after this instant are fresh and skipped.
    pub stale_before: DateTime<Utc>,
}

impl SyncCandidateQuery {
    /// Whether `record` is due a sync under this query.
    ///
    /// Cancelled flights are never candidates.
    pub fn matches(&self, record: &FlightRecord) -> bool {
        let in_window = record.scheduled_departure >= self.departs_from
            && record.scheduled_departure <= self.departs_until;
        let stale = record
            .last_synced_at
            .is_none_or(|synced| synced < self.stale_before);
        in_window && stale && record.status != FlightStatus::Cancelled
    }
}

/// Port for reading and writing flight rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlightRecordRepository: Send + Sync {
    /// Look up a row by its identity triple.
    async fn find_by_identity(
        &self,
        identity: &FlightIdentity,
    ) -> Result<Option<FlightRecord>, FlightRecordRepositoryError>;

    /// Look up the row for `flight_number` of `airline_code` departing on
    /// `date` (UTC). Codes compare case-insensitively; when several rows
    /// share the day the earliest departure wins.
    async fn find_by_flight_on_date(
        &self,
        flight_number: &str,
        airline_code: &str,
        date: NaiveDate,
    ) -> Result<Option<FlightRecord>, FlightRecordRepositoryError>;

    /// Look up a row by synthetic id.
    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<FlightRecord>, FlightRecordRepositoryError>;

    /// Insert or replace the row keyed by `record`'s identity triple.
    ///
    /// Last write wins. The first-assigned `id` is kept when a row already
    /// exists, and the stored row is returned.
    async fn upsert(
        &self,
        record: &FlightRecord,
    ) -> Result<FlightRecord, FlightRecordRepositoryError>;

    /// Rows due a resynchronization, in no particular order.
    async fn find_sync_candidates(
        &self,
        query: &SyncCandidateQuery,
    ) -> Result<Vec<FlightRecord>, FlightRecordRepositoryError>;

    /// Number of stored rows.
    async fn count(&self) -> Result<usize, FlightRecordRepositoryError>;
}
