//! Process-local flight store keyed by identity triple.
//!
//! Rows live behind a Tokio `RwLock`; reads run concurrently and each write
//! is atomic with respect to other writers. Listings come back sorted by
//! scheduled departure so callers see a stable order.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::ports::{
    FlightRecordRepository, FlightRecordRepositoryError, SyncCandidateQuery,
};
use crate::domain::{FlightIdentity, FlightRecord};

/// In-memory [`FlightRecordRepository`] used by the default server wiring
/// and by tests.
#[derive(Debug, Default)]
pub struct InMemoryFlightRecordRepository {
    rows: RwLock<HashMap<FlightIdentity, FlightRecord>>,
}

impl InMemoryFlightRecordRepository {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `records`; later duplicates win.
    pub fn with_records(records: impl IntoIterator<Item = FlightRecord>) -> Self {
        let rows = records
            .into_iter()
            .map(|record| (record.identity(), record))
            .collect();
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Every stored row ordered by departure then flight number.
    pub async fn all(&self) -> Vec<FlightRecord> {
        let mut records: Vec<FlightRecord> = self.rows.read().await.values().cloned().collect();
        sort_records(&mut records);
        records
    }
}

#[async_trait]
impl FlightRecordRepository for InMemoryFlightRecordRepository {
    async fn find_by_identity(
        &self,
        identity: &FlightIdentity,
    ) -> Result<Option<FlightRecord>, FlightRecordRepositoryError> {
        Ok(self.rows.read().await.get(identity).cloned())
    }

    async fn find_by_flight_on_date(
        &self,
        flight_number: &str,
        airline_code: &str,
        date: NaiveDate,
    ) -> Result<Option<FlightRecord>, FlightRecordRepositoryError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|record| {
                record.flight_number.eq_ignore_ascii_case(flight_number)
                    && record.airline_code.eq_ignore_ascii_case(airline_code)
                    && record.scheduled_departure.date_naive() == date
            })
            .min_by_key(|record| record.scheduled_departure)
            .cloned())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<FlightRecord>, FlightRecordRepositoryError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn upsert(
        &self,
        record: &FlightRecord,
    ) -> Result<FlightRecord, FlightRecordRepositoryError> {
        let mut rows = self.rows.write().await;
        let mut stored = record.clone();
        if let Some(existing) = rows.get(&record.identity()) {
            stored.id = existing.id;
        }
        rows.insert(stored.identity(), stored.clone());
        Ok(stored)
    }

    async fn find_sync_candidates(
        &self,
        query: &SyncCandidateQuery,
    ) -> Result<Vec<FlightRecord>, FlightRecordRepositoryError> {
        let mut records: Vec<FlightRecord> = self
            .rows
            .read()
            .await
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        sort_records(&mut records);
        Ok(records)
    }

    async fn count(&self) -> Result<usize, FlightRecordRepositoryError> {
        Ok(self.rows.read().await.len())
    }
}

fn sort_records(records: &mut [FlightRecord]) {
    records.sort_by(|left, right| {
        left.scheduled_departure
            .cmp(&right.scheduled_departure)
            .then_with(|| left.airline_code.cmp(&right.airline_code))
            .then_with(|| left.flight_number.cmp(&right.flight_number))
    });
}
