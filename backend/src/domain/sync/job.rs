//! Batch run records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::ErrorCode;

/// What started a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncJobType {
    /// A scheduler tick or forced scheduler run.
    Scheduled,
    /// An operator-submitted batch.
    Batch,
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Per-flight failure captured in a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncError {
    pub flight_number: String,
    pub airline_code: String,
    pub code: ErrorCode,
    pub message: String,
}

/// One batch run. Only the most recent job is retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    pub id: Uuid,
    pub job_type: SyncJobType,
    pub status: SyncJobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub flights_processed: usize,
    pub flights_updated: usize,
    pub errors: Vec<SyncError>,
}

impl SyncJob {
    /// A job created at `now` that has not started.
    pub fn pending(job_type: SyncJobType, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type,
            status: SyncJobStatus::Pending,
            started_at: now,
            completed_at: None,
            flights_processed: 0,
            flights_updated: 0,
            errors: Vec::new(),
        }
    }

    /// Mark the job running from `now`.
    #[must_use]
    pub fn start(mut self, now: DateTime<Utc>) -> Self {
        self.status = SyncJobStatus::Running;
        self.started_at = now;
        self
    }

    /// Finalize with counts; per-flight failures do not fail the job.
    pub fn complete(
        &mut self,
        now: DateTime<Utc>,
        processed: usize,
        updated: usize,
        errors: Vec<SyncError>,
    ) {
        self.status = SyncJobStatus::Completed;
        self.completed_at = Some(now);
        self.flights_processed = processed;
        self.flights_updated = updated;
        self.errors = errors;
    }

    /// Finalize as failed before any flight was processed.
    pub fn fail(&mut self, now: DateTime<Utc>, error: SyncError) {
        self.status = SyncJobStatus::Failed;
        self.completed_at = Some(now);
        self.errors.push(error);
    }
}
