//! Change detection between successive snapshots of one flight.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::ports::{FieldChange, SyncEventType, SyncWebhookPayload};
use crate::domain::{FlightField, FlightRecord, FlightStatus};

/// Monitored fields that differ between `previous` and `current`.
pub fn diff_monitored(
    previous: &FlightRecord,
    current: &FlightRecord,
) -> BTreeMap<String, FieldChange> {
    FlightField::MONITORED
        .into_iter()
        .filter_map(|field| {
            let old = field.read_record(previous);
            let new = field.read_record(current);
            (old != new).then(|| (field.as_str().to_owned(), FieldChange { old, new }))
        })
        .collect()
}

/// Event type for a changed record, checked in priority order:
/// cancellation, delay, gate change, then generic status change.
pub fn classify_event(current: &FlightRecord) -> SyncEventType {
    if current.status == FlightStatus::Cancelled {
        SyncEventType::FlightCancelled
    } else if current.delay_minutes > 0 {
        SyncEventType::FlightDelayed
    } else if current.status == FlightStatus::GateChanged {
        SyncEventType::GateChanged
    } else {
        SyncEventType::StatusChanged
    }
}

/// Notification for the transition `previous` to `current`, or `None` when
/// no monitored field changed.
pub fn build_notification(
    previous: &FlightRecord,
    current: &FlightRecord,
    now: DateTime<Utc>,
) -> Option<SyncWebhookPayload> {
    let changes = diff_monitored(previous, current);
    if changes.is_empty() {
        return None;
    }

    Some(SyncWebhookPayload {
        event_id: Uuid::new_v4(),
        event_type: classify_event(current),
        flight_id: current.id,
        flight: current.identity(),
        changes,
        data_source: current.data_source.clone(),
        timestamp: now,
    })
}
