//! Subscriber capability notified when a synced flight changes.
//!
//! Subscribers run inside the triggering sync call. A failing subscriber is
//! logged and skipped; it never aborts the sync or its siblings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::define_port_error;
use crate::domain::FlightIdentity;

define_port_error! {
    /// Errors a subscriber may report back to the dispatcher.
    pub enum SyncSubscriberError {
        /// The downstream consumer is gone or rejected the payload.
        Delivery { message: String } => "sync notification delivery failed: {message}",
    }
}

/// Kind of change carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncEventType {
    FlightCancelled,
    FlightDelayed,
    GateChanged,
    StatusChanged,
}

/// Before/after values of one monitored field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Notification emitted after a persisted flight changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncWebhookPayload {
    pub event_id: Uuid,
    pub event_type: SyncEventType,
    /// Synthetic id of the updated row.
    pub flight_id: Uuid,
    pub flight: FlightIdentity,
    /// Changed monitored fields keyed by camelCase field name.
    pub changes: BTreeMap<String, FieldChange>,
    pub data_source: String,
    pub timestamp: DateTime<Utc>,
}

/// Single-method capability for receiving change notifications.
#[cfg_attr(test, mockall::automock)]
pub trait SyncSubscriber: Send + Sync {
    /// Handle one notification.
    ///
    /// ```rust
    /// use flight_sync::domain::ports::{SyncSubscriber, SyncSubscriberError, SyncWebhookPayload};
    ///
    /// struct Discard;
    ///
    /// impl SyncSubscriber for Discard {
    ///     fn notify(&self, _payload: &SyncWebhookPayload) -> Result<(), SyncSubscriberError> {
    ///         Ok(())
    ///     }
    /// }
    /// ```
    fn notify(&self, payload: &SyncWebhookPayload) -> Result<(), SyncSubscriberError>;
}
