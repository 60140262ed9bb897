//! Change-notification subscribers.
//!
//! [`ChannelSyncSubscriber`] forwards every payload onto an unbounded Tokio
//! channel so an async consumer (a webhook relay, a log shipper) can drain
//! them off the sync path. [`TracingSyncSubscriber`] writes one structured
//! log line per payload.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

use crate::domain::ports::{SyncSubscriber, SyncSubscriberError, SyncWebhookPayload};

/// Subscriber that pushes payloads onto an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSyncSubscriber {
    sender: UnboundedSender<SyncWebhookPayload>,
}

impl ChannelSyncSubscriber {
    /// Create a subscriber together with the receiving end.
    pub fn channel() -> (Self, UnboundedReceiver<SyncWebhookPayload>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl SyncSubscriber for ChannelSyncSubscriber {
    fn notify(&self, payload: &SyncWebhookPayload) -> Result<(), SyncSubscriberError> {
        self.sender
            .send(payload.clone())
            .map_err(|_| SyncSubscriberError::delivery("notification receiver dropped"))
    }
}

/// Subscriber that logs each payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSyncSubscriber;

impl SyncSubscriber for TracingSyncSubscriber {
    fn notify(&self, payload: &SyncWebhookPayload) -> Result<(), SyncSubscriberError> {
        let fields: Vec<&str> = payload.changes.keys().map(String::as_str).collect();
        info!(
            event_id = %payload.event_id,
            event_type = ?payload.event_type,
            flight_id = %payload.flight_id,
            flight = %payload.flight.flight_number,
            source = %payload.data_source,
            changed = ?fields,
            "flight changed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::Utc;
    use rstest::rstest;
    use serde_json::json;
    use uuid::Uuid;

    use crate::domain::FlightIdentity;
    use crate::domain::ports::{FieldChange, SyncEventType};
    use crate::test_support::departure;

    fn payload() -> SyncWebhookPayload {
        SyncWebhookPayload {
            event_id: Uuid::new_v4(),
            event_type: SyncEventType::GateChanged,
            flight_id: Uuid::new_v4(),
            flight: FlightIdentity::new("LH001", "LH", departure()),
            changes: BTreeMap::from([(
                "gate".to_owned(),
                FieldChange {
                    old: json!("A12"),
                    new: json!("B7"),
                },
            )]),
            data_source: "Lufthansa".to_owned(),
            timestamp: Utc::now(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn channel_subscriber_forwards_payloads() {
        let (subscriber, mut receiver) = ChannelSyncSubscriber::channel();
        let sent = payload();

        subscriber.notify(&sent).expect("delivered");

        assert_eq!(receiver.recv().await, Some(sent));
    }

    #[rstest]
    fn channel_subscriber_reports_dropped_receiver() {
        let (subscriber, receiver) = ChannelSyncSubscriber::channel();
        drop(receiver);

        let error = subscriber.notify(&payload()).expect_err("receiver gone");
        assert!(matches!(error, SyncSubscriberError::Delivery { .. }));
    }

    #[rstest]
    fn tracing_subscriber_never_fails() {
        assert!(TracingSyncSubscriber.notify(&payload()).is_ok());
    }
}
