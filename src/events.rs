//! Domain events emitted for subscribers outside the dispatcher.
//!
//! Events travel over a `tokio::sync::broadcast` channel wrapped in an
//! [`EventEnvelope`]. Publishing never blocks and never fails: with no
//! subscribers the event is simply dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A plain (non-command) text message
    Message {
        chat_id: i64,
        text: String,
        user_id: i64,
        username: Option<String>,
    },
    /// An inline keyboard tap, already acknowledged
    Callback {
        chat_id: i64,
        data: String,
        user_id: i64,
    },
    AuditRequest {
        chat_id: i64,
        contract_address: String,
    },
    StatsRequest {
        chat_id: i64,
        user_id: i64,
    },
    /// Handling an update failed; the failure was not returned to the webhook caller
    Error { cause: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    /// Update that triggered the event. Redelivered updates repeat it.
    pub update_id: i64,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(update_id: i64, event: DomainEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            update_id,
            emitted_at: Utc::now(),
            event,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, update_id: i64, event: DomainEvent) -> usize {
        self.tx
            .send(EventEnvelope::new(update_id, event))
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }
}

/// Log every event until the bus is closed.
pub async fn log_events(mut rx: broadcast::Receiver<EventEnvelope>) {
    loop {
        match rx.recv().await {
            Ok(envelope) => match serde_json::to_string(&envelope) {
                Ok(json) => info!(target: "auditbot::events", "{}", json),
                Err(e) => warn!("Failed to serialize event {}: {}", envelope.id, e),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event logger lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(1, DomainEvent::Error { cause: "x".into() }), 0);
    }

    #[test]
    fn test_fan_out_to_all_subscribers() {
        let bus = EventBus::new(4);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let event = DomainEvent::StatsRequest {
            chat_id: 1,
            user_id: 2,
        };
        assert_eq!(bus.publish(7, event.clone()), 2);

        let got_a = a.try_recv().unwrap();
        let got_b = b.try_recv().unwrap();
        assert_eq!(got_a.event, event);
        assert_eq!(got_a.update_id, 7);
        assert_eq!(got_a.id, got_b.id);
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = EventEnvelope::new(
            3,
            DomainEvent::AuditRequest {
                chat_id: 10,
                contract_address: "0xABC".to_string(),
            },
        );
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["event"], json!("audit_request"));
        assert_eq!(value["chat_id"], json!(10));
        assert_eq!(value["contract_address"], json!("0xABC"));
        assert_eq!(value["update_id"], json!(3));
        assert!(value["id"].is_string());
        assert!(value["emitted_at"].is_string());
    }

    #[tokio::test]
    async fn test_log_events_stops_when_bus_dropped() {
        let bus = EventBus::new(4);
        let rx = bus.subscribe();
        let handle = tokio::spawn(log_events(rx));

        bus.publish(1, DomainEvent::Error { cause: "boom".into() });
        drop(bus);

        handle.await.unwrap();
    }
}
