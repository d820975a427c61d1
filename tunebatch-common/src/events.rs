//! Event types for the tunebatch progress system
//!
//! Progress events are fire-and-forget notifications broadcast over a
//! `tokio::sync::broadcast` channel. A pipeline run emits them at stage
//! boundaries; observers subscribe through [`EventBus::subscribe`] and may
//! disappear at any time without affecting the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pipeline event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Validation progress update
    ValidationProgress {
        batch_id: Uuid,
        current: usize,
        total: usize,
        status: String,
        current_url: String,
        is_complete: bool,
        timestamp: DateTime<Utc>,
    },

    /// Acquisition progress update
    AcquisitionProgress {
        batch_id: Uuid,
        current: usize,
        total: usize,
        status: String,
        current_url: String,
        is_complete: bool,
        timestamp: DateTime<Utc>,
    },

    /// Batch run finished; a BatchReport is available to the caller
    BatchCompleted {
        batch_id: Uuid,
        successful: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Event type name as it appears in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::ValidationProgress { .. } => "ValidationProgress",
            PipelineEvent::AcquisitionProgress { .. } => "AcquisitionProgress",
            PipelineEvent::BatchCompleted { .. } => "BatchCompleted",
        }
    }
}

/// Broadcast bus for pipeline events
///
/// Emission never blocks and never fails the emitter: an event with no
/// receivers is simply dropped. The bus owns only the sender half; each
/// subscription owns its receiver and detaches by being dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers
    ///
    /// Returns the number of receivers the event reached. Zero receivers is
    /// not an error; progress is droppable by contract.
    pub fn emit(&self, event: PipelineEvent) -> usize {
        match self.tx.send(event) {
            Ok(receiver_count) => receiver_count,
            Err(_) => {
                tracing::debug!("no receivers for pipeline event");
                0
            }
        }
    }

    /// Subscribe to pipeline events
    ///
    /// The returned handle is the observer's cancellation token: dropping it
    /// detaches the observer from the bus.
    pub fn subscribe(&self) -> ProgressSubscription {
        ProgressSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of currently attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// A live subscription to pipeline events
///
/// Wraps the broadcast receiver so callers depend on a typed handle rather
/// than a transport. Slow observers that fall behind the channel capacity
/// skip the overwritten events and keep receiving newer ones.
pub struct ProgressSubscription {
    rx: broadcast::Receiver<PipelineEvent>,
}

impl ProgressSubscription {
    /// Receive the next event, skipping any the observer was too slow for
    ///
    /// Returns `None` once the bus has shut down and all buffered events
    /// have been drained.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "progress observer lagged, skipping events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(batch_id: Uuid) -> PipelineEvent {
        PipelineEvent::ValidationProgress {
            batch_id,
            current: 1,
            total: 3,
            status: "Validated 1 of 3 URLs".to_string(),
            current_url: "https://www.youtube.com/watch?v=abc".to_string(),
            is_complete: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_receivers_does_not_fail() {
        let bus = EventBus::new(16);
        let reached = bus.emit(sample_event(Uuid::new_v4()));
        assert_eq!(reached, 0);
    }

    #[tokio::test]
    async fn test_subscription_receives_events_in_order() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();

        let batch_id = Uuid::new_v4();
        bus.emit(sample_event(batch_id));
        bus.emit(PipelineEvent::BatchCompleted {
            batch_id,
            successful: 2,
            failed: 1,
            timestamp: Utc::now(),
        });

        let first = sub.recv().await.expect("first event");
        assert_eq!(first.event_type(), "ValidationProgress");

        let second = sub.recv().await.expect("second event");
        assert_eq!(second.event_type(), "BatchCompleted");
    }

    #[tokio::test]
    async fn test_dropped_subscription_detaches_observer() {
        let bus = EventBus::new(16);
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.emit(sample_event(Uuid::new_v4())), 0);
    }

    #[test]
    fn test_event_serialization_tags_type() {
        let event = sample_event(Uuid::new_v4());
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"type\":\"ValidationProgress\""));
        assert!(json.contains("\"current\":1"));
        assert!(json.contains("\"total\":3"));

        let back: PipelineEvent = serde_json::from_str(&json).expect("deserialize");
        match back {
            PipelineEvent::ValidationProgress { current, total, .. } => {
                assert_eq!(current, 1);
                assert_eq!(total, 3);
            }
            _ => panic!("wrong event type deserialized"),
        }
    }
}
