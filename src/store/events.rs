//! State change notifications.
//!
//! Every dashboard mutation publishes one event after it has been applied,
//! so subscribers always observe a consistent state.

use crate::models::LayerId;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum StateEvent {
    /// The active layer set changed; carries the serialized set.
    LayersChanged { layers: String },
    /// Tabular observations were replaced wholesale.
    ObservationsReplaced { version: u64, count: usize },
    MetadataCached { layer: LayerId },
    VectorDataCached { layer: LayerId },
    FetchFailed { layer: LayerId, message: String },
    AreaChanged { province: String, area_council: String },
    YearChanged { year: String },
    ViewportChanged,
    OpacityChanged { layer: LayerId, opacity: f64 },
    /// State was re-read from the location (mount or back/forward).
    RestoredFromUrl,
}

/// Owned publish/subscribe channel for state events.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<StateEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish an event to all subscribers. No subscribers is not an error.
    pub fn publish(&self, event: StateEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(StateEvent::YearChanged {
            year: "2023".to_string(),
        });
        bus.publish(StateEvent::ViewportChanged);

        assert_eq!(
            rx.try_recv().unwrap(),
            StateEvent::YearChanged {
                year: "2023".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), StateEvent::ViewportChanged);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(StateEvent::RestoredFromUrl);
    }
}
