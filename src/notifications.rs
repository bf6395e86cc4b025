//! Lifecycle event bus — the admin channel towards the supervisor.

use tokio::sync::broadcast;

const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum StationEvent {
    Started {
        station_id: String,
        hash_id: String,
    },
    Stopped {
        station_id: String,
    },
    Updated {
        station_id: String,
        connector_id: u32,
        status: String,
    },
}

/// Fire-and-forget broadcast bus; publishing never blocks and tolerates
/// having no subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StationEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: StationEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
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

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(StationEvent::Started {
            station_id: "SIM-01".into(),
            hash_id: "abc".into(),
        });
        match rx.recv().await.unwrap() {
            StationEvent::Started { station_id, .. } => assert_eq!(station_id, "SIM-01"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(StationEvent::Stopped { station_id: "SIM-01".into() });
    }
}
