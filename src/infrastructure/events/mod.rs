use dashmap::DashMap;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Push-based event bus keyed by an opaque id (here: workspace ids). Each
/// key gets its own broadcast channel; publishing to a key nobody subscribed
/// to is a no-op, and slow subscribers lag rather than block the publisher.
pub struct EventBus<T: Clone> {
    channels: DashMap<String, broadcast::Sender<T>>,
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    pub fn subscribe(&self, key: &str) -> broadcast::Receiver<T> {
        self.channels
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn publish(&self, key: &str, payload: T) {
        if let Some(tx) = self.channels.get(key) {
            // Err means no live receivers; nothing to deliver to.
            let _ = tx.send(payload);
        }
    }

    pub fn remove(&self, key: &str) {
        self.channels.remove(key);
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_payloads() {
        let bus: EventBus<String> = EventBus::new();
        let mut rx = bus.subscribe("ws-1");

        bus.publish("ws-1", "hello".to_string());
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus: EventBus<String> = EventBus::new();
        bus.publish("ws-unknown", "dropped".to_string());
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let bus: EventBus<u32> = EventBus::new();
        let mut rx_a = bus.subscribe("a");
        let _rx_b = bus.subscribe("b");

        bus.publish("b", 7);
        bus.publish("a", 1);
        assert_eq!(rx_a.recv().await.unwrap(), 1);
    }
}
