//! Pub/Sub bus
//!
//! Independent fan-out of published messages to channel subscribers.
//! At-most-once, best-effort: nothing is persisted or replicated, a
//! subscriber that lags past its buffer loses messages, and delivery is
//! not ordered relative to data mutations.

use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// A message delivered to subscribers of a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PubSubMessage {
    pub channel: Bytes,
    pub payload: Bytes,
}

/// Per-channel broadcast fan-out.
pub struct PubSubBus {
    channels: HashMap<Bytes, broadcast::Sender<PubSubMessage>>,
    buffer: usize,
}

impl PubSubBus {
    /// Create a bus whose subscribers each buffer up to `buffer` messages.
    pub fn new(buffer: usize) -> Self {
        PubSubBus {
            channels: HashMap::new(),
            buffer,
        }
    }

    /// Subscribe to a channel. The returned receiver misses messages
    /// published before this call.
    pub fn subscribe(&mut self, channel: Bytes) -> broadcast::Receiver<PubSubMessage> {
        let buffer = self.buffer;
        self.channels
            .entry(channel)
            .or_insert_with(|| broadcast::channel(buffer).0)
            .subscribe()
    }

    /// Publish to a channel. Returns the number of current subscribers
    /// the message was handed to.
    pub fn publish(&mut self, channel: &Bytes, payload: Bytes) -> usize {
        let Some(sender) = self.channels.get(channel) else {
            return 0;
        };
        if sender.receiver_count() == 0 {
            // last subscriber left; drop the channel entry
            self.channels.remove(channel);
            return 0;
        }
        let message = PubSubMessage {
            channel: channel.clone(),
            payload,
        };
        sender.send(message).map(|_| sender.receiver_count()).unwrap_or(0)
    }

    /// Number of channels with at least one live subscriber.
    pub fn channel_count(&self) -> usize {
        self.channels
            .values()
            .filter(|s| s.receiver_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out() {
        let mut bus = PubSubBus::new(16);
        let mut rx1 = bus.subscribe(Bytes::from("news"));
        let mut rx2 = bus.subscribe(Bytes::from("news"));

        let delivered = bus.publish(&Bytes::from("news"), Bytes::from("hello"));
        assert_eq!(delivered, 2);

        tokio_test::block_on(async {
            let m1 = rx1.recv().await.unwrap();
            let m2 = rx2.recv().await.unwrap();
            assert_eq!(m1.payload, Bytes::from("hello"));
            assert_eq!(m2, m1);
        });
    }

    #[test]
    fn test_publish_without_subscribers() {
        let mut bus = PubSubBus::new(16);
        assert_eq!(bus.publish(&Bytes::from("empty"), Bytes::from("x")), 0);
    }

    #[test]
    fn test_disconnected_subscriber_misses_messages() {
        let mut bus = PubSubBus::new(16);
        {
            let _rx = bus.subscribe(Bytes::from("c"));
        } // dropped

        assert_eq!(bus.publish(&Bytes::from("c"), Bytes::from("lost")), 0);

        // a fresh subscriber only sees what comes after it
        let mut rx = bus.subscribe(Bytes::from("c"));
        bus.publish(&Bytes::from("c"), Bytes::from("seen"));
        tokio_test::block_on(async {
            assert_eq!(rx.recv().await.unwrap().payload, Bytes::from("seen"));
        });
    }
}
