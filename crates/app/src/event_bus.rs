//! In-process message bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use crate::ports::InboundMessage;

/// Fans inbound broker messages out to every registered observer.
///
/// Publishing succeeds even when there are no active subscribers
/// (the message is simply dropped). Each subscriber has its own cursor, so a
/// slow or failing observer never blocks the others.
#[derive(Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<InboundMessage>,
}

impl MessageBus {
    /// Create a new bus with the given per-subscriber buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to messages on this bus.
    ///
    /// Returns a receiver that will get all messages published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.sender.subscribe()
    }

    /// Deliver `message` to every current subscriber, returning how many
    /// received it.
    pub fn publish(&self, message: InboundMessage) -> usize {
        // broadcast::send fails only when there are zero receivers.
        self.sender.send(message).unwrap_or(0)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(topic: &str) -> InboundMessage {
        InboundMessage::new(topic, b"{}".to_vec())
    }

    #[tokio::test]
    async fn should_deliver_message_to_subscriber() {
        let bus = MessageBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(message("smart_home/v1/light/1/status"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic, "smart_home/v1/light/1/status");
    }

    #[tokio::test]
    async fn should_deliver_message_to_multiple_subscribers() {
        let bus = MessageBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.publish(message("a/b/c")), 2);

        assert_eq!(rx1.recv().await.unwrap().topic, "a/b/c");
        assert_eq!(rx2.recv().await.unwrap().topic, "a/b/c");
    }

    #[test]
    fn should_succeed_when_no_subscribers() {
        let bus = MessageBus::new(16);
        assert_eq!(bus.publish(message("a/b/c")), 0);
    }

    #[tokio::test]
    async fn should_not_deliver_messages_published_before_subscription() {
        let bus = MessageBus::new(16);
        bus.publish(message("early"));

        let mut rx = bus.subscribe();
        bus.publish(message("late"));

        assert_eq!(rx.recv().await.unwrap().topic, "late");
    }

    #[tokio::test]
    async fn should_keep_delivering_after_a_subscriber_drops() {
        let bus = MessageBus::new(16);
        let dropped = bus.subscribe();
        let mut rx = bus.subscribe();
        drop(dropped);

        bus.publish(message("still/here"));

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(rx.recv().await.unwrap().topic, "still/here");
    }
}
