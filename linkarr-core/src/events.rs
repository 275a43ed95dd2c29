use std::sync::Mutex;

use linkarr_model::Event;
use tokio::sync::mpsc;
use tracing::debug;

/// Queue depth per subscriber. A subscriber that falls this far behind
/// starts losing events rather than stalling the emitters.
const SUBSCRIBER_BUFFER: usize = 256;

/// Process-local broadcast of [`Event`]s.
///
/// Each subscriber owns a bounded queue. `emit` never blocks: events for a
/// full queue are dropped for that subscriber, and closed subscribers are
/// pruned on the next emit. Events are not persisted.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::Sender<Event>>>,
}

/// Handle to one subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<Event>,
}

impl Subscription {
    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers
            .lock()
            .expect("event bus lock")
            .push(tx);
        Subscription { receiver: rx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("event bus lock").len()
    }

    /// Deliver `event` to every live subscriber.
    pub fn emit(&self, event: Event) {
        let mut subscribers = self.subscribers.lock().expect("event bus lock");
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(kind = event.kind(), "dropping event for slow subscriber");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkarr_model::ScanSummary;

    #[tokio::test]
    async fn emit_reaches_every_subscriber() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(Event::ScanStarted);

        assert!(matches!(a.recv().await, Some(Event::ScanStarted)));
        assert!(matches!(b.recv().await, Some(Event::ScanStarted)));
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        bus.emit(Event::ScanCompleted(ScanSummary::default()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        for _ in 0..SUBSCRIBER_BUFFER + 10 {
            bus.emit(Event::ScanStarted);
        }

        // Subscriber still live and sees the buffered prefix.
        let mut seen = 0;
        while let Ok(Some(_)) =
            tokio::time::timeout(std::time::Duration::from_millis(10), sub.recv()).await
        {
            seen += 1;
        }
        assert_eq!(seen, SUBSCRIBER_BUFFER);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
