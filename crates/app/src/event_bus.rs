//! In-process event bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use crate::ports::{SessionEvent, SessionObserver};

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
pub struct InProcessEventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl SessionObserver for InProcessEventBus {
    fn notify(&self, event: SessionEvent) {
        // broadcast::send fails only when there are zero receivers,
        // which is fine; the error is ignored.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::DisconnectReason;
    use plutocon_domain::state::ConnectionState;

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        bus.notify(SessionEvent::SignalStrength(-61));

        let received = rx.recv().await.unwrap();
        assert_eq!(received, SessionEvent::SignalStrength(-61));
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let event = SessionEvent::Disconnected {
            reason: DisconnectReason::LinkDown,
        };
        bus.notify(event.clone());

        assert_eq!(rx1.recv().await.unwrap(), event);
        assert_eq!(rx2.recv().await.unwrap(), event);
    }

    #[test]
    fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        bus.notify(SessionEvent::SignalStrength(-40));
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.notify(SessionEvent::SignalStrength(-40));

        let mut rx = bus.subscribe();

        let later = SessionEvent::StateChanged {
            from: ConnectionState::Idle,
            to: ConnectionState::Connecting,
        };
        bus.notify(later.clone());

        assert_eq!(rx.recv().await.unwrap(), later);
    }

    #[tokio::test]
    async fn should_work_through_arc() {
        let bus = std::sync::Arc::new(InProcessEventBus::new(4));
        let mut rx = bus.subscribe();
        let observer: std::sync::Arc<InProcessEventBus> = bus.clone();
        observer.notify(SessionEvent::SignalStrength(-70));
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::SignalStrength(-70));
    }
}
