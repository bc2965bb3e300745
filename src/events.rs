//! Fan-out of [`ThinkGearEvent`]s to any number of subscribers.
//!
//! Each subscriber gets its own unbounded tokio channel and chooses which
//! [`EventKind`]s it wants.  Sending never blocks, so dispatch can run inside
//! the synchronous poll loop; the receiving side may be sync
//! (`try_recv`) or async (`recv().await`).

use std::collections::HashSet;

use log::debug;
use tokio::sync::mpsc;

use crate::types::{EventKind, ThinkGearEvent};

/// Handle identifying one subscription on an [`EventBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Returned by [`EventBus::subscribe`]: the id to detach with and the
/// receiving end of the channel.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: mpsc::UnboundedReceiver<ThinkGearEvent>,
}

struct Subscriber {
    id: SubscriberId,
    kinds: HashSet<EventKind>,
    tx: mpsc::UnboundedSender<ThinkGearEvent>,
}

/// Typed event channel with attach / detach and explicit dispatch.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a subscriber that receives only events of the given kinds.
    pub fn subscribe(&mut self, kinds: &[EventKind]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            kinds: kinds.iter().copied().collect(),
            tx,
        });
        Subscription { id, rx }
    }

    /// Attach a subscriber that receives every event.
    pub fn subscribe_all(&mut self) -> Subscription {
        self.subscribe(&EventKind::ALL)
    }

    /// Detach a subscriber.  Returns `false` if it was not attached.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `event` to every subscriber interested in its kind.
    ///
    /// Subscribers whose receiver has been dropped are detached.  Returns the
    /// number of subscribers the event was delivered to.
    pub fn dispatch(&mut self, event: &ThinkGearEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        self.subscribers.retain(|s| {
            if s.tx.is_closed() {
                debug!("detaching closed subscriber {:?}", s.id);
                return false;
            }
            if !s.kinds.contains(&kind) {
                return true;
            }
            match s.tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!("detaching closed subscriber {:?}", s.id);
                    false
                }
            }
        });
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Observation;

    #[test]
    fn delivers_only_requested_kinds() {
        let mut bus = EventBus::new();
        let mut attention = bus.subscribe(&[EventKind::Attention]);
        let mut all = bus.subscribe_all();

        let obs = Observation::default();
        assert_eq!(bus.dispatch(&ThinkGearEvent::Attention(obs)), 2);
        assert_eq!(bus.dispatch(&ThinkGearEvent::Raw(obs)), 1);

        assert_eq!(attention.rx.try_recv().unwrap(), ThinkGearEvent::Attention(obs));
        assert!(attention.rx.try_recv().is_err());
        assert_eq!(all.rx.try_recv().unwrap().kind(), EventKind::Attention);
        assert_eq!(all.rx.try_recv().unwrap().kind(), EventKind::Raw);
    }

    #[test]
    fn unsubscribe_detaches() {
        let mut bus = EventBus::new();
        let a = bus.subscribe_all();
        let mut b = bus.subscribe_all();
        assert!(bus.unsubscribe(a.id));
        assert!(!bus.unsubscribe(a.id));
        assert_eq!(bus.subscriber_count(), 1);

        bus.dispatch(&ThinkGearEvent::Error("x".into()));
        assert!(b.rx.try_recv().is_ok());
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut bus = EventBus::new();
        let sub = bus.subscribe(&[EventKind::Ready]);
        drop(sub);
        assert_eq!(bus.dispatch(&ThinkGearEvent::Power(Observation::default())), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
