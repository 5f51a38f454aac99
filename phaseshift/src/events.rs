//! Level-progression events and the bus that carries them.
//!
//! Dispatch always runs over a snapshot of the subscriber list, so a
//! handler may subscribe, unsubscribe (itself or others) or post while it
//! is being called. Events posted during dispatch are queued and delivered
//! after the current event has reached every handler in the snapshot.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::forms::FormKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailCause {
    Hazard,
    /// Fell below the kill plane.
    OutOfBounds,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent {
    LevelStarted { level: usize },
    LevelFinished { level: usize },
    LevelFailed { level: usize, cause: FailCause },
    TransitionStarted { from: usize, to: usize },
    TransitionFinished { level: usize },
    FormChanged { from: FormKind, to: FormKind },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    LevelStarted,
    LevelFinished,
    LevelFailed,
    TransitionStarted,
    TransitionFinished,
    FormChanged,
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::LevelStarted { .. } => EventKind::LevelStarted,
            GameEvent::LevelFinished { .. } => EventKind::LevelFinished,
            GameEvent::LevelFailed { .. } => EventKind::LevelFailed,
            GameEvent::TransitionStarted { .. } => EventKind::TransitionStarted,
            GameEvent::TransitionFinished { .. } => EventKind::TransitionFinished,
            GameEvent::FormChanged { .. } => EventKind::FormChanged,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<RefCell<dyn FnMut(&GameEvent, &mut EventBus)>>;

struct Subscriber {
    id: SubscriptionId,
    /// `None` receives every kind.
    kind: Option<EventKind>,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    queue: VecDeque<GameEvent>,
    dispatching: bool,
    next_id: u64,
    delivered: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("queued", &self.queue.len())
            .field("delivered", &self.delivered)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent, &mut EventBus) + 'static,
    {
        self.add(Some(kind), Rc::new(RefCell::new(handler)))
    }

    pub fn subscribe_all<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent, &mut EventBus) + 'static,
    {
        self.add(None, Rc::new(RefCell::new(handler)))
    }

    /// Returns whether the subscription was still registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        before != self.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of (event, handler) deliveries so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn post(&mut self, event: GameEvent) {
        log::info!("event {:?}", event);
        self.queue.push_back(event);
        if self.dispatching {
            return;
        }

        self.dispatching = true;
        while let Some(event) = self.queue.pop_front() {
            let kind = event.kind();
            let snapshot: Vec<Handler> = self
                .subscribers
                .iter()
                .filter(|s| s.kind.map_or(true, |k| k == kind))
                .map(|s| Rc::clone(&s.handler))
                .collect();
            for handler in snapshot {
                // Posting never re-enters, so a handler is never borrowed twice.
                let mut handle = handler.borrow_mut();
                (&mut *handle)(&event, self);
                self.delivered += 1;
            }
        }
        self.dispatching = false;
    }

    fn add(&mut self, kind: Option<EventKind>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber { id, kind, handler });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<GameEvent>>>, impl FnMut(&GameEvent, &mut EventBus)) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |e: &GameEvent, _: &mut EventBus| sink.borrow_mut().push(*e))
    }

    #[test]
    fn delivers_by_kind() {
        let mut bus = EventBus::new();
        let (started, handler) = recorder();
        bus.subscribe(EventKind::LevelStarted, handler);
        let (all, handler) = recorder();
        bus.subscribe_all(handler);

        bus.post(GameEvent::LevelStarted { level: 0 });
        bus.post(GameEvent::LevelFinished { level: 0 });

        assert_eq!(*started.borrow(), vec![GameEvent::LevelStarted { level: 0 }]);
        assert_eq!(all.borrow().len(), 2);
        assert_eq!(bus.delivered(), 3);
    }

    #[test]
    fn handler_can_unsubscribe_itself_during_dispatch() {
        let mut bus = EventBus::new();
        let id = Rc::new(RefCell::new(None::<SubscriptionId>));
        let calls = Rc::new(RefCell::new(0));

        let own_id = Rc::clone(&id);
        let counter = Rc::clone(&calls);
        let sub = bus.subscribe(EventKind::LevelFinished, move |_, bus| {
            *counter.borrow_mut() += 1;
            if let Some(me) = *own_id.borrow() {
                bus.unsubscribe(me);
            }
        });
        *id.borrow_mut() = Some(sub);
        let (later, handler) = recorder();
        bus.subscribe(EventKind::LevelFinished, handler);

        bus.post(GameEvent::LevelFinished { level: 1 });
        bus.post(GameEvent::LevelFinished { level: 2 });

        assert_eq!(*calls.borrow(), 1);
        // the handler after the one that unsubscribed still saw both events
        assert_eq!(later.borrow().len(), 2);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn snapshot_still_calls_handler_removed_by_earlier_one() {
        let mut bus = EventBus::new();
        let victim = Rc::new(RefCell::new(None::<SubscriptionId>));
        let target = Rc::clone(&victim);
        bus.subscribe_all(move |_, bus| {
            if let Some(id) = target.borrow_mut().take() {
                bus.unsubscribe(id);
            }
        });
        let (seen, handler) = recorder();
        *victim.borrow_mut() = Some(bus.subscribe_all(handler));

        bus.post(GameEvent::TransitionFinished { level: 0 });
        bus.post(GameEvent::TransitionFinished { level: 1 });
        assert_eq!(*seen.borrow(), vec![GameEvent::TransitionFinished { level: 0 }]);
    }

    #[test]
    fn nested_posts_are_queued_in_order() {
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::LevelFinished, |e, bus| {
            if let GameEvent::LevelFinished { level } = *e {
                bus.post(GameEvent::TransitionStarted {
                    from: level,
                    to: level + 1,
                });
            }
        });
        let (seen, handler) = recorder();
        bus.subscribe_all(handler);

        bus.post(GameEvent::LevelFinished { level: 3 });
        assert_eq!(
            *seen.borrow(),
            vec![
                GameEvent::LevelFinished { level: 3 },
                GameEvent::TransitionStarted { from: 3, to: 4 },
            ]
        );
    }

    #[test]
    fn unsubscribe_unknown_is_false() {
        let mut bus = EventBus::new();
        let id = bus.subscribe_all(|_, _| {});
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
    }
}
