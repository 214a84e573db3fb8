// Explicit publisher for race and session notices.
//
// The bus is an ordinary value owned by the sandbox; listeners register and
// deregister through it and receive events on their own channel.

use std::collections::{BTreeMap, HashMap};
use tokio::sync::mpsc;
use tracing::debug;

/// Handle returned on subscription; used to deregister.
pub type ListenerId = u64;

/// Notices published while the sandbox runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceEvent {
    /// Whole seconds left on the countdown changed.
    Countdown { seconds: u32 },
    /// Countdown reached zero; inputs are live.
    Start,
    /// Race stopped; inputs are held until the next countdown.
    Stop,
    RecordingStarted,
    RecordingStopped { commands: usize },
    ReplayStarted { commands: usize },
    ReplayFinished,
    ReplayStopped { remaining: usize },
}

/// Subscription key for [`RaceEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Countdown,
    Start,
    Stop,
    RecordingStarted,
    RecordingStopped,
    ReplayStarted,
    ReplayFinished,
    ReplayStopped,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Countdown,
        EventKind::Start,
        EventKind::Stop,
        EventKind::RecordingStarted,
        EventKind::RecordingStopped,
        EventKind::ReplayStarted,
        EventKind::ReplayFinished,
        EventKind::ReplayStopped,
    ];
}

impl RaceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RaceEvent::Countdown { .. } => EventKind::Countdown,
            RaceEvent::Start => EventKind::Start,
            RaceEvent::Stop => EventKind::Stop,
            RaceEvent::RecordingStarted => EventKind::RecordingStarted,
            RaceEvent::RecordingStopped { .. } => EventKind::RecordingStopped,
            RaceEvent::ReplayStarted { .. } => EventKind::ReplayStarted,
            RaceEvent::ReplayFinished => EventKind::ReplayFinished,
            RaceEvent::ReplayStopped { .. } => EventKind::ReplayStopped,
        }
    }
}

/// Maps each event kind to its listeners, kept in registration order.
#[derive(Debug, Default)]
pub struct RaceEventBus {
    listeners: HashMap<EventKind, BTreeMap<ListenerId, mpsc::UnboundedSender<RaceEvent>>>,
    next_id: ListenerId,
}

impl RaceEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one listener for every kind in `kinds`.
    pub fn subscribe(
        &mut self,
        kinds: &[EventKind],
    ) -> (ListenerId, mpsc::UnboundedReceiver<RaceEvent>) {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        for kind in kinds {
            self.listeners
                .entry(*kind)
                .or_default()
                .insert(id, tx.clone());
        }
        debug!(listener_id = id, kinds = ?kinds, "listener subscribed");
        (id, rx)
    }

    /// Removes the listener from one kind. Returns false if it was not registered there.
    pub fn unsubscribe(&mut self, kind: EventKind, id: ListenerId) -> bool {
        let removed = self
            .listeners
            .get_mut(&kind)
            .is_some_and(|set| set.remove(&id).is_some());
        self.listeners.retain(|_, set| !set.is_empty());
        removed
    }

    /// Removes the listener from every kind.
    pub fn unsubscribe_all(&mut self, id: ListenerId) {
        for set in self.listeners.values_mut() {
            set.remove(&id);
        }
        self.listeners.retain(|_, set| !set.is_empty());
        debug!(listener_id = id, "listener unsubscribed");
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Delivers `event` to its kind's listeners in registration order and returns
    /// how many received it. Listeners whose receiver is gone are dropped.
    pub fn publish(&mut self, event: RaceEvent) -> usize {
        let kind = event.kind();
        let Some(set) = self.listeners.get_mut(&kind) else {
            return 0;
        };

        let mut delivered = 0;
        set.retain(|id, tx| {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                debug!(listener_id = *id, ?kind, "pruning closed listener");
                false
            }
        });
        if set.is_empty() {
            self.listeners.remove(&kind);
        }
        delivered
    }
}
