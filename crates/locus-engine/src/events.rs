//! Per-map event fan-out.
//!
//! Subscribers are either callbacks or channel senders. Each map has an
//! [`Outbox`]: mutations enqueue their events before releasing the map's
//! write lock, so subscribers see events in commit order. Delivery runs
//! on a mutating thread after the lock is released. A panicking
//! callback is caught and logged; a full bounded channel drops that one
//! event for that subscriber; a disconnected channel is pruned. None of
//! these affect other subscribers or the mutating call.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Sender, TrySendError};
use locus_core::{MapId, SpatialEvent};
use parking_lot::{Mutex, RwLock};
use tracing::warn;

/// A callback subscriber.
pub type EventCallback = Arc<dyn Fn(&SpatialEvent) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Callback(EventCallback),
    Channel(Sender<SpatialEvent>),
}

#[derive(Clone)]
struct Subscriber {
    id: u64,
    sink: Sink,
}

#[derive(Default)]
pub(crate) struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<MapId, Vec<Subscriber>>>,
}

impl EventBus {
    fn add(self: &Arc<Self>, map_id: &MapId, sink: Sink) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .entry(map_id.clone())
            .or_default()
            .push(Subscriber { id, sink });
        Subscription {
            map_id: map_id.clone(),
            id,
            bus: Arc::downgrade(self),
        }
    }

    pub(crate) fn subscribe(self: &Arc<Self>, map_id: &MapId, callback: EventCallback) -> Subscription {
        self.add(map_id, Sink::Callback(callback))
    }

    pub(crate) fn subscribe_channel(
        self: &Arc<Self>,
        map_id: &MapId,
        sender: Sender<SpatialEvent>,
    ) -> Subscription {
        self.add(map_id, Sink::Channel(sender))
    }

    fn remove(&self, map_id: &MapId, id: u64) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(list) = subscribers.get_mut(map_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subscribers.remove(map_id);
        }
        removed
    }

    /// Drop every subscriber of `map_id`.
    pub(crate) fn drop_map(&self, map_id: &MapId) {
        self.subscribers.write().remove(map_id);
    }

    pub(crate) fn subscriber_count(&self, map_id: &MapId) -> usize {
        self.subscribers.read().get(map_id).map_or(0, Vec::len)
    }

    /// Deliver `events` in order to every subscriber of `map_id`.
    pub(crate) fn publish(&self, map_id: &MapId, events: &[SpatialEvent]) {
        if events.is_empty() {
            return;
        }
        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let snapshot = match self.subscribers.read().get(map_id) {
            Some(list) => list.clone(),
            None => return,
        };

        let mut disconnected = Vec::new();
        for subscriber in &snapshot {
            match &subscriber.sink {
                Sink::Callback(callback) => {
                    for event in events {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(event)));
                        if outcome.is_err() {
                            warn!(
                                map_id = %map_id,
                                subscriber = subscriber.id,
                                event = ?event.event_type,
                                "event subscriber panicked"
                            );
                        }
                    }
                }
                Sink::Channel(sender) => {
                    for event in events {
                        match sender.try_send(event.clone()) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                warn!(
                                    map_id = %map_id,
                                    subscriber = subscriber.id,
                                    event = ?event.event_type,
                                    "event channel full, dropping event"
                                );
                            }
                            Err(TrySendError::Disconnected(_)) => {
                                disconnected.push(subscriber.id);
                                break;
                            }
                        }
                    }
                }
            }
        }
        for id in disconnected {
            self.remove(map_id, id);
        }
    }
}

/// Per-map queue between committed mutations and the [`EventBus`].
///
/// Batches are enqueued under the map's write lock, so the queue is in
/// commit order. Whichever thread finds the delivery slot free drains
/// the queue; the others leave their batch to it. A callback that
/// mutates the same map queues behind the batch it is handling.
#[derive(Default)]
pub(crate) struct Outbox {
    pending: Mutex<VecDeque<Vec<SpatialEvent>>>,
    delivering: Mutex<()>,
}

impl Outbox {
    /// Queue one mutation's events. Call while holding the map's write
    /// lock.
    pub(crate) fn enqueue(&self, events: Vec<SpatialEvent>) {
        if !events.is_empty() {
            self.pending.lock().push_back(events);
        }
    }

    /// Deliver queued batches in order, unless another thread already is.
    pub(crate) fn flush(&self, bus: &EventBus, map_id: &MapId) {
        loop {
            let Some(delivering) = self.delivering.try_lock() else {
                return;
            };
            loop {
                let batch = self.pending.lock().pop_front();
                let Some(batch) = batch else {
                    break;
                };
                bus.publish(map_id, &batch);
            }
            drop(delivering);
            // A batch queued while we held the slot found it taken.
            if self.pending.lock().is_empty() {
                return;
            }
        }
    }
}

/// Handle to one event subscription.
///
/// Dropping the handle keeps the subscription alive; call
/// [`unsubscribe`](Self::unsubscribe) to end it. Discarding the map ends
/// every subscription of that map.
#[derive(Debug)]
pub struct Subscription {
    map_id: MapId,
    id: u64,
    bus: Weak<EventBus>,
}

impl Subscription {
    /// A handle that was never registered, for maps that do not exist.
    pub(crate) fn inert(map_id: &MapId) -> Self {
        Self {
            map_id: map_id.clone(),
            id: u64::MAX,
            bus: Weak::new(),
        }
    }

    /// The map this subscription listens to.
    pub fn map_id(&self) -> &MapId {
        &self.map_id
    }

    /// Stop receiving events. Returns `false` if the subscription had
    /// already ended.
    pub fn unsubscribe(&self) -> bool {
        match self.bus.upgrade() {
            Some(bus) => bus.remove(&self.map_id, self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("maps", &self.subscribers.read().len())
            .finish()
    }
}
