use parking_lot::{ReentrantMutex, RwLock};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

/// Subscribers for a single event type
///
/// The subscriber list is an immutable snapshot replaced on every
/// register/unregister, so a publish iterates without holding the list lock
/// and callbacks are free to (un)register from inside a delivery.
struct Channel {
    delivery: ReentrantMutex<()>,
    subscribers: RwLock<Arc<Vec<Subscriber>>>,
}

impl Channel {
    fn new() -> Self {
        Self {
            delivery: ReentrantMutex::new(()),
            subscribers: RwLock::new(Arc::new(Vec::new())),
        }
    }
}

struct BusInner {
    channels: RwLock<HashMap<TypeId, Arc<Channel>>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn channel(&self, type_id: TypeId) -> Arc<Channel> {
        if let Some(channel) = self.channels.read().get(&type_id) {
            return Arc::clone(channel);
        }
        let mut channels = self.channels.write();
        Arc::clone(channels.entry(type_id).or_insert_with(|| Arc::new(Channel::new())))
    }

    fn remove(&self, type_id: TypeId, id: u64) {
        let channel = match self.channels.read().get(&type_id) {
            Some(channel) => Arc::clone(channel),
            None => return,
        };
        // Waits out any delivery in progress on another thread; re-entrant
        // for a handler removing itself mid-delivery.
        let _delivery = channel.delivery.lock();
        let mut subscribers = channel.subscribers.write();
        let remaining: Vec<Subscriber> = subscribers
            .iter()
            .filter(|s| s.id != id)
            .map(|s| Subscriber {
                id: s.id,
                callback: Arc::clone(&s.callback),
            })
            .collect();
        *subscribers = Arc::new(remaining);
    }
}

/// Process-wide typed publish/subscribe bus
///
/// Delivery is synchronous: `publish` invokes every handler registered for
/// the event's type, in registration order, on the calling thread. The bus
/// does no routing beyond the event type; handlers filter by session id
/// themselves. Cloning is cheap and every clone refers to the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                channels: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe `callback` to every published `E`
    ///
    /// The subscription lives until the returned registration is
    /// unregistered or dropped.
    pub fn register_handler<E, F>(&self, callback: F) -> HandlerRegistration
    where
        E: Any + Send + Sync,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                callback(event);
            }
        });

        let channel = self.inner.channel(type_id);
        {
            let mut subscribers = channel.subscribers.write();
            let mut next: Vec<Subscriber> = subscribers
                .iter()
                .map(|s| Subscriber {
                    id: s.id,
                    callback: Arc::clone(&s.callback),
                })
                .collect();
            next.push(Subscriber { id, callback });
            *subscribers = Arc::new(next);
        }

        trace!(handler_id = id, event = std::any::type_name::<E>(), "Registered handler");

        HandlerRegistration {
            bus: Arc::downgrade(&self.inner),
            type_id,
            id,
            active: true,
        }
    }

    /// Deliver `event` to every handler registered for `E`
    ///
    /// Returns the number of handlers the event was delivered to.
    pub fn publish<E>(&self, event: E) -> usize
    where
        E: Any + Send + Sync,
    {
        let channel = match self.inner.channels.read().get(&TypeId::of::<E>()) {
            Some(channel) => Arc::clone(channel),
            None => return 0,
        };

        let _delivery = channel.delivery.lock();
        let snapshot = Arc::clone(&*channel.subscribers.read());
        for subscriber in snapshot.iter() {
            (subscriber.callback)(&event);
        }
        snapshot.len()
    }

    /// Number of live handlers for `E`
    pub fn handler_count<E: Any>(&self) -> usize {
        self.inner
            .channels
            .read()
            .get(&TypeId::of::<E>())
            .map(|channel| channel.subscribers.read().len())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.inner.channels.read().len())
            .finish()
    }
}

/// Capability for one live subscription
///
/// `unregister` consumes the registration, so it can run at most once.
/// A registration dropped without an explicit `unregister` is unregistered
/// on drop. Either way, removal waits for a delivery of the same event type
/// running on another thread, so the handler is never called afterwards.
#[must_use = "dropping a HandlerRegistration unregisters the handler"]
pub struct HandlerRegistration {
    bus: Weak<BusInner>,
    type_id: TypeId,
    id: u64,
    active: bool,
}

impl HandlerRegistration {
    pub fn unregister(mut self) {
        self.remove();
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn remove(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        // Bus already gone: nothing left to deliver to us.
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.type_id, self.id);
            trace!(handler_id = self.id, "Unregistered handler");
        }
    }
}

impl Drop for HandlerRegistration {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
