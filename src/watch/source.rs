//! Change source abstraction and subscriber registry.

use super::events::ChangeEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Anything that reports remote-side mutations.
///
/// Polling is one transport; a push channel could replace it without the
/// engine or the multiplexer noticing.
pub trait ChangeSource: Send + Sync {
    fn subscribe(&self, callback: ChangeCallback) -> Subscription;

    fn start(&self);

    fn stop(&self);
}

/// Ordered subscriber list shared between a source and its subscriptions
#[derive(Default)]
pub struct Subscribers {
    next: AtomicU64,
    entries: Mutex<Vec<(u64, ChangeCallback)>>,
}

impl Subscribers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(self: &Arc<Self>, callback: ChangeCallback) -> Subscription {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, callback));
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every subscriber. Callbacks run outside the lock
    /// so they may subscribe or unsubscribe.
    pub fn emit(&self, event: &ChangeEvent) {
        let callbacks: Vec<ChangeCallback> = self
            .entries
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    fn remove(&self, id: u64) {
        self.entries.lock().retain(|(entry, _)| *entry != id);
    }
}

/// Handle returned by `subscribe`; dropping it keeps the callback registered
#[must_use = "call unsubscribe() to stop receiving events"]
pub struct Subscription {
    id: u64,
    registry: Weak<Subscribers>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
