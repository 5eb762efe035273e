//! Subscriber Registry
//!
//! Event name → subscriber entries. Callbacks are values: registering the
//! same callback twice yields two independent entries.

use serde_json::Value;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A subscriber callback. Identity (for unsubscribe) is the `Arc` pointer.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Wrap a closure as a [`Callback`]
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Entry {
    id: u64,
    callback: Callback,
    once: bool,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    events: HashMap<String, Vec<Entry>>,
}

/// Mapping from event name to subscribers
#[derive(Default)]
pub struct SubscriberRegistry {
    inner: Mutex<RegistryInner>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SubscriberRegistry")
            .field("events", &inner.events.len())
            .finish()
    }
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; returns its id
    pub fn insert(&self, event: &str, callback: Callback, once: bool) -> u64 {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .events
            .entry(event.to_string())
            .or_default()
            .push(Entry { id, callback, once });
        id
    }

    /// Remove every entry for an event
    pub fn remove_all(&self, event: &str) -> usize {
        self.lock()
            .events
            .remove(event)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Remove the first entry whose callback is `callback`
    pub fn remove_callback(&self, event: &str, callback: &Callback) -> bool {
        self.remove_where(event, |entry| Arc::ptr_eq(&entry.callback, callback))
    }

    /// Number of entries for an event
    pub fn count(&self, event: &str) -> usize {
        self.lock().events.get(event).map(Vec::len).unwrap_or(0)
    }

    /// Whether any event has subscribers
    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// Fan a payload out to the subscribers registered when the call starts.
    ///
    /// Each callback runs in isolation: a panicking subscriber is logged and
    /// the rest still run. One-shot entries are removed before their callback
    /// runs, and only the dispatch that removed the entry invokes it.
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let snapshot: Vec<(u64, Callback, bool)> = match self.lock().events.get(event) {
            Some(entries) => entries
                .iter()
                .map(|e| (e.id, Arc::clone(&e.callback), e.once))
                .collect(),
            None => return 0,
        };

        let mut invoked = 0;
        for (id, callback, once) in snapshot {
            if once && !self.remove_where(event, |entry| entry.id == id) {
                continue;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(payload)));
            invoked += 1;

            if let Err(panic) = result {
                tracing::error!(
                    event = %event,
                    error = %panic_message(&*panic),
                    "Subscriber panicked during dispatch"
                );
            }
        }

        tracing::trace!(event = %event, subscribers = invoked, "Dispatched event");
        invoked
    }

    fn remove_where(&self, event: &str, pred: impl Fn(&Entry) -> bool) -> bool {
        let mut inner = self.lock();
        let Some(entries) = inner.events.get_mut(event) else {
            return false;
        };

        let removed = match entries.iter().position(pred) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        };

        // Clean up empty event entries
        if entries.is_empty() {
            inner.events.remove(event);
        }
        removed
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
