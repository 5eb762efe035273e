//! Event Router
//!
//! Subscribe / unsubscribe / one-shot / publish surface over a
//! [`SubscriberRegistry`]. Outbound envelopes go to an [`EnvelopeSink`]
//! (the [`ChannelManager`] on the client, the `ConnectionHub` on the
//! backend); inbound events arrive through [`EventRouter::inbound_handler`].

mod registry;

pub use registry::{callback, Callback, SubscriberRegistry};

use serde_json::Value;
use std::sync::Arc;

use crate::channel::{ChannelManager, Envelope, InboundHandler};

/// Destination for published envelopes
pub trait EnvelopeSink: Send + Sync {
    /// Best-effort delivery; never fails to the caller
    fn send_envelope(&self, envelope: Envelope);
}

impl EnvelopeSink for ChannelManager {
    fn send_envelope(&self, envelope: Envelope) {
        self.send(&envelope);
    }
}

/// Routes events between application subscribers and the wire
#[derive(Clone)]
pub struct EventRouter {
    registry: Arc<SubscriberRegistry>,
    sink: Arc<dyn EnvelopeSink>,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl EventRouter {
    /// Create a router publishing to `sink`
    pub fn new(sink: Arc<dyn EnvelopeSink>) -> Self {
        Self {
            registry: Arc::new(SubscriberRegistry::new()),
            sink,
        }
    }

    /// Create a router publishing through a channel manager, and install
    /// the router as the manager's inbound handler.
    pub fn attach(manager: &ChannelManager) -> Self {
        let router = Self::new(Arc::new(manager.clone()));
        manager.on_inbound(router.inbound_handler());
        router
    }

    /// Register `callback` for `event`
    pub fn subscribe(&self, event: &str, callback: Callback) {
        self.registry.insert(event, callback, false);
        tracing::debug!(event = %event, "Subscribed");
    }

    /// Register `callback` for the next delivery of `event` only.
    ///
    /// The registration is removed before the callback runs, so the callback
    /// may safely subscribe itself again.
    pub fn subscribe_once(&self, event: &str, callback: Callback) {
        self.registry.insert(event, callback, true);
        tracing::debug!(event = %event, "Subscribed once");
    }

    /// Remove one matching subscription, or every subscription for `event`
    /// when `callback` is `None`. Absent entries are a no-op.
    pub fn unsubscribe(&self, event: &str, callback: Option<&Callback>) {
        match callback {
            Some(callback) => {
                self.registry.remove_callback(event, callback);
            }
            None => {
                self.registry.remove_all(event);
            }
        }
        tracing::debug!(event = %event, "Unsubscribed");
    }

    /// Publish positional values under `event`.
    ///
    /// One value is sent bare; several are sent as an ordered array.
    pub fn publish(&self, event: &str, values: Vec<Value>) {
        self.sink.send_envelope(Envelope::from_args(event, values));
    }

    /// Number of subscriptions for `event`
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.registry.count(event)
    }

    /// Handler that feeds inbound events into [`dispatch`](Self::dispatch)
    pub fn inbound_handler(&self) -> InboundHandler {
        let registry = Arc::clone(&self.registry);
        Arc::new(move |event: &str, payload: Value| {
            registry.dispatch(event, &payload);
        })
    }

    /// Fan an inbound event out to current subscribers
    pub(crate) fn dispatch(&self, event: &str, payload: &Value) -> usize {
        self.registry.dispatch(event, payload)
    }
}
