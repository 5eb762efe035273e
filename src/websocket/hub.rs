//! WebSocket Connection Hub
//!
//! Tracks every connected client and fans server-originated events out to
//! all of them. Emission is synchronous so events reach each client's queue
//! in emit order.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::channel::Envelope;
use crate::router::EnvelopeSink;

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Configuration for the connection hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

/// Handle for sending frames to a specific connection
pub struct ConnectionHandle {
    /// Queue drained by the connection's writer task
    pub sender: mpsc::UnboundedSender<String>,
    /// When the client connected
    pub connected_at: Instant,
}

/// Manages all WebSocket connections
pub struct ConnectionHub {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    config: HubConfig,
}

impl ConnectionHub {
    /// Create a new connection hub
    pub fn new(config: HubConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a new WebSocket connection
    ///
    /// Returns the connection ID on success, or an error if the connection
    /// limit has been reached.
    pub fn register(
        &self,
        sender: mpsc::UnboundedSender<String>,
    ) -> Result<ConnectionId, HubError> {
        let mut connections = self.write();
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                connected_at: Instant::now(),
            },
        );

        tracing::info!(connection_id = %id, clients = connections.len(), "WebSocket connected");
        Ok(id)
    }

    /// Unregister a connection
    pub fn unregister(&self, id: &str) {
        if let Some(handle) = self.write().remove(id) {
            tracing::info!(
                connection_id = %id,
                duration_secs = handle.connected_at.elapsed().as_secs(),
                "WebSocket disconnected"
            );
        }
    }

    /// Broadcast `data` under `event` to every connected client
    pub fn emit(&self, event: &str, data: serde_json::Value) -> usize {
        self.broadcast(&Envelope::new(event, data))
    }

    /// Broadcast an envelope to every connected client.
    ///
    /// Returns the number of clients the frame was queued for.
    pub fn broadcast(&self, envelope: &Envelope) -> usize {
        let frame = match envelope.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(event = %envelope.event, error = %e, "Failed to encode event");
                return 0;
            }
        };

        let connections = self.read();
        let mut sent_count = 0;
        for handle in connections.values() {
            if handle.sender.send(frame.clone()).is_ok() {
                sent_count += 1;
            }
        }

        tracing::trace!(
            event = %envelope.event,
            clients = sent_count,
            "Broadcast event"
        );
        sent_count
    }

    /// Get the current connection count
    pub fn connection_count(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, ConnectionHandle>> {
        self.connections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, ConnectionHandle>> {
        self.connections.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EnvelopeSink for ConnectionHub {
    fn send_envelope(&self, envelope: Envelope) {
        self.broadcast(&envelope);
    }
}

/// Errors that can occur in the connection hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.max_connections, 1000);
    }

    #[test]
    fn test_register_unregister() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (tx, _rx) = mpsc::unbounded_channel();

        let id = hub.register(tx).unwrap();
        assert!(!id.is_empty());
        assert_eq!(hub.connection_count(), 1);

        hub.unregister(&id);
        assert_eq!(hub.connection_count(), 0);

        // Unknown id is ignored
        hub.unregister("missing");
    }

    #[test]
    fn test_connection_limit() {
        let hub = ConnectionHub::new(HubConfig { max_connections: 2 });

        let (tx1, _) = mpsc::unbounded_channel();
        let (tx2, _) = mpsc::unbounded_channel();
        let (tx3, _) = mpsc::unbounded_channel();

        hub.register(tx1).unwrap();
        hub.register(tx2).unwrap();
        let result = hub.register(tx3);

        assert!(matches!(result, Err(HubError::TooManyConnections(2))));
    }

    #[test]
    fn test_emit_reaches_every_client_in_order() {
        let hub = ConnectionHub::new(HubConfig::default());

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.register(tx1).unwrap();
        hub.register(tx2).unwrap();

        assert_eq!(hub.emit("progress", json!(1)), 2);
        assert_eq!(hub.emit("progress", json!(2)), 2);

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(rx.try_recv().unwrap(), r#"{"event":"progress","data":1}"#);
            assert_eq!(rx.try_recv().unwrap(), r#"{"event":"progress","data":2}"#);
        }
    }

    #[test]
    fn test_dropped_client_not_counted() {
        let hub = ConnectionHub::new(HubConfig::default());

        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        hub.register(tx1).unwrap();
        hub.register(tx2).unwrap();
        drop(rx1);

        assert_eq!(hub.emit("x", json!(null)), 1);
    }
}
