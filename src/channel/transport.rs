//! Transport seam
//!
//! The manager never talks to a socket directly. A [`Transport`] opens a
//! [`Connection`]: an outbound frame queue plus a stream of inbound
//! [`TransportEvent`]s. Dropping the outbound sender closes the socket.
//!
//! [`WsTransport`] is the production implementation over tokio-tungstenite;
//! tests inject a fake.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::error::TransportError;

/// Something that happened on an open connection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A text frame arrived
    Frame(String),
    /// A binary frame arrived (not part of the protocol)
    Binary(Vec<u8>),
    /// The transport failed; the connection is unusable
    Error(String),
    /// The connection closed
    Closed,
}

/// One live transport session
#[derive(Debug)]
pub struct Connection {
    /// Queue of outbound text frames. Dropping it closes the connection.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Inbound lifecycle and data events, in delivery order
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens connections to an endpoint
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection. Resolves once the session is live.
    async fn open(&self, endpoint: &str) -> Result<Connection, TransportError>;
}

/// How long the opening handshake may take before the attempt counts as failed
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket transport built on tokio-tungstenite
#[derive(Debug, Clone, Copy)]
pub struct WsTransport {
    handshake_timeout: Duration,
}

impl WsTransport {
    /// Transport with a custom handshake timeout
    pub fn with_handshake_timeout(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::with_handshake_timeout(DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, endpoint: &str) -> Result<Connection, TransportError> {
        // A peer that accepts TCP but never answers the upgrade would
        // otherwise pin the manager in Connecting.
        let handshake = connect_async(endpoint);
        let (socket, _response) = tokio::time::timeout(self.handshake_timeout, handshake)
            .await
            .map_err(|_| {
                TransportError::ConnectionFailed(format!(
                    "handshake timed out after {}ms",
                    self.handshake_timeout.as_millis()
                ))
            })?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<TransportEvent>();

        // Writer: drains queued frames, then closes the socket once the
        // outbound sender is dropped.
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    tracing::debug!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: forwards frames until the socket ends or nobody listens.
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    next = stream.next() => next,
                    _ = inbound_tx.closed() => break,
                };

                let event = match next {
                    Some(Ok(Message::Text(text))) => TransportEvent::Frame(text),
                    Some(Ok(Message::Binary(bytes))) => TransportEvent::Binary(bytes),
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = inbound_tx.send(TransportEvent::Closed);
                        break;
                    }
                    Some(Err(e)) => {
                        let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                };

                if inbound_tx.send(event).is_err() {
                    break;
                }
            }
        });

        Ok(Connection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
