//! Resilient Event Channel
//!
//! A single long-lived WebSocket connection that carries named events in
//! both directions and survives transient network loss.
//!
//! ## Architecture
//!
//! - **ChannelManager**: connection lifecycle, reconnect timer, best-effort send
//! - **Transport**: seam over the socket (`WsTransport` in production)
//! - **Envelope**: the `{"event", "data"}` wire unit
//! - **ReconnectPolicy**: fixed delay by default, capped exponential opt-in
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wsbridge::channel::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = endpoint_for("http://localhost:8088", DEFAULT_PATH)?;
//!     let manager = ChannelManager::new(Arc::new(WsTransport::default()), ManagerOptions::new(endpoint));
//!
//!     manager.on_inbound(Arc::new(|event: &str, data: serde_json::Value| {
//!         println!("{event}: {data}");
//!     }));
//!     manager.connect();
//!     manager.wait_until_connected().await;
//!
//!     manager.send(&Envelope::new("hello", serde_json::json!({"from": "rust"})));
//!     Ok(())
//! }
//! ```

mod backoff;
mod endpoint;
mod envelope;
mod error;
mod manager;
pub(crate) mod transport;

pub use backoff::{ReconnectPolicy, DEFAULT_RECONNECT_DELAY};
pub use endpoint::{endpoint_for, DEFAULT_PATH};
pub use envelope::Envelope;
pub use error::{FrameError, TransportError};
pub use manager::{
    ChannelManager, ConnectionState, InboundHandler, ManagerOptions,
    DEFAULT_CONNECTIVITY_LOST_AFTER,
};
pub use transport::{
    Connection, Transport, TransportEvent, WsTransport, DEFAULT_HANDSHAKE_TIMEOUT,
};
