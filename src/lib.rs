//! # wsbridge
//!
//! A resilient bidirectional event channel over a single WebSocket.
//!
//! ## Features
//!
//! - **Self-healing connection**: fixed-delay reconnect with at most one pending timer
//! - **Named events**: `{"event", "data"}` envelopes in both directions
//! - **Isolated subscribers**: a panicking callback never starves its siblings
//! - **Event hub**: axum backend that broadcasts to every connected client
//!
//! ## Modules
//!
//! - [`channel`]: connection lifecycle, transport seam, wire envelope
//! - [`router`]: subscribe / once / unsubscribe / publish
//! - [`runtime`]: application-facing API and collaborator services
//! - [`websocket`] and [`api`]: the backend hub
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wsbridge::{ManagerOptions, Runtime};
//!
//! #[tokio::main]
//! async fn main() {
//!     let runtime = Runtime::builder(ManagerOptions::new("ws://127.0.0.1:8088/ws")).build();
//!
//!     runtime.events_on("progress", |data| println!("progress: {data}"));
//!     runtime.wait_for_websocket().await;
//!     runtime.events_emit("start", vec![serde_json::json!(1), serde_json::json!("fast")]);
//!
//!     runtime.shutdown().await;
//! }
//! ```

pub mod api;
pub mod channel;
pub mod config;
pub mod router;
pub mod runtime;
pub mod websocket;

// Re-export top-level types for convenience
pub use channel::{
    endpoint_for, ChannelManager, ConnectionState, Envelope, ManagerOptions, ReconnectPolicy,
    Transport, TransportError, WsTransport,
};

pub use router::{callback, Callback, EnvelopeSink, EventRouter};

pub use runtime::{Clipboard, Environment, Runtime, RuntimeBuilder, UrlOpener};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use websocket::{websocket_handler, ConnectionHub, HubConfig, HubError};

pub use config::{ChannelConfig, Config, ConfigError, LoggingConfig, ServerConfig};
