//! WebSocket Event Hub
//!
//! Backend end of the event channel.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: tracks connected clients and broadcasts server events
//! - **Handler**: handles the `/ws` upgrade and routes client events into the
//!   server-side [`EventRouter`](crate::router::EventRouter)
//!
//! ## Wire format
//!
//! Both directions carry one JSON text frame per event:
//!
//! ```text
//! {"event": "progress", "data": {"done": 3, "total": 10}}
//! ```

mod handler;
mod hub;

pub use handler::websocket_handler;
pub use hub::{ConnectionHandle, ConnectionHub, ConnectionId, HubConfig, HubError};
