//! Application Runtime
//!
//! The single object an application talks to: event subscription and
//! emission over the resilient channel, plus clipboard, browser, window and
//! environment services.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsbridge::channel::ManagerOptions;
//! use wsbridge::runtime::Runtime;
//!
//! #[tokio::main]
//! async fn main() {
//!     let runtime = Runtime::builder(ManagerOptions::new("ws://127.0.0.1:8088/ws")).build();
//!
//!     runtime.events_on("progress", |data| println!("progress: {data}"));
//!     runtime.wait_for_websocket().await;
//!     runtime.events_emit("start", vec![serde_json::json!({"job": 1})]);
//! }
//! ```

mod browser;
mod clipboard;
mod environment;
pub mod window;

pub use browser::{validate as validate_url, OpenError, SystemOpener, UrlOpener};
pub use clipboard::{
    Clipboard, ClipboardError, ClipboardProvider, DeniedClipboard, MemoryClipboard,
};
pub use environment::Environment;

use serde_json::Value;
use std::sync::Arc;

use crate::channel::{ChannelManager, ManagerOptions, Transport, WsTransport};
use crate::router::{callback, Callback, EventRouter};

/// Application-facing runtime. Cheap to clone.
#[derive(Clone)]
pub struct Runtime {
    manager: ChannelManager,
    events: EventRouter,
    clipboard: Clipboard,
    opener: Arc<dyn UrlOpener>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("manager", &self.manager)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Runtime`]
pub struct RuntimeBuilder {
    options: ManagerOptions,
    transport: Option<Arc<dyn Transport>>,
    clipboard: Option<Clipboard>,
    opener: Option<Arc<dyn UrlOpener>>,
    auto_connect: bool,
}

impl RuntimeBuilder {
    pub fn new(options: ManagerOptions) -> Self {
        Self {
            options,
            transport: None,
            clipboard: None,
            opener: None,
            auto_connect: true,
        }
    }

    /// Use a custom transport (defaults to [`WsTransport`])
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use custom clipboard providers
    pub fn clipboard(mut self, clipboard: Clipboard) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    /// Use a custom URL opener (defaults to [`SystemOpener`])
    pub fn opener(mut self, opener: Arc<dyn UrlOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Whether `build` starts connecting immediately (default: true)
    pub fn auto_connect(mut self, enable: bool) -> Self {
        self.auto_connect = enable;
        self
    }

    /// Wire the manager and router together. Must be called inside a tokio
    /// runtime when auto-connect is enabled.
    pub fn build(self) -> Runtime {
        let transport = self.transport.unwrap_or_else(|| Arc::new(WsTransport::default()));
        let manager = ChannelManager::new(transport, self.options);
        let events = EventRouter::attach(&manager);

        if self.auto_connect {
            manager.connect();
        }

        Runtime {
            manager,
            events,
            clipboard: self.clipboard.unwrap_or_default(),
            opener: self.opener.unwrap_or_else(|| Arc::new(SystemOpener)),
        }
    }
}

impl Runtime {
    pub fn builder(options: ManagerOptions) -> RuntimeBuilder {
        RuntimeBuilder::new(options)
    }

    // ==================== Events ====================

    /// Subscribe to `event`. The returned handle can be passed to
    /// [`EventRouter::unsubscribe`] to remove just this subscription.
    pub fn events_on<F>(&self, event: &str, f: F) -> Callback
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let cb = callback(f);
        self.events.subscribe(event, Arc::clone(&cb));
        cb
    }

    /// Subscribe to the next delivery of `event` only
    pub fn events_once<F>(&self, event: &str, f: F) -> Callback
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let cb = callback(f);
        self.events.subscribe_once(event, Arc::clone(&cb));
        cb
    }

    /// Remove every subscription for `event`
    pub fn events_off(&self, event: &str) {
        self.events.unsubscribe(event, None);
    }

    /// Publish `event` to the backend. Dropped silently while disconnected.
    pub fn events_emit(&self, event: &str, values: Vec<Value>) {
        self.events.publish(event, values);
    }

    /// Connect now, skipping any pending reconnect delay
    pub fn reconnect_websocket(&self) {
        self.manager.reconnect_now();
    }

    /// Resolve once the channel is connected
    pub async fn wait_for_websocket(&self) {
        self.manager.wait_until_connected().await;
    }

    pub fn manager(&self) -> &ChannelManager {
        &self.manager
    }

    pub fn events(&self) -> &EventRouter {
        &self.events
    }

    /// Stop reconnecting and close the channel
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    // ==================== Clipboard ====================

    pub fn clipboard_get_text(&self) -> String {
        self.clipboard.get_text()
    }

    pub fn clipboard_set_text(&self, text: &str) {
        self.clipboard.set_text(text);
    }

    // ==================== Browser ====================

    pub fn browser_open_url(&self, url: &str) {
        if let Err(e) = self.opener.open(url) {
            tracing::warn!(url = %url, error = %e, "Failed to open URL");
        }
    }

    // ==================== Window (no-ops) ====================

    pub fn window_minimise(&self) {
        window::minimise();
    }

    pub fn window_maximise(&self) {
        window::maximise();
    }

    pub fn window_toggle_maximise(&self) {
        window::toggle_maximise();
    }

    pub fn window_is_maximised(&self) -> bool {
        window::is_maximised()
    }

    pub fn window_is_fullscreen(&self) -> bool {
        window::is_fullscreen()
    }

    pub fn window_set_dark_theme(&self) {
        window::set_dark_theme();
    }

    pub fn window_set_light_theme(&self) {
        window::set_light_theme();
    }

    pub fn quit(&self) {
        window::quit();
    }

    // ==================== Environment ====================

    pub fn environment(&self) -> Environment {
        Environment::browser()
    }
}
