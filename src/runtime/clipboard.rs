//! Clipboard
//!
//! Read/write text through a primary provider, falling back to a secondary
//! provider when the primary refuses a write. Callers never see an error.

use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Clipboard provider errors
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("Clipboard access denied")]
    PermissionDenied,

    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),
}

/// A source/sink for clipboard text
pub trait ClipboardProvider: Send + Sync {
    fn read_text(&self) -> Result<String, ClipboardError>;
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Process-local clipboard
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<String>,
}

impl ClipboardProvider for MemoryClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        Ok(self.text.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        *self.text.lock().unwrap_or_else(PoisonError::into_inner) = text.to_string();
        Ok(())
    }
}

/// Provider that refuses every access, for environments without a clipboard
#[derive(Debug, Default, Clone, Copy)]
pub struct DeniedClipboard;

impl ClipboardProvider for DeniedClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        Err(ClipboardError::PermissionDenied)
    }

    fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
        Err(ClipboardError::PermissionDenied)
    }
}

/// Primary provider with a legacy fallback for writes
#[derive(Clone)]
pub struct Clipboard {
    primary: Arc<dyn ClipboardProvider>,
    fallback: Arc<dyn ClipboardProvider>,
}

impl Default for Clipboard {
    fn default() -> Self {
        let memory: Arc<dyn ClipboardProvider> = Arc::new(MemoryClipboard::default());
        Self::new(Arc::clone(&memory), memory)
    }
}

impl Clipboard {
    pub fn new(primary: Arc<dyn ClipboardProvider>, fallback: Arc<dyn ClipboardProvider>) -> Self {
        Self { primary, fallback }
    }

    /// Clipboard text, or an empty string if it cannot be read
    pub fn get_text(&self) -> String {
        match self.primary.read_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(error = %e, "Clipboard read failed");
                String::new()
            }
        }
    }

    /// Write text, trying the fallback provider if the primary refuses
    pub fn set_text(&self, text: &str) {
        let Err(e) = self.primary.write_text(text) else {
            return;
        };

        tracing::debug!(error = %e, "Clipboard write failed, using fallback");
        if let Err(e) = self.fallback.write_text(text) {
            tracing::warn!(error = %e, "Clipboard fallback write failed");
        }
    }
}
