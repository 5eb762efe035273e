//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================
// EMIT DTOs
// ============================================

/// Server-side event emission request
#[derive(Debug, Deserialize)]
pub struct EmitRequest {
    /// Event name
    pub event: String,
    /// Payload, `null` when omitted
    #[serde(default)]
    pub data: Value,
}

/// Event emission response
#[derive(Debug, Serialize, Deserialize)]
pub struct EmitResponse {
    /// Status: "accepted"
    pub status: String,
    /// Number of clients the event was queued for
    pub delivered: usize,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status: healthy
    pub status: String,
    /// Number of connected WebSocket clients
    pub clients: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
