//! API Routes
//!
//! Route handlers organized by functionality.

pub mod emit;
pub mod health;
