//! WebSocket message types.
//!
//! This module defines the text-frame format exchanged with the
//! simulation web server.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | Command | Client → Server | JSON object with a `command` field |
//! | Reply / event | Server → Client | JSON object, `id` echoes the command |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Outbound command framing |
//! | `event` | Inbound messages and connection events |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound command framing.
pub mod command;

/// Inbound message and connection event types.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{COMMAND_KEY, CommandData, encode_command, inject_command, payload_to_data};
pub use event::{ConnectionEvent, InboundMessage};
