//! WebSocket command client for the simulation web server.
//!
//! This library manages a single client-side WebSocket connection used to
//! send command messages to the server and receive its asynchronous
//! replies.
//!
//! # Architecture
//!
//! - **Client (Rust)**: [`ConnectionManager`] owns one [`Connection`] handle
//! - **Server**: accepts the `web_server` sub-protocol, answers each
//!   command with a JSON object echoing its `id`
//!
//! Key design principles:
//!
//! - Every outbound frame is a JSON object tagged with a `command` field
//! - Commands are fire-and-forget: without an open connection they are
//!   dropped silently, never queued
//! - `connect` settles exactly once; retries are the caller's business
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::{Map, json};
//! use ws_command_client::{ConnectionEvent, ConnectionManager, PageOrigin, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ConnectionManager::new(PageOrigin::parse("http://localhost:8081/")?);
//!
//!     let connection = manager.connect(None).await?;
//!     connection.on_event(|event| {
//!         if let ConnectionEvent::Message(message) = event {
//!             println!("reply: {:?}", message.fields());
//!         }
//!     });
//!
//!     let mut data = Map::new();
//!     data.insert("seq".into(), json!(1));
//!     manager.send_command("ping", &mut data);
//!
//!     manager.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`manager`] | [`ConnectionManager`] and its configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Command framing and inbound messages |
//! | [`transport`] | Endpoint and connection handle |
//!
//! # Features
//!
//! - `rustls`: enables `wss://` endpoints for secure pages

// ============================================================================
// Modules
// ============================================================================

/// Connection manager and configuration.
pub mod manager;

/// Error types and result aliases.
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// WebSocket message types.
pub mod protocol;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Manager types
pub use manager::{Connecting, ConnectionManager, ManagerBuilder, PageOrigin};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, SubscriptionId};

// Protocol types
pub use protocol::{CommandData, ConnectionEvent, InboundMessage};

// Transport types
pub use transport::{Connection, Endpoint, ReadyState, Scheme};
