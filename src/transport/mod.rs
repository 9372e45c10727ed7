//! WebSocket transport layer.
//!
//! This module owns the client side of the socket: endpoint construction
//! and the connection handle with its I/O task.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌──────────────────┐
//! │  Client (Rust)   │                              │  Simulation      │
//! │                  │         WebSocket            │  web server      │
//! │  Connection      │─────────────────────────────►│                  │
//! │  (web_server)    │◄─────────────────────────────│  JSON replies    │
//! └──────────────────┘      ws(s)://authority       └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::open` - Handle created in `Connecting`, task spawned
//! 2. Handshake completes - `Open`, establishment resolves `Ok`
//! 3. `Connection::send_text` - Frames written by the task
//! 4. `Connection::close` - `Closing`, close handshake, then `Closed`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection handle and event loop |
//! | `endpoint` | Scheme selection and endpoint URLs |

// ============================================================================
// Submodules
// ============================================================================

/// Connection handle and event loop.
pub mod connection;

/// WebSocket endpoint construction.
pub mod endpoint;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, Established, EventHandler, ReadyState};
pub use endpoint::{Endpoint, Scheme};
