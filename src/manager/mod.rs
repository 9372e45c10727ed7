//! Connection manager module.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Owns the connection; `connect` / `disconnect` / `send_command` |
//! | [`Connecting`] | Single-shot future returned by `connect` |
//! | [`ManagerBuilder`] | Fluent configuration builder |
//! | [`PageOrigin`] | Page authority and security |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for manager configuration.
pub mod builder;

/// Core manager implementation.
pub mod core;

/// Page origin configuration.
pub mod origin;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ManagerBuilder;
pub use self::core::{Connecting, ConnectionManager, DEFAULT_PROTOCOL};
pub use origin::{DEFAULT_AUTHORITY, PageOrigin};
