//! Type-safe identifiers.
//!
//! Newtype wrappers so a connection id can't be passed where a
//! subscription id is expected.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use uuid::Uuid;

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifies one transport handle for its whole lifetime.
///
/// Clones of a [`Connection`](crate::transport::Connection) share the id;
/// every `connect` creates a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a new random id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SubscriptionId
// ============================================================================

/// Identifies an event handler registered on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generates a new random id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
