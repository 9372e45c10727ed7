//! Inbound message and connection event types.
//!
//! The server answers each command with a JSON object echoing the
//! command's `id` next to its result fields. Interpreting those objects is
//! left to subscribers; this module only decodes the frame.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value, from_str};

use crate::error::{Error, Result};

// ============================================================================
// InboundMessage
// ============================================================================

/// A JSON object received from the server.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "details": { ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    fields: Map<String, Value>,
}

impl InboundMessage {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not JSON
    /// - [`Error::InvalidArgument`] if the JSON is not an object
    pub fn parse(text: &str) -> Result<Self> {
        match from_str::<Value>(text)? {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(Error::invalid_argument("inbound message is not a JSON object")),
        }
    }

    /// Returns the echoed command `id`, if present and not null.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        self.fields.get("id").filter(|v| !v.is_null())
    }

    /// Returns a field by name.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a string field.
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns all fields.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consumes the message, returning its fields.
    #[inline]
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

// ============================================================================
// ConnectionEvent
// ============================================================================

/// Event delivered to connection subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A JSON object arrived from the server.
    Message(InboundMessage),
    /// The transport closed after having been open.
    Closed {
        /// Close code sent by the peer, if any.
        code: Option<u16>,
        /// Close reason sent by the peer (empty if none).
        reason: String,
    },
}

// ============================================================================
// Tests
// ============================================================================
