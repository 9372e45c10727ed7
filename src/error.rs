//! Error types for the command client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_command_client::{ConnectionManager, PageOrigin, Result};
//!
//! async fn example(manager: &ConnectionManager) -> Result<()> {
//!     let connection = manager.connect(Some("localhost:8081")).await?;
//!     assert!(connection.is_open());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidEndpoint`] |
//! | Connection | [`Error::Connection`], [`Error::NotOpen`], [`Error::WebSocket`] |
//! | Payload | [`Error::InvalidArgument`], [`Error::Json`] |
//! | Internal | [`Error::ChannelClosed`] |
//!
//! Sending while not open is *not* an error at the manager level: the
//! manager drops the command silently. Only [`Connection::send_text`]
//! reports [`Error::NotOpen`].
//!
//! [`Connection::send_text`]: crate::transport::Connection::send_text

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by the manager builder for an unusable page URL or protocol.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// The endpoint built from scheme and authority is not a valid URL.
    #[error("Invalid endpoint {endpoint}: {message}")]
    InvalidEndpoint {
        /// The rejected endpoint string.
        endpoint: String,
        /// Why it was rejected.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection could not be established.
    ///
    /// Returned when the attempt is aborted before the handshake completes.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The connection is not in the open state.
    #[error("Connection is not open")]
    NotOpen,

    // ========================================================================
    // Payload Errors
    // ========================================================================
    /// Invalid command payload.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error surfaced by the transport.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid endpoint error.
    #[inline]
    pub fn invalid_endpoint(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::NotOpen | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error comes from configuration.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidEndpoint { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
