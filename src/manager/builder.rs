//! Builder pattern for manager configuration.
//!
//! # Example
//!
//! ```no_run
//! use ws_command_client::ConnectionManager;
//!
//! # fn example() -> ws_command_client::Result<()> {
//! let manager = ConnectionManager::builder()
//!     .page_url("http://localhost:8081/index.html")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};

use super::core::{ConnectionManager, DEFAULT_PROTOCOL};
use super::origin::PageOrigin;

// ============================================================================
// ManagerBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionManager`].
///
/// Use [`ConnectionManager::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ManagerBuilder {
    /// Explicit page origin.
    origin: Option<PageOrigin>,
    /// Page URL to derive the origin from.
    page_url: Option<String>,
    /// Sub-protocol override.
    protocol: Option<String>,
}

impl ManagerBuilder {
    /// Creates a builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page origin directly.
    #[inline]
    #[must_use]
    pub fn origin(mut self, origin: PageOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Sets the page URL the origin is derived from.
    ///
    /// Takes precedence over [`origin`](Self::origin).
    #[inline]
    #[must_use]
    pub fn page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }

    /// Overrides the sub-protocol (defaults to `web_server`).
    #[inline]
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Builds the manager.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the page URL is invalid
    /// - [`Error::Config`] if the protocol is empty or contains whitespace
    pub fn build(self) -> Result<ConnectionManager> {
        let origin = self.resolve_origin()?;
        let protocol = self.validate_protocol()?;

        Ok(ConnectionManager::with_protocol(origin, protocol))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ManagerBuilder {
    fn resolve_origin(&self) -> Result<PageOrigin> {
        match (&self.page_url, &self.origin) {
            (Some(url), _) => PageOrigin::parse(url),
            (None, Some(origin)) => Ok(origin.clone()),
            (None, None) => Ok(PageOrigin::default()),
        }
    }

    fn validate_protocol(&self) -> Result<String> {
        let protocol = self.protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL);

        if protocol.is_empty() || protocol.chars().any(|c| c.is_whitespace() || c == ',') {
            return Err(Error::config(format!(
                "invalid sub-protocol {protocol:?}: expected a single non-empty token"
            )));
        }

        Ok(protocol.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
