//! The page context a client was loaded from.
//!
//! Supplies the default authority for `connect(None)` and decides whether
//! the secure scheme is used.
//!
//! # Example
//!
//! ```ignore
//! use ws_command_client::PageOrigin;
//!
//! let origin = PageOrigin::parse("https://sim.example.org:8443/index.html")?;
//! assert_eq!(origin.authority(), "sim.example.org:8443");
//! assert!(origin.is_secure());
//! ```

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};
use crate::transport::Scheme;

// ============================================================================
// Constants
// ============================================================================

/// Authority the simulation server listens on by default.
pub const DEFAULT_AUTHORITY: &str = "localhost:8081";

// ============================================================================
// PageOrigin
// ============================================================================

/// Authority and security of the page hosting the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrigin {
    /// `host[:port]` of the page.
    authority: String,

    /// Whether the page was served over `https`.
    secure: bool,
}

impl Default for PageOrigin {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHORITY, false)
    }
}

impl PageOrigin {
    /// Creates an origin from an authority and a security flag.
    #[inline]
    #[must_use]
    pub fn new(authority: impl Into<String>, secure: bool) -> Self {
        Self {
            authority: authority.into(),
            secure,
        }
    }

    /// Derives the origin from a page URL.
    ///
    /// `https` pages are secure; every other scheme is not. Default ports
    /// are omitted from the authority.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL cannot be parsed or has no host.
    pub fn parse(page_url: &str) -> Result<Self> {
        let url = Url::parse(page_url)
            .map_err(|e| Error::config(format!("invalid page URL {page_url:?}: {e}")))?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::config(format!("page URL {page_url:?} has no host")))?;

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self::new(authority, url.scheme() == "https"))
    }

    /// Returns the page authority.
    #[inline]
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Returns `true` if the page was served over a secure origin.
    #[inline]
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.secure
    }

    /// Returns the WebSocket scheme matching the page security.
    #[inline]
    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        Scheme::for_page(self.secure)
    }
}

// ============================================================================
// Tests
// ============================================================================
