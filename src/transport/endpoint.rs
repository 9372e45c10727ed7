//! WebSocket endpoint construction.
//!
//! An endpoint is always `<scheme>://<authority>`: `wss` when the page was
//! served over a secure origin, `ws` otherwise.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Scheme
// ============================================================================

/// WebSocket URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain `ws://`.
    Ws,
    /// TLS `wss://`.
    Wss,
}

impl Scheme {
    /// Picks `wss` for secure pages and `ws` otherwise.
    #[inline]
    #[must_use]
    pub const fn for_page(secure: bool) -> Self {
        if secure { Self::Wss } else { Self::Ws }
    }

    /// Returns the scheme name without the `://` separator.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// A validated `<scheme>://<authority>` WebSocket address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Scheme,
    authority: String,
    url: String,
}

impl Endpoint {
    /// Builds an endpoint from a scheme and an authority (`host[:port]`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the result is not a URL with a host.
    pub fn new(scheme: Scheme, authority: impl Into<String>) -> Result<Self> {
        let authority = authority.into();
        let url = format!("{scheme}://{authority}");

        let parsed = Url::parse(&url).map_err(|e| Error::invalid_endpoint(&url, e.to_string()))?;
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(Error::invalid_endpoint(&url, "missing host"));
        }

        Ok(Self {
            scheme,
            authority,
            url,
        })
    }

    /// Returns the scheme.
    #[inline]
    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the authority exactly as given.
    #[inline]
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Returns the full endpoint URL.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_scheme_for_page() {
        assert_eq!(Scheme::for_page(true), Scheme::Wss);
        assert_eq!(Scheme::for_page(false), Scheme::Ws);
    }

    #[test]
    fn test_endpoint_format() {
        let endpoint = Endpoint::new(Scheme::Ws, "example.com:9000").expect("valid");
        assert_eq!(endpoint.as_str(), "ws://example.com:9000");
        assert_eq!(endpoint.authority(), "example.com:9000");
        assert_eq!(endpoint.to_string(), "ws://example.com:9000");
    }

    #[test]
    fn test_secure_endpoint() {
        let endpoint = Endpoint::new(Scheme::Wss, "sim.example.org").expect("valid");
        assert_eq!(endpoint.as_str(), "wss://sim.example.org");
        assert_eq!(endpoint.scheme(), Scheme::Wss);
    }

    #[test]
    fn test_empty_authority_rejected() {
        let err = Endpoint::new(Scheme::Ws, "").unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_bad_port_rejected() {
        let err = Endpoint::new(Scheme::Ws, "h:notaport").unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    proptest! {
        #[test]
        fn prop_endpoint_is_scheme_and_authority(
            host in "[a-z]{1,12}(\\.[a-z]{2,6})?",
            port in 1u16..=u16::MAX,
            secure in any::<bool>(),
        ) {
            let authority = format!("{host}:{port}");
            let endpoint = Endpoint::new(Scheme::for_page(secure), authority.clone()).unwrap();
            let expected_scheme = if secure { "wss" } else { "ws" };
            prop_assert_eq!(endpoint.as_str(), format!("{expected_scheme}://{authority}"));
        }
    }
}
