//! Connection manager.
//!
//! The [`ConnectionManager`] owns at most one connection handle and exposes
//! the three operations collaborators use: `connect`, `disconnect` and
//! `send_command`.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::{Map, json};
//! use ws_command_client::{ConnectionManager, PageOrigin};
//!
//! # async fn example() -> ws_command_client::Result<()> {
//! let manager = ConnectionManager::new(PageOrigin::new("localhost:8081", false));
//! manager.connect(None).await?;
//!
//! let mut data = Map::new();
//! data.insert("seq".into(), json!(1));
//! manager.send_command("ping", &mut data);
//!
//! manager.disconnect();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{CommandData, encode_command, inject_command, payload_to_data};
use crate::transport::{Connection, Endpoint, Established, ReadyState};

use super::builder::ManagerBuilder;
use super::origin::PageOrigin;

// ============================================================================
// Constants
// ============================================================================

/// Sub-protocol token the simulation server accepts.
pub const DEFAULT_PROTOCOL: &str = "web_server";

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owner of the single client connection.
///
/// The stored handle is replaced by every [`connect`](Self::connect) and is
/// never cleared: after a failed connect or a close it keeps referencing
/// the dead transport, and sends are dropped until the next connect.
pub struct ConnectionManager {
    /// Page context: default authority and scheme selection.
    origin: PageOrigin,
    /// Sub-protocol requested on every connect.
    protocol: String,
    /// Current handle, if any connect has been issued.
    handle: Mutex<Option<Connection>>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("origin", &self.origin)
            .field("protocol", &self.protocol)
            .field("handle", &*self.handle.lock())
            .finish()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(PageOrigin::default())
    }
}

impl ConnectionManager {
    /// Creates a manager for the given page using the `web_server` protocol.
    #[inline]
    #[must_use]
    pub fn new(origin: PageOrigin) -> Self {
        Self::with_protocol(origin, DEFAULT_PROTOCOL.to_string())
    }

    pub(crate) fn with_protocol(origin: PageOrigin, protocol: String) -> Self {
        Self {
            origin,
            protocol,
            handle: Mutex::new(None),
        }
    }

    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// Returns the page origin.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &PageOrigin {
        &self.origin
    }

    /// Returns the sub-protocol requested on connect.
    #[inline]
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Returns the stored handle, if any.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<Connection> {
        self.handle.lock().clone()
    }

    /// Builds the endpoint `connect(host)` would target.
    ///
    /// An absent or empty `host` means the page authority.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the authority is unusable.
    pub fn endpoint_for(&self, host: Option<&str>) -> Result<Endpoint> {
        let authority = host
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| self.origin.authority());
        Endpoint::new(self.origin.scheme(), authority)
    }

    /// Opens a new connection and stores its handle.
    ///
    /// The handle is stored before this returns, while still connecting.
    /// A previously stored handle is replaced but not closed. The returned
    /// future settles once: with the handle when the transport opens, or
    /// with the transport's error. Dropping it does not cancel the attempt;
    /// use [`disconnect`](Self::disconnect) for that.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, host: Option<&str>) -> Connecting {
        let endpoint = match self.endpoint_for(host) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(error = %e, "Cannot connect");
                return Connecting::failed(e);
            }
        };

        debug!(endpoint = %endpoint, protocol = %self.protocol, "Connecting");

        let (connection, established) = Connection::open(endpoint, &self.protocol);
        let previous = self.handle.lock().replace(connection.clone());

        if let Some(previous) = previous
            && matches!(
                previous.ready_state(),
                ReadyState::Connecting | ReadyState::Open
            )
        {
            warn!(
                previous = %previous.id(),
                current = %connection.id(),
                "Replaced a live connection without closing it"
            );
        }

        Connecting::pending(connection, established)
    }

    /// Requests closure of the stored connection, if any.
    ///
    /// The handle stays stored; it reports closing, then closed.
    pub fn disconnect(&self) {
        match self.handle() {
            Some(connection) => connection.close(),
            None => trace!("Disconnect without a connection"),
        }
    }

    /// Sends a command frame if the stored connection is open.
    ///
    /// `data["command"]` is set to `command` in place whether or not the
    /// frame is sent. Without an open connection the command is dropped
    /// silently.
    pub fn send_command(&self, command: &str, data: &mut CommandData) {
        let Some(connection) = self.open_handle() else {
            inject_command(command, data);
            trace!(command, "Dropping command: no open connection");
            return;
        };

        let text = match encode_command(command, data) {
            Ok(text) => text,
            Err(e) => {
                warn!(command, error = %e, "Dropping command: encoding failed");
                return;
            }
        };

        if connection.send_text(text).is_err() {
            trace!(command, "Dropping command: connection stopped being open");
        }
    }

    /// Sends a typed payload as a command frame.
    ///
    /// Same delivery rules as [`send_command`](Self::send_command): returns
    /// `Ok(())` even when the frame is dropped for lack of an open connection.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the payload cannot be serialized
    /// - [`Error::InvalidArgument`] if it is not a JSON object
    pub fn send_payload<T: Serialize + ?Sized>(&self, command: &str, payload: &T) -> Result<()> {
        let mut data = payload_to_data(payload)?;
        self.send_command(command, &mut data);
        Ok(())
    }

    fn open_handle(&self) -> Option<Connection> {
        self.handle.lock().as_ref().filter(|c| c.is_open()).cloned()
    }
}

// ============================================================================
// Connecting
// ============================================================================

/// Future returned by [`ConnectionManager::connect`].
///
/// Resolves once with the open handle or the establishment error.
pub struct Connecting {
    state: ConnectingState,
}

enum ConnectingState {
    Pending {
        connection: Connection,
        established: Established,
    },
    Failed(Error),
    Done,
}

impl Connecting {
    fn pending(connection: Connection, established: Established) -> Self {
        Self {
            state: ConnectingState::Pending {
                connection,
                established,
            },
        }
    }

    fn failed(err: Error) -> Self {
        Self {
            state: ConnectingState::Failed(err),
        }
    }

    /// Returns the handle being established, until the future resolves.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> Option<&Connection> {
        match &self.state {
            ConnectingState::Pending { connection, .. } => Some(connection),
            ConnectingState::Failed(_) | ConnectingState::Done => None,
        }
    }
}

impl Future for Connecting {
    type Output = Result<Connection>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match mem::replace(&mut this.state, ConnectingState::Done) {
            ConnectingState::Pending {
                connection,
                mut established,
            } => match Pin::new(&mut established).poll(cx) {
                Poll::Pending => {
                    this.state = ConnectingState::Pending {
                        connection,
                        established,
                    };
                    Poll::Pending
                }
                Poll::Ready(Ok(Ok(()))) => Poll::Ready(Ok(connection)),
                Poll::Ready(Ok(Err(e))) => Poll::Ready(Err(e)),
                Poll::Ready(Err(e)) => Poll::Ready(Err(Error::ChannelClosed(e))),
            },
            ConnectingState::Failed(e) => Poll::Ready(Err(e)),
            ConnectingState::Done => panic!("`Connecting` polled after completion"),
        }
    }
}

impl fmt::Debug for Connecting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            ConnectingState::Pending { .. } => "pending",
            ConnectingState::Failed(_) => "failed",
            ConnectingState::Done => "done",
        };
        f.debug_struct("Connecting")
            .field("state", &state)
            .field("connection", &self.connection())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
