//! WebSocket transport handle and event loop.
//!
//! A [`Connection`] is created in the [`ReadyState::Connecting`] state and
//! immediately spawns a tokio task that owns the socket:
//!
//! - Performs the client handshake, requesting the sub-protocol
//! - Signals establishment exactly once (open or error)
//! - Writes outgoing text frames queued by [`Connection::send_text`]
//! - Decodes incoming frames and dispatches them to subscribers
//! - Runs the closing handshake on [`Connection::close`]

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, SubscriptionId};
use crate::protocol::{ConnectionEvent, InboundMessage};

use super::endpoint::Endpoint;

// ============================================================================
// Constants
// ============================================================================

/// How long to wait for the peer's close frame after sending ours.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Event handler callback type.
///
/// Called on the connection task for every [`ConnectionEvent`].
pub type EventHandler = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

type HandlerMap = FxHashMap<SubscriptionId, EventHandler>;

/// Receives the single establishment outcome of a connection.
pub type Established = oneshot::Receiver<Result<()>>;

// ============================================================================
// ReadyState
// ============================================================================

/// Lifecycle stage of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting,
    /// Frames can be sent.
    Open,
    /// Close requested, waiting for the transport to finish.
    Closing,
    /// Closed or failed to open.
    Closed,
}

impl ReadyState {
    /// Returns `true` for [`ReadyState::Open`].
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the connection task.
enum ConnectionCommand {
    /// Write one text frame.
    Send(String),
    /// Start the closing handshake (or abort a pending one).
    Close,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to one client WebSocket.
///
/// Cloning is cheap; clones share the socket, state and subscribers.
/// When the last clone is dropped the task closes the socket.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    endpoint: Arc<Endpoint>,
    protocol: Arc<str>,
    state: Arc<RwLock<ReadyState>>,
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    handlers: Arc<Mutex<HandlerMap>>,
}

impl Connection {
    /// Opens a connection to `endpoint` requesting `protocol`.
    ///
    /// Returns the handle immediately, still connecting, together with the
    /// receiver that settles once with the establishment outcome.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(endpoint: Endpoint, protocol: &str) -> (Self, Established) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (established_tx, established_rx) = oneshot::channel();

        let connection = Self {
            id: ConnectionId::generate(),
            endpoint: Arc::new(endpoint),
            protocol: Arc::from(protocol),
            state: Arc::new(RwLock::new(ReadyState::Connecting)),
            command_tx,
            handlers: Arc::new(Mutex::new(HandlerMap::default())),
        };

        debug!(id = %connection.id, endpoint = %connection.endpoint, protocol, "Opening WebSocket");

        tokio::spawn(Self::run(
            connection.id,
            Arc::clone(&connection.endpoint),
            Arc::clone(&connection.protocol),
            command_rx,
            Arc::clone(&connection.state),
            Arc::clone(&connection.handlers),
            established_tx,
        ));

        (connection, established_rx)
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the endpoint this connection targets.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the requested sub-protocol.
    #[inline]
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Returns the current readiness state.
    #[inline]
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        *self.state.read()
    }

    /// Returns `true` if frames can be sent.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.ready_state().is_open()
    }

    /// Queues one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] unless the connection is open.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }

        self.command_tx
            .send(ConnectionCommand::Send(text.into()))
            .map_err(|_| Error::NotOpen)
    }

    /// Requests closure.
    ///
    /// While connecting, the pending handshake is aborted and the
    /// establishment outcome becomes an error. Does nothing once the
    /// connection is closing or closed.
    pub fn close(&self) {
        let mut state = self.state.write();
        match *state {
            from @ (ReadyState::Connecting | ReadyState::Open) => {
                debug!(id = %self.id, %from, "Close requested");
                *state = ReadyState::Closing;
                let _ = self.command_tx.send(ConnectionCommand::Close);
            }
            ReadyState::Closing | ReadyState::Closed => {}
        }
    }

    /// Registers an event handler.
    ///
    /// Handlers run on the connection task and must not block.
    pub fn on_event<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::generate();
        self.handlers.lock().insert(id, Arc::new(handler));
        id
    }

    /// Removes an event handler. Returns `false` if it was not registered.
    pub fn remove_handler(&self, id: SubscriptionId) -> bool {
        self.handlers.lock().remove(&id).is_some()
    }

    /// Returns the number of registered handlers.
    #[inline]
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Connection task: handshake, then event loop.
    async fn run(
        id: ConnectionId,
        endpoint: Arc<Endpoint>,
        protocol: Arc<str>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        state: Arc<RwLock<ReadyState>>,
        handlers: Arc<Mutex<HandlerMap>>,
        established_tx: oneshot::Sender<Result<()>>,
    ) {
        let _guard = StateGuard(Arc::clone(&state));

        let handshake = Self::handshake(&endpoint, &protocol);
        tokio::pin!(handshake);

        let outcome = loop {
            tokio::select! {
                result = &mut handshake => break result,

                command = command_rx.recv() => match command {
                    // Sends are refused before open; nothing to write.
                    Some(ConnectionCommand::Send(_)) => {}
                    Some(ConnectionCommand::Close) | None => {
                        break Err(Error::connection("closed before the connection was established"));
                    }
                },
            }
        };

        let ws_stream = match outcome {
            Ok(mut ws_stream) => {
                let opened = {
                    let mut state = state.write();
                    if *state == ReadyState::Connecting {
                        *state = ReadyState::Open;
                        true
                    } else {
                        false
                    }
                };

                if !opened {
                    let _ = ws_stream.close(None).await;
                    Self::fail(
                        id,
                        &endpoint,
                        &state,
                        established_tx,
                        Error::connection("closed before the connection was established"),
                    );
                    return;
                }

                ws_stream
            }
            Err(e) => {
                Self::fail(id, &endpoint, &state, established_tx, e);
                return;
            }
        };

        info!(%id, endpoint = %endpoint, "WebSocket connection established");
        let _ = established_tx.send(Ok(()));

        let (code, reason) = Self::run_event_loop(ws_stream, command_rx, &state, &handlers).await;

        *state.write() = ReadyState::Closed;
        debug!(%id, ?code, reason = %reason, "WebSocket closed");

        Self::dispatch(&handlers, &ConnectionEvent::Closed { code, reason });
    }

    /// Performs the client handshake with the sub-protocol header.
    async fn handshake(endpoint: &Endpoint, protocol: &str) -> Result<WsStream> {
        let mut request = endpoint.as_str().into_client_request()?;

        let value = HeaderValue::from_str(protocol)
            .map_err(|e| Error::connection(format!("invalid sub-protocol {protocol:?}: {e}")))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);

        let (ws_stream, response) = connect_async(request).await?;
        trace!(status = %response.status(), "Handshake response received");

        Ok(ws_stream)
    }

    /// Records a failed establishment: one diagnostic entry, then reject.
    fn fail(
        id: ConnectionId,
        endpoint: &Endpoint,
        state: &RwLock<ReadyState>,
        established_tx: oneshot::Sender<Result<()>>,
        err: Error,
    ) {
        error!(%id, endpoint = %endpoint, error = %err, "WebSocket connection error");
        *state.write() = ReadyState::Closed;
        let _ = established_tx.send(Err(err));
    }

    /// Event loop for an open socket. Returns the close code and reason.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        state: &RwLock<ReadyState>,
        handlers: &Mutex<HandlerMap>,
    ) -> (Option<u16>, String) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the server
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_text(text.as_str(), handlers);
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!("WebSocket closed by remote");
                            *state.write() = ReadyState::Closing;
                            // Flushes the queued close reply.
                            let _ = ws_write.close().await;
                            return close_info(frame);
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            return (None, String::new());
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            return (None, String::new());
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the handle
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(text)) => {
                            let len = text.len();
                            match ws_write.send(Message::Text(text.into())).await {
                                Ok(()) => trace!(len, "Frame sent"),
                                Err(e) => warn!(error = %e, "Failed to send frame"),
                            }
                        }

                        Some(ConnectionCommand::Close) | None => {
                            *state.write() = ReadyState::Closing;
                            debug!("Starting closing handshake");
                            let _ = ws_write.close().await;
                            return Self::await_close_reply(&mut ws_read).await;
                        }
                    }
                }
            }
        }
    }

    /// Reads until the peer's close frame arrives or the timeout elapses.
    async fn await_close_reply(ws_read: &mut SplitStream<WsStream>) -> (Option<u16>, String) {
        let drain = async {
            while let Some(message) = ws_read.next().await {
                match message {
                    Ok(Message::Close(frame)) => return close_info(frame),
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            (None, String::new())
        };

        match timeout(CLOSE_TIMEOUT, drain).await {
            Ok(info) => info,
            Err(_) => {
                debug!(
                    timeout_ms = CLOSE_TIMEOUT.as_millis() as u64,
                    "No close reply from remote"
                );
                (None, String::new())
            }
        }
    }

    /// Decodes a text frame and hands it to subscribers.
    fn handle_incoming_text(text: &str, handlers: &Mutex<HandlerMap>) {
        match InboundMessage::parse(text) {
            Ok(message) => {
                trace!(id = ?message.id(), "Message received");
                Self::dispatch(handlers, &ConnectionEvent::Message(message));
            }
            Err(e) => warn!(error = %e, text = %text, "Failed to parse incoming message"),
        }
    }

    /// Invokes every handler outside the registry lock.
    fn dispatch(handlers: &Mutex<HandlerMap>, event: &ConnectionEvent) {
        let snapshot: Vec<EventHandler> = handlers.lock().values().cloned().collect();
        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!("Event handler panicked");
            }
        }
    }
}

// ============================================================================
// StateGuard
// ============================================================================

/// Marks the connection closed when the task exits, however it exits.
struct StateGuard(Arc<RwLock<ReadyState>>);

impl Drop for StateGuard {
    fn drop(&mut self) {
        *self.0.write() = ReadyState::Closed;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.as_str())
            .field("protocol", &self.protocol)
            .field("state", &self.ready_state())
            .finish_non_exhaustive()
    }
}

fn close_info(frame: Option<CloseFrame>) -> (Option<u16>, String) {
    match frame {
        Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_owned()),
        None => (None, String::new()),
    }
}

// ============================================================================
// Tests
// ============================================================================
