//! Shared fixtures for integration tests.
//!
//! [`TestServer`] is an in-process WebSocket server speaking the
//! simulation server's conventions: it negotiates the requested
//! sub-protocol, records every text frame, and answers commands carrying
//! an `id` with `{"id": <id>, "status": "ok"}`.
//!
//! Special commands:
//!
//! - `close`: the server closes with code 1000 and reason `bye`
//! - `garbage`: the server replies with a non-JSON text frame

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use ws_command_client::{Connection, ReadyState};

/// Upper bound for anything the tests wait on.
pub const WAIT: Duration = Duration::from_secs(5);

/// How long to watch for frames that must not arrive.
pub const QUIET: Duration = Duration::from_millis(200);

// ============================================================================
// TestServer
// ============================================================================

pub struct TestServer {
    addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<String>,
    protocols: mpsc::UnboundedReceiver<Option<String>>,
}

impl TestServer {
    /// Spawns a server that accepts the requested sub-protocol.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(true).await
    }

    /// Spawns a server; with `echo_protocol = false` it never selects one.
    pub async fn spawn_with(echo_protocol: bool) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (frames_tx, frames) = mpsc::unbounded_channel();
        let (protocols_tx, protocols) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(
                    stream,
                    echo_protocol,
                    frames_tx.clone(),
                    protocols_tx.clone(),
                ));
            }
        });

        Ok(Self {
            addr,
            frames,
            protocols,
        })
    }

    /// Returns `127.0.0.1:<port>`.
    pub fn authority(&self) -> String {
        self.addr.to_string()
    }

    /// Waits for the next text frame.
    pub async fn next_frame(&mut self) -> Option<String> {
        timeout(WAIT, self.frames.recv()).await.ok().flatten()
    }

    /// Waits for the next text frame and decodes it.
    pub async fn next_json(&mut self) -> Option<Value> {
        let frame = self.next_frame().await?;
        serde_json::from_str(&frame).ok()
    }

    /// Returns `true` if no frame arrives within [`QUIET`].
    pub async fn stays_quiet(&mut self) -> bool {
        timeout(QUIET, self.frames.recv()).await.is_err()
    }

    /// Returns the sub-protocol header of the next handshake.
    pub async fn next_protocol(&mut self) -> Option<Option<String>> {
        timeout(WAIT, self.protocols.recv()).await.ok().flatten()
    }
}

async fn serve(
    stream: TcpStream,
    echo_protocol: bool,
    frames_tx: mpsc::UnboundedSender<String>,
    protocols_tx: mpsc::UnboundedSender<Option<String>>,
) {
    let callback = |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        let requested = request.headers().get(SEC_WEBSOCKET_PROTOCOL).cloned();
        let _ = protocols_tx.send(
            requested
                .as_ref()
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
        );

        if echo_protocol && let Some(value) = requested {
            response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }
        Ok(response)
    };

    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let text = text.as_str().to_owned();
        let _ = frames_tx.send(text.clone());

        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            continue;
        };

        if value["command"] == "close" {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            };
            let _ = ws.close(Some(frame)).await;
            continue;
        }

        if value["command"] == "garbage"
            && ws.send(Message::Text("not json".into())).await.is_err()
        {
            break;
        }

        if let Some(id) = value.get("id") {
            let reply = json!({ "id": id, "status": "ok" });
            if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                break;
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// A listener that accepts TCP but never answers the handshake.
pub async fn silent_listener() -> anyhow::Result<(TcpListener, String)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let authority = listener.local_addr()?.to_string();
    Ok((listener, authority))
}

/// An authority nothing listens on.
pub async fn refused_authority() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let authority = listener.local_addr()?.to_string();
    drop(listener);
    Ok(authority)
}

/// Polls until the connection reaches `state`.
pub async fn wait_for_state(connection: &Connection, state: ReadyState) -> bool {
    timeout(WAIT, async {
        while connection.ready_state() != state {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

// ============================================================================
// ErrorCounter
// ============================================================================

/// Tracing layer counting `ERROR` events.
#[derive(Clone, Default)]
pub struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}
