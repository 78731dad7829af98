//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from browsers and local apps.
//! 3. Upgrading each connection to a WebSocket session.
//! 4. Greeting the client with a `connected` reply.
//! 5. Handing every inbound frame to the [`MessageRouter`] on its own task,
//!    so a slow print never holds up a `ping` or another print.
//! 6. Serialising replies back onto the socket from a single writer task.
//! 7. Stopping the accept loop when the `running` flag is cleared.
//!
//! Sessions share nothing but the immutable router, so there are no locks on
//! the hot path.
//!
//! # Failure containment
//!
//! Nothing a client sends can end its session or the process: parse errors,
//! validation errors, printer errors and even a panicking handler are all
//! turned into an `error` reply.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use crate::application::{MessageRouter, PrinterTransport, ServiceError};
use crate::domain::config::BridgeConfig;
use crate::domain::messages::ServiceReply;
use crate::infrastructure::printer_conn::TcpPrinterTransport;

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Replies queued per session before handler tasks wait on the writer.
const REPLY_QUEUE_DEPTH: usize = 128;

/// Handshake settings for client sessions.
///
/// tungstenite caps frames at 16 MiB by default; print payloads (rasterised
/// pages, PDFs) routinely exceed that once base64-encoded, and the service
/// puts no limit on job size.
fn session_ws_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = None;
    config.max_frame_size = None;
    config
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.ws_bind_addr` and serves clients until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(config: BridgeConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.ws_bind_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind WebSocket listener on {}",
                config.ws_bind_addr
            )
        })?;

    info!("print bridge listening on ws://{}", config.ws_bind_addr);

    serve_listener(listener, config, running).await;
    Ok(())
}

/// Serves clients on an already bound listener until `running` is cleared.
///
/// Split out from [`run_server`] so callers (and tests) can bind port 0 and
/// learn the real address first.
pub async fn serve_listener(listener: TcpListener, config: BridgeConfig, running: Arc<AtomicBool>) {
    let transport: Arc<dyn PrinterTransport> = Arc::new(TcpPrinterTransport::new(config.delivery));
    let router = MessageRouter::new(config.printer_defaults, transport);

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout on `accept()` lets the loop notice the shutdown
        // flag even when nobody is connecting.
        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new connection from {peer_addr}");
                let router = router.clone();
                tokio::spawn(async move {
                    handle_client_session(stream, peer_addr, router).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                // Log it and keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Entry point of each per-session task: runs the session and logs how it
/// ended.
async fn handle_client_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    router: MessageRouter,
) {
    match run_session(raw_stream, peer_addr, router).await {
        Ok(()) => info!("session {peer_addr} closed"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the lifecycle of a single client WebSocket session.
///
/// 1. Completes the WebSocket handshake.
/// 2. Starts the writer task and queues the `connected` greeting first.
/// 3. Reads frames until the client leaves, spawning one task per frame.
///
/// In-flight print jobs are not cancelled when the client goes away; their
/// replies are simply dropped.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    router: MessageRouter,
) -> anyhow::Result<()> {
    let ws_stream = accept_async_with_config(raw_stream, Some(session_ws_config()))
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    info!("session {peer_addr}: client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServiceReply>(REPLY_QUEUE_DEPTH);
    let session_id = peer_addr.to_string();

    // ── Writer task ───────────────────────────────────────────────────────────
    //
    // Sole owner of the WebSocket sink.  Ends when every sender (the read
    // loop plus all in-flight handler tasks) is gone, or when the client
    // stops accepting frames.
    let session_id_writer = session_id.clone();
    tokio::spawn(async move {
        while let Some(reply) = reply_rx.recv().await {
            let json = match serde_json::to_string(&reply) {
                Ok(json) => json,
                Err(e) => {
                    error!("session {session_id_writer}: JSON serialization error: {e}");
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                debug!("session {session_id_writer}: send failed (client disconnected)");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    // The channel is FIFO, so the greeting goes out before any reply.
    if reply_tx.send(ServiceReply::connected()).await.is_err() {
        debug!("session {session_id}: writer gone before greeting");
    }

    // ── Read loop ─────────────────────────────────────────────────────────────
    loop {
        let ws_msg = match ws_rx.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                debug!("session {session_id}: WebSocket closed");
                break;
            }
            Some(Err(e)) => {
                warn!("session {session_id}: WebSocket error: {e}");
                break;
            }
            None => {
                debug!("session {session_id}: stream ended");
                break;
            }
        };

        match ws_msg {
            WsMessage::Text(text) => {
                spawn_message_task(
                    router.clone(),
                    InboundFrame::Text(text),
                    reply_tx.clone(),
                    session_id.clone(),
                );
            }
            WsMessage::Binary(bytes) => {
                spawn_message_task(
                    router.clone(),
                    InboundFrame::Binary(bytes),
                    reply_tx.clone(),
                    session_id.clone(),
                );
            }
            WsMessage::Ping(data) => {
                // tokio-tungstenite queues the Pong itself.
                debug!("session {session_id}: WebSocket ping ({} bytes)", data.len());
            }
            WsMessage::Pong(_) => {
                debug!("session {session_id}: WebSocket pong received");
            }
            WsMessage::Close(_) => {
                debug!("session {session_id}: Close frame received");
                break;
            }
            WsMessage::Frame(_) => {
                debug!("session {session_id}: raw frame (ignored)");
            }
        }
    }

    Ok(())
}

/// A data frame waiting to be routed.
enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Handles one frame on its own task and queues the reply.
///
/// The router runs on a nested task so that a panic surfaces here as a
/// `JoinError` and still produces an `error` reply.
fn spawn_message_task(
    router: MessageRouter,
    frame: InboundFrame,
    replies: mpsc::Sender<ServiceReply>,
    session_id: String,
) {
    tokio::spawn(async move {
        let handled = tokio::spawn(async move {
            match frame {
                InboundFrame::Text(text) => router.handle_text(&text).await,
                InboundFrame::Binary(bytes) => router.handle_bytes(&bytes).await,
            }
        })
        .await;

        let reply = handled.unwrap_or_else(|e| {
            error!("session {session_id}: message handler failed: {e}");
            ServiceError::Malformed(e.to_string()).into_reply()
        });

        if replies.send(reply).await.is_err() {
            debug!("session {session_id}: client gone; reply dropped");
        }
    });
}

// ── Tests ─────────────────────────────────────────────────────────────────────
