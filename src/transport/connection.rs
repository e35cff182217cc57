//! WebSocket connection and event loop.
//!
//! Both ends run the same loop over their socket: the browser-side session
//! over a dialed stream, the server-side peer over an accepted one.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming text frames, decoded and handed to the inbound handler
//! - Outgoing frames queued by [`Connection::send`]
//! - Shutdown requests
//!
//! There is no request/response correlation: replies travel as ordinary
//! messages and are matched by element id and property name.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::{Message, RequestKind};

// ============================================================================
// Types
// ============================================================================

/// Inbound message callback.
///
/// Runs on the connection's event loop, one message at a time. Replies are
/// sent through the owning [`Link`](super::Link), never returned.
pub type InboundHandler = Arc<dyn Fn(Message) + Send + Sync>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
#[derive(Debug)]
pub(crate) enum ConnectionCommand {
    /// Write one encoded frame.
    Send(String),
    /// Close the socket and stop the loop.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to a running WebSocket connection.
///
/// Cheap to clone. Sending never blocks: frames are queued to the event
/// loop, which writes them in order.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Identity of this connection.
    id: ConnectionId,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl Connection {
    /// Spawns the event loop for a WebSocket stream.
    ///
    /// Returns the handle and the loop's task; the task completes when the
    /// socket closes, errors, or is shut down.
    pub fn spawn<S>(ws_stream: WebSocketStream<S>, handler: InboundHandler) -> (Self, JoinHandle<()>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = ConnectionId::next();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(Self::run_event_loop(id, ws_stream, command_rx, handler));

        debug!(connection = %id, "Connection event loop spawned");

        (Self { id, command_tx }, task)
    }

    /// Creates a handle whose frames land in a channel instead of a socket.
    #[cfg(test)]
    pub(crate) fn capture() -> (Self, mpsc::UnboundedReceiver<ConnectionCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        (
            Self {
                id: ConnectionId::next(),
                command_tx,
            },
            command_rx,
        )
    }

    /// Returns this connection's identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Queues a message for delivery.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the message cannot be encoded
    /// - [`Error::ConnectionClosed`] if the event loop has stopped
    pub fn send(&self, message: &Message) -> Result<()> {
        let json = message.to_json()?;
        self.command_tx
            .send(ConnectionCommand::Send(json))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Asks the event loop to close the socket.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        id: ConnectionId,
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        handler: InboundHandler,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the peer
                frame = ws_read.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            Self::handle_incoming_text(id, &text, &handler);
                        }

                        Some(Ok(WsMessage::Close(_))) => {
                            debug!(connection = %id, "WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(connection = %id, error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!(connection = %id, "WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the owning link
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(json)) => {
                            if let Err(e) = ws_write.send(WsMessage::Text(json.into())).await {
                                warn!(connection = %id, error = %e, "Failed to write frame");
                                break;
                            }
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!(connection = %id, "Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!(connection = %id, "Command channel closed");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }
            }
        }

        debug!(connection = %id, "Event loop terminated");
    }

    /// Decodes one text frame and hands it to the handler.
    fn handle_incoming_text(id: ConnectionId, text: &str, handler: &InboundHandler) {
        match Message::from_json(text) {
            Ok(message) if message.kind == RequestKind::None => {
                trace!(connection = %id, "Ignoring message of unknown kind");
            }
            Ok(message) => {
                trace!(connection = %id, kind = ?message.kind, element_id = %message.element_id, "Message received");
                handler(message);
            }
            Err(e) => {
                warn!(connection = %id, error = %e, text = %text, "Failed to parse incoming message");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
