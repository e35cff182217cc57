//! Server-side session peer.
//!
//! The peer listens for the browser's WebSocket, owns the element objects
//! created for it, and routes inbound messages to them. There is one
//! logical client: a newer connection replaces the previous one.
//!
//! # Inbound Routing
//!
//! | Kind | Action |
//! |------|--------|
//! | `GetEvents` | reply with the element type's event names |
//! | `EventCallback` | run the element's handlers |
//! | `GetPropValue` | update the element's cached value |
//! | anything else | ignored |

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::identifiers::ElementId;
use crate::protocol::{EventCallback, Message, PropValue, RequestKind};
use crate::transport::{Connection, InboundHandler, Link, LinkState, Listener};

use super::descriptor::SchemaRegistry;
use super::element::RemoteElement;

// ============================================================================
// Constants
// ============================================================================

/// How often the accept loop checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// ServerPeer
// ============================================================================

/// Server end of the synchronization protocol.
///
/// # Example
///
/// ```ignore
/// let peer = ServerPeer::bind(ServerConfig::new().with_port(5000), schemas).await?;
/// println!("Client should dial {}", peer.ws_url());
///
/// let button = peer.create_element("Button", "btn1")?;
/// peer.wait_connected(Duration::from_secs(30)).await?;
/// button.refresh("disabled")?;
/// ```
pub struct ServerPeer {
    /// Bound listener address.
    local_addr: SocketAddr,

    /// Accepted WebSocket path.
    path: String,

    /// Current client connection.
    link: Link,

    /// Declared element types.
    schemas: SchemaRegistry,

    /// Created elements by id.
    elements: RwLock<FxHashMap<ElementId, RemoteElement>>,

    /// Connected flag for waiters.
    connected: watch::Sender<bool>,

    /// Shutdown flag.
    shutdown: AtomicBool,
}

// ============================================================================
// ServerPeer - Constructor
// ============================================================================

impl ServerPeer {
    /// Binds the listener and starts the accept loop.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::Io`] if binding fails
    pub async fn bind(config: ServerConfig, schemas: SchemaRegistry) -> Result<Arc<Self>> {
        config.validate()?;

        let listener = Listener::bind(config.ip, config.port, config.path.clone()).await?;
        let (connected, _) = watch::channel(false);

        let peer = Arc::new(Self {
            local_addr: listener.local_addr(),
            path: config.path,
            link: Link::new(),
            schemas,
            elements: RwLock::new(FxHashMap::default()),
            connected,
            shutdown: AtomicBool::new(false),
        });

        let peer_clone = Arc::clone(&peer);
        tokio::spawn(async move {
            peer_clone.accept_loop(listener).await;
        });

        info!(url = %peer.ws_url(), "Server peer started");

        Ok(peer)
    }
}

// ============================================================================
// ServerPeer - Public API
// ============================================================================

impl ServerPeer {
    /// Returns the port the peer is bound to.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the URL the client should dial.
    ///
    /// Format: `ws://{ip}:{port}{path}`
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.local_addr, self.path)
    }

    /// Returns the link state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.link.state()
    }

    /// Returns `true` while a client is connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Waits until a client is connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionTimeout`] if no client connects in time.
    pub async fn wait_connected(&self, wait: Duration) -> Result<()> {
        let mut rx = self.connected.subscribe();

        match timeout(wait, rx.wait_for(|connected| *connected)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(Error::connection("Peer dropped while waiting")),
            Err(_) => Err(Error::connection_timeout(wait.as_millis() as u64)),
        }
    }

    /// Creates the server-side object for a client element.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownElementType`] if the type is not registered
    /// - [`Error::DuplicateElement`] if the id is already in use
    pub fn create_element(
        &self,
        type_name: &str,
        element_id: impl Into<ElementId>,
    ) -> Result<RemoteElement> {
        let schema = self
            .schemas
            .get(type_name)
            .ok_or_else(|| Error::unknown_element_type(type_name))?;
        let element_id = element_id.into();

        let mut elements = self.elements.write();
        if elements.contains_key(&element_id) {
            return Err(Error::duplicate_element(element_id));
        }

        let element = RemoteElement::new(element_id.clone(), schema, self.link.clone());
        elements.insert(element_id.clone(), element.clone());

        debug!(element_id = %element_id, type_name, "Element created");
        Ok(element)
    }

    /// Creates an element under a freshly generated id.
    ///
    /// The host writes [`RemoteElement::id`] into the node's marker
    /// attribute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownElementType`] if the type is not registered.
    pub fn create_generated(&self, type_name: &str) -> Result<RemoteElement> {
        self.create_element(type_name, ElementId::generate())
    }

    /// Returns a created element.
    #[must_use]
    pub fn element(&self, element_id: &ElementId) -> Option<RemoteElement> {
        self.elements.read().get(element_id).cloned()
    }

    /// Forgets an element. Later messages for its id are ignored and the
    /// returned handle is retired, so it sends nothing further.
    pub fn remove_element(&self, element_id: &ElementId) -> Option<RemoteElement> {
        let removed = self.elements.write().remove(element_id);
        if let Some(element) = &removed {
            element.retire();
            debug!(element_id = %element_id, "Element removed");
        }
        removed
    }

    /// Returns the number of created elements.
    #[inline]
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.read().len()
    }

    /// Sends a raw message to the client.
    ///
    /// Returns `false` when no client is connected.
    pub fn send(&self, message: &Message) -> bool {
        self.link.send(message)
    }

    /// Routes one inbound message.
    pub fn handle_message(&self, message: Message) {
        let Some(element) = self.element(&message.element_id) else {
            debug!(element_id = %message.element_id, kind = ?message.kind, "Message for unknown element");
            return;
        };

        let handled = match message.kind {
            RequestKind::GetEvents => {
                let events = element.schema().event_names();
                trace!(element_id = %message.element_id, count = events.len(), "Sending event list");
                self.link
                    .send(&Message::event_list(message.element_id.clone(), events));
                Ok(())
            }

            RequestKind::EventCallback => message.payload::<EventCallback>().map(|callback| {
                element.dispatch_event(&callback);
            }),

            RequestKind::GetPropValue => message.payload::<PropValue>().map(|update| {
                element.apply_value(update);
            }),

            RequestKind::None
            | RequestKind::SetPropValue
            | RequestKind::CallMethod
            | RequestKind::SetVariable => {
                trace!(kind = ?message.kind, "Ignoring message kind on server");
                Ok(())
            }
        };

        if let Err(e) = handled {
            warn!(element_id = %message.element_id, error = %e, "Malformed message");
        }
    }
}

// ============================================================================
// ServerPeer - Lifecycle
// ============================================================================

impl ServerPeer {
    /// Stops accepting and closes the current connection.
    pub fn shutdown(&self) {
        info!("Server peer shutting down");

        self.shutdown.store(true, Ordering::SeqCst);
        self.link.close();
        self.connected.send_replace(false);
    }

    /// Closes the current connection but keeps accepting.
    ///
    /// The client reconnects after its backoff delay.
    pub fn disconnect(&self) {
        self.link.close();
        self.connected.send_replace(false);
        debug!("Client connection closed by server");
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    #[inline]
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

// ============================================================================
// ServerPeer - Accept Loop
// ============================================================================

impl ServerPeer {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, listener: Listener) {
        debug!("Accept loop started");

        loop {
            if self.is_shut_down() {
                debug!("Accept loop shutting down");
                break;
            }

            // Accept with timeout to allow checking shutdown flag
            match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let peer = Arc::clone(&self);
                    let path = listener.path().to_string();
                    tokio::spawn(async move {
                        if let Err(e) = peer.handle_connection(stream, addr, &path).await {
                            warn!(error = %e, ?addr, "Connection handling failed");
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                }
                Err(_) => continue,
            }
        }
    }

    /// Upgrades one connection and serves it until it closes.
    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        addr: SocketAddr,
        path: &str,
    ) -> Result<()> {
        let ws_stream = Listener::upgrade(stream, path).await?;

        if self.is_shut_down() {
            return Ok(());
        }

        let (connection, task) = Connection::spawn(ws_stream, Self::inbound_handler(&self));
        let connection_id = connection.id();

        self.link.attach(connection);
        self.connected.send_replace(true);
        info!(connection = %connection_id, ?addr, "Client connected");

        if let Err(e) = task.await {
            warn!(connection = %connection_id, error = %e, "Connection task failed");
        }

        if self.link.release(connection_id) {
            self.connected.send_replace(false);
            info!(connection = %connection_id, "Client disconnected");
        }
        Ok(())
    }

    /// Builds the handler routing frames back into this peer.
    fn inbound_handler(peer: &Arc<Self>) -> InboundHandler {
        let peer: Weak<Self> = Arc::downgrade(peer);
        Arc::new(move |message| {
            if let Some(peer) = peer.upgrade() {
                peer.handle_message(message);
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
