//! Browser-side session.
//!
//! A [`ClientSession`] owns everything the browser end needs: the link to
//! the server, the element registry, the change detector and the request
//! router. It runs two independent timers:
//!
//! - the reconnect backoff, a one-shot delay re-armed after every close or
//!   failed attempt
//! - the subscription-repair poll, a recurring tick that re-requests events
//!   for elements whose subscription set is still empty
//!
//! # Example
//!
//! ```ignore
//! use domsync::client::{ClientSession, MemoryNode};
//! use domsync::{ClientConfig, ElementId};
//!
//! let session = ClientSession::new(ClientConfig::new())?;
//! session.start(5000)?;
//!
//! let button = MemoryNode::element("button");
//! button.set_attribute("uielement", "btn1")?;
//! session.add_element(ElementId::new("btn1"), button.as_node());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::identifiers::ElementId;
use crate::protocol::Message;
use crate::transport::{Connection, InboundHandler, Link, LinkState};

use super::detector::ChangeDetector;
use super::dom::{MutationRecord, NodeRef};
use super::registry::{ElementRegistry, SharedRegistry};
use super::router::{Outbox, RequestRouter};

// ============================================================================
// ClientSession
// ============================================================================

/// Internal shared state, also held by the background tasks.
struct SessionInner {
    config: ClientConfig,
    link: Link,
    registry: SharedRegistry,
    detector: ChangeDetector,
    router: RequestRouter,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Browser-side end of the synchronization protocol.
///
/// Dropping the session aborts its background tasks and closes the socket.
pub struct ClientSession {
    inner: Arc<SessionInner>,
}

// ============================================================================
// ClientSession - Constructor
// ============================================================================

impl ClientSession {
    /// Creates a session. Nothing connects until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration
    /// is invalid.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let link = Link::new();
        let registry = ElementRegistry::shared();
        let outbox = Outbox::new(link.clone(), Arc::clone(&registry));
        let router = RequestRouter::new(Arc::clone(&registry), outbox);
        let detector = ChangeDetector::new(&config);

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                link,
                registry,
                detector,
                router,
                started: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }
}

// ============================================================================
// ClientSession - Lifecycle
// ============================================================================

impl ClientSession {
    /// Starts connecting to `ws://{host}:{port}{path}`.
    ///
    /// Spawns the reconnecting connect loop and the repair poll. Returns
    /// `false` if the session was already started; a second call never
    /// opens a second socket.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`](crate::Error::Url) if the endpoint is invalid
    /// - [`Error::Config`](crate::Error::Config) if called outside a tokio
    ///   runtime
    pub fn start(&self, port: u16) -> Result<bool> {
        let url = self.inner.config.endpoint(port)?;
        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("session must start inside a tokio runtime: {e}")))?;

        if self.inner.started.swap(true, Ordering::AcqRel) {
            debug!(%url, "Session already started");
            return Ok(false);
        }

        let connect = runtime.spawn(SessionInner::connect_loop(Arc::clone(&self.inner), url.clone()));
        let repair = runtime.spawn(SessionInner::repair_loop(Arc::clone(&self.inner)));
        self.inner.tasks.lock().extend([connect, repair]);

        info!(%url, "Client session started");
        Ok(true)
    }

    /// Stops mutation observation. The socket stays open.
    pub fn stop(&self) {
        self.inner.detector.stop();
        debug!("Mutation observation stopped");
    }

    /// Resumes mutation observation after [`stop`](Self::stop).
    pub fn resume(&self) {
        self.inner.detector.resume();
    }

    /// Aborts the background tasks and closes the socket.
    ///
    /// The session can be started again afterwards.
    pub fn shutdown(&self) {
        let tasks: Vec<_> = self.inner.tasks.lock().drain(..).collect();
        for task in &tasks {
            task.abort();
        }
        self.inner.link.close();

        if self.inner.started.swap(false, Ordering::AcqRel) {
            info!("Client session shut down");
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// ClientSession - Public API
// ============================================================================

impl ClientSession {
    /// Returns the session configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the link state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.inner.link.state()
    }

    /// Returns `true` while the socket is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.link.is_connected()
    }

    /// Returns `true` while mutation batches are being processed.
    #[inline]
    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.inner.detector.is_observing()
    }

    /// Registers a node under an id with an empty subscription set.
    ///
    /// The next repair tick requests its events.
    pub fn add_element(&self, element_id: impl Into<ElementId>, node: NodeRef) {
        self.inner.registry.write().register(element_id.into(), node);
    }

    /// Returns `true` if the id is registered.
    #[must_use]
    pub fn contains(&self, element_id: &ElementId) -> bool {
        self.inner.registry.read().contains(element_id)
    }

    /// Returns the number of registered elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.inner.registry.read().len()
    }

    /// Returns the subscribed event names of an element.
    #[must_use]
    pub fn subscriptions(&self, element_id: &ElementId) -> Option<Vec<String>> {
        self.inner
            .registry
            .read()
            .subscriptions(element_id)
            .map(<[String]>::to_vec)
    }

    /// Sends a message to the server.
    ///
    /// Returns `false` without sending when disconnected or when the target
    /// element is not registered. Messages are never buffered.
    pub fn send(&self, message: &Message) -> bool {
        self.inner.router.outbox().send(message)
    }

    /// Feeds one batch of mutation records through the change detector.
    ///
    /// Each resulting change is read from the node and reported to the
    /// server. A batch containing child-list records also retires elements
    /// that left the document. Returns the number of reports sent.
    pub fn on_mutations(&self, records: &[MutationRecord]) -> usize {
        let changes = self.inner.detector.process(records);

        let sent = changes
            .iter()
            .filter(|change| {
                self.inner
                    .router
                    .report(&change.element_id, &change.prop_name, change.is_attribute)
            })
            .count();

        if self.inner.detector.is_observing()
            && records
                .iter()
                .any(|record| matches!(record, MutationRecord::ChildList { .. }))
        {
            self.collect_garbage();
        }

        sent
    }

    /// Runs one subscription-repair pass.
    ///
    /// While connected, sends one `GetEvents` per element whose subscription
    /// set is empty. Returns the number of requests sent.
    pub fn poll_subscriptions(&self) -> usize {
        self.inner.poll_subscriptions()
    }

    /// Retires every element whose node has left the document.
    pub fn collect_garbage(&self) -> Vec<ElementId> {
        self.inner.registry.write().collect_garbage()
    }
}

// ============================================================================
// SessionInner - Background Tasks
// ============================================================================

impl SessionInner {
    fn poll_subscriptions(&self) -> usize {
        if !self.link.is_connected() {
            return 0;
        }

        let pending = self.registry.read().unsubscribed();
        let sent = pending
            .into_iter()
            .filter(|element_id| {
                self.router
                    .outbox()
                    .send(&Message::get_events(element_id.clone()))
            })
            .count();

        if sent > 0 {
            debug!(count = sent, "Requested events for unsubscribed elements");
        }
        sent
    }

    /// Connects, runs the connection to completion, waits, repeats.
    async fn connect_loop(self: Arc<Self>, url: Url) {
        loop {
            if self.link.begin_connect() {
                self.connect_once(&url).await;
            }

            debug!(delay_ms = self.config.reconnect_delay.as_millis() as u64, "Reconnect scheduled");
            sleep(self.config.reconnect_delay).await;
        }
    }

    /// One connect attempt; returns when the socket fails or closes.
    ///
    /// The handshake is bounded by the connect timeout so a peer that
    /// accepts TCP but never answers cannot stall the loop.
    async fn connect_once(&self, url: &Url) {
        let limit = self.config.connect_timeout;
        let ws_stream = match timeout(limit, connect_async(url.as_str())).await {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => {
                let e = Error::from(e);
                warn!(%url, error = %e, recoverable = e.is_recoverable(), "Connect failed");
                self.link.fail();
                return;
            }
            Err(_) => {
                let e = Error::connection_timeout(limit.as_millis() as u64);
                warn!(%url, error = %e, "Connect timed out");
                self.link.fail();
                return;
            }
        };

        let router = self.router.clone();
        let handler: InboundHandler = Arc::new(move |message| router.dispatch(message));
        let (connection, task) = Connection::spawn(ws_stream, handler);
        let connection_id = connection.id();

        self.link.attach(connection);
        info!(%url, connection = %connection_id, "Connected");

        if let Err(e) = task.await {
            warn!(connection = %connection_id, error = %e, "Connection task failed");
        }

        if self.link.release(connection_id) {
            info!(connection = %connection_id, "Disconnected");
        }
    }

    /// Recurring subscription-repair tick.
    async fn repair_loop(self: Arc<Self>) {
        let mut ticker = interval(self.config.repair_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // First tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.poll_subscriptions();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::Instant;

    use crate::client::dom::DomNode;
    use crate::client::memory::MemoryNode;
    use crate::protocol::{PropValue, RequestKind};
    use crate::server::{ElementSchema, PropertyDescriptor, RemoteElement};
    use crate::transport::connection::ConnectionCommand;

    fn session() -> ClientSession {
        ClientSession::new(ClientConfig::new()).expect("session")
    }

    fn connect(session: &ClientSession) -> UnboundedReceiver<ConnectionCommand> {
        let (connection, rx) = Connection::capture();
        session.inner.link.attach(connection);
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<ConnectionCommand>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(command) = rx.try_recv() {
            if let ConnectionCommand::Send(json) = command {
                out.push(Message::from_json(&json).expect("decode"));
            }
        }
        out
    }

    fn tracked(id: &str) -> Arc<MemoryNode> {
        let node = MemoryNode::element("div");
        node.set_attribute("uielement", id).expect("marker");
        node
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = ClientSession::new(ClientConfig::new().with_path("nope"));
        assert!(result.is_err());
    }

    #[test]
    fn test_send_requires_connection_and_registration() {
        let session = session();
        session.add_element("a", tracked("a").as_node());

        let message = Message::get_events(ElementId::new("a"));
        assert!(!session.send(&message));

        let mut rx = connect(&session);
        assert!(session.send(&message));
        assert!(!session.send(&Message::get_events(ElementId::new("ghost"))));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_poll_only_while_connected() {
        let session = session();
        session.add_element("a", tracked("a").as_node());
        assert_eq!(session.poll_subscriptions(), 0);

        let mut rx = connect(&session);
        assert_eq!(session.poll_subscriptions(), 1);
        assert_eq!(session.poll_subscriptions(), 1);

        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.kind == RequestKind::GetEvents));
        assert!(sent.iter().all(|m| m.data == json!({})));
    }

    #[test]
    fn test_poll_skips_subscribed() {
        let session = session();
        let node = tracked("a");
        session.add_element("a", node.as_node());
        session.add_element("b", tracked("b").as_node());
        let mut rx = connect(&session);

        session
            .inner
            .router
            .dispatch(Message::event_list(ElementId::new("a"), vec!["click".into()]));
        assert_eq!(session.subscriptions(&ElementId::new("a")), Some(vec!["click".to_string()]));

        assert_eq!(session.poll_subscriptions(), 1);
        let sent = drain(&mut rx);
        assert_eq!(sent[0].element_id, ElementId::new("b"));
    }

    #[test]
    fn test_on_mutations_reports_values() {
        let session = session();
        let button = tracked("btn1");
        session.add_element("btn1", button.as_node());
        let mut rx = connect(&session);

        button.set_attribute("disabled", "").expect("set");
        let sent = session.on_mutations(&[MutationRecord::attributes(button.as_node(), "disabled")]);
        assert_eq!(sent, 1);

        let messages = drain(&mut rx);
        assert_eq!(messages[0].kind, RequestKind::GetPropValue);
        let payload: PropValue = messages[0].payload().expect("payload");
        assert_eq!(payload.prop_name, "disabled");
        assert_eq!(payload.prop_value, json!(""));
    }

    #[test]
    fn test_on_mutations_dropped_while_disconnected() {
        let session = session();
        let button = tracked("btn1");
        session.add_element("btn1", button.as_node());

        let sent = session.on_mutations(&[MutationRecord::attributes(button.as_node(), "class")]);
        assert_eq!(sent, 0);
    }

    #[test]
    fn test_stop_halts_reporting() {
        let session = session();
        let button = tracked("btn1");
        session.add_element("btn1", button.as_node());
        let mut rx = connect(&session);

        session.stop();
        assert!(!session.is_observing());
        assert_eq!(
            session.on_mutations(&[MutationRecord::attributes(button.as_node(), "class")]),
            0
        );
        assert!(drain(&mut rx).is_empty());
        assert!(session.is_connected());
    }

    #[test]
    fn test_child_list_retires_removed_elements() {
        let session = session();
        let body = tracked("body");
        let child = tracked("child");
        body.append_child(&child);
        session.add_element("body", body.as_node());
        session.add_element("child", child.as_node());

        child.detach();
        session.on_mutations(&[MutationRecord::child_list(body.as_node())]);

        assert!(session.contains(&ElementId::new("body")));
        assert!(!session.contains(&ElementId::new("child")));
        assert_eq!(session.element_count(), 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let session = session();
        assert!(session.start(1).expect("start"));
        assert!(!session.start(1).expect("start"));
        assert_eq!(session.inner.tasks.lock().len(), 2);

        session.shutdown();
        assert!(session.inner.tasks.lock().is_empty());
        assert_eq!(session.state(), LinkState::Disconnected);
    }

    #[test]
    fn test_start_outside_runtime_fails_cleanly() {
        let session = session();
        assert!(matches!(session.start(1), Err(Error::Config { .. })));
        assert!(session.inner.tasks.lock().is_empty());

        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        runtime.block_on(async {
            assert!(session.start(1).expect("start"));
            session.shutdown();
        });
    }

    #[tokio::test]
    async fn test_stalled_handshake_is_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let accepts = Arc::new(AtomicUsize::new(0));

        // Accepts TCP and never answers the upgrade.
        let counter = Arc::clone(&accepts);
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(stream);
            }
        });

        let config = ClientConfig::new()
            .with_reconnect_delay(Duration::from_millis(50))
            .with_connect_timeout(Duration::from_millis(100));
        let session = ClientSession::new(config).expect("session");
        session.start(port).expect("start");

        let deadline = Instant::now() + Duration::from_secs(3);
        while accepts.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            sleep(Duration::from_millis(10)).await;
        }

        assert!(accepts.load(Ordering::SeqCst) >= 2);
        assert!(!session.is_connected());

        session.shutdown();
        server.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_repair_tick_sends_one_request_per_element() {
        let period = Duration::from_millis(50);
        let session = ClientSession::new(ClientConfig::new().with_repair_interval(period))
            .expect("session");
        session.add_element("a", tracked("a").as_node());
        let mut rx = connect(&session);

        let repair = tokio::spawn(SessionInner::repair_loop(Arc::clone(&session.inner)));

        sleep(period * 3 + period / 2).await;
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 3);
        assert!(
            sent.iter()
                .all(|m| m.kind == RequestKind::GetEvents && m.element_id == ElementId::new("a"))
        );

        // Subscribed elements are no longer polled.
        session
            .inner
            .router
            .dispatch(Message::event_list(ElementId::new("a"), vec!["click".into()]));
        sleep(period * 3).await;
        assert!(drain(&mut rx).is_empty());

        repair.abort();
    }

    #[test]
    fn test_server_write_converges_without_echo() {
        let schema = Arc::new(
            ElementSchema::builder("MatSelect")
                .property(PropertyDescriptor::attribute("aria-label"))
                .build()
                .expect("schema"),
        );
        let server_link = Link::new();
        let (server_connection, mut to_client) = Connection::capture();
        server_link.attach(server_connection);
        let select = RemoteElement::new(ElementId::new("sel1"), schema, server_link);

        let session = session();
        let node = tracked("sel1");
        session.add_element("sel1", node.as_node());
        let mut to_server = connect(&session);

        assert!(select.set("aria-label", "Pick one").expect("set"));
        let writes = drain(&mut to_client);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].kind, RequestKind::SetPropValue);
        for message in writes {
            session.inner.router.dispatch(message);
        }
        assert_eq!(node.get_attribute("aria-label").as_deref(), Some("Pick one"));

        // The write shows up as an attribute mutation on the client.
        let sent = session.on_mutations(&[MutationRecord::attributes(node.as_node(), "aria-label")]);
        assert_eq!(sent, 1);

        let reports = drain(&mut to_server);
        assert_eq!(reports.len(), 1);
        for message in reports {
            let update: PropValue = message.payload().expect("payload");
            assert!(select.apply_value(update));
        }

        assert_eq!(
            select.get_as::<String>("aria-label").expect("get").as_deref(),
            Some("Pick one")
        );
        assert!(drain(&mut to_client).is_empty());
        assert!(drain(&mut to_server).is_empty());
    }
}
