//! Connection liveness state machine.
//!
//! A [`Link`] owns the current [`Connection`] slot and the liveness state
//! every send consults. Both the browser-side session and the server-side
//! peer route all outbound traffic through one.
//!
//! # States
//!
//! ```text
//! Disconnected ──begin_connect──► Connecting ──attach──► Connected
//!      ▲                              │                      │
//!      └────────────fail──────────────┘◄──────release────────┘
//! ```
//!
//! A server accepting connections moves straight from `Disconnected` to
//! `Connected` via [`Link::attach`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::identifiers::ConnectionId;
use crate::protocol::Message;

use super::Connection;

// ============================================================================
// LinkState
// ============================================================================

/// Liveness of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    /// No socket. Sends are dropped.
    #[default]
    Disconnected,
    /// Socket is being opened. Sends are dropped.
    Connecting,
    /// Socket is open.
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Link
// ============================================================================

/// Internal shared state of a link.
#[derive(Debug, Default)]
struct LinkInner {
    state: LinkState,
    connection: Option<Connection>,
}

/// Shared slot holding the live connection and its state.
///
/// Cheap to clone; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct Link {
    inner: Arc<Mutex<LinkInner>>,
}

impl Link {
    /// Creates a disconnected link.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.inner.lock().state
    }

    /// Returns `true` while a connection is attached.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Moves `Disconnected → Connecting`.
    ///
    /// Returns `false` and changes nothing from any other state.
    pub fn begin_connect(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != LinkState::Disconnected {
            return false;
        }
        inner.state = LinkState::Connecting;
        true
    }

    /// Attaches an open connection and moves to `Connected`.
    ///
    /// A previously attached connection is shut down: one logical peer per
    /// link.
    pub fn attach(&self, connection: Connection) {
        let previous = {
            let mut inner = self.inner.lock();
            inner.state = LinkState::Connected;
            inner.connection.replace(connection)
        };

        if let Some(previous) = previous {
            debug!(connection = %previous.id(), "Replacing previous connection");
            previous.shutdown();
        }
    }

    /// Detaches the connection with this identity, if it is still current.
    ///
    /// Returns `true` if the link moved to `Disconnected`. A stale release
    /// from a replaced connection is ignored.
    pub fn release(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock();
        let is_current = inner
            .connection
            .as_ref()
            .is_some_and(|connection| connection.id() == id);

        if !is_current {
            return false;
        }

        inner.connection = None;
        inner.state = LinkState::Disconnected;
        true
    }

    /// Records a failed connect attempt; moves to `Disconnected`.
    pub fn fail(&self) {
        let mut inner = self.inner.lock();
        inner.connection = None;
        inner.state = LinkState::Disconnected;
    }

    /// Shuts down any attached connection and moves to `Disconnected`.
    pub fn close(&self) {
        let previous = {
            let mut inner = self.inner.lock();
            inner.state = LinkState::Disconnected;
            inner.connection.take()
        };

        if let Some(connection) = previous {
            connection.shutdown();
        }
    }

    /// Sends a message over the attached connection.
    ///
    /// Returns `false` when not connected. Never blocks and never queues for
    /// later: a message sent while disconnected is dropped.
    pub fn send(&self, message: &Message) -> bool {
        let connection = {
            let inner = self.inner.lock();
            if inner.state != LinkState::Connected {
                debug!(kind = ?message.kind, element_id = %message.element_id, "Can't send to closed socket");
                return false;
            }
            match inner.connection.clone() {
                Some(connection) => connection,
                None => return false,
            }
        };

        match connection.send(message) {
            Ok(()) => true,
            Err(e) => {
                warn!(connection = %connection.id(), error = %e, "Send failed");
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::ElementId;
    use crate::transport::connection::ConnectionCommand;

    fn message() -> Message {
        Message::get_events(ElementId::new("a"))
    }

    #[test]
    fn test_initial_state() {
        let link = Link::new();
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(!link.is_connected());
    }

    #[test]
    fn test_begin_connect_only_from_disconnected() {
        let link = Link::new();
        assert!(link.begin_connect());
        assert_eq!(link.state(), LinkState::Connecting);
        assert!(!link.begin_connect());

        let (connection, _rx) = Connection::capture();
        link.attach(connection);
        assert!(!link.begin_connect());
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[test]
    fn test_fail_returns_to_disconnected() {
        let link = Link::new();
        link.begin_connect();
        link.fail();
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(link.begin_connect());
    }

    #[test]
    fn test_send_while_disconnected_is_dropped() {
        let link = Link::new();
        assert!(!link.send(&message()));

        link.begin_connect();
        assert!(!link.send(&message()));
    }

    #[test]
    fn test_send_while_connected() {
        let link = Link::new();
        let (connection, mut rx) = Connection::capture();
        link.attach(connection);

        assert!(link.send(&message()));
        assert!(matches!(rx.try_recv(), Ok(ConnectionCommand::Send(_))));
    }

    #[test]
    fn test_attach_replaces_and_shuts_down_previous() {
        let link = Link::new();
        let (first, mut first_rx) = Connection::capture();
        let (second, _second_rx) = Connection::capture();
        let first_id = first.id();

        link.attach(first);
        link.attach(second);

        assert!(matches!(first_rx.try_recv(), Ok(ConnectionCommand::Shutdown)));

        // Stale release from the replaced connection is ignored.
        assert!(!link.release(first_id));
        assert!(link.is_connected());
    }

    #[test]
    fn test_release_current() {
        let link = Link::new();
        let (connection, _rx) = Connection::capture();
        let id = connection.id();
        link.attach(connection);

        assert!(link.release(id));
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(!link.send(&message()));
    }

    #[test]
    fn test_close_shuts_down() {
        let link = Link::new();
        let (connection, mut rx) = Connection::capture();
        link.attach(connection);
        link.close();

        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(matches!(rx.try_recv(), Ok(ConnectionCommand::Shutdown)));
    }
}
