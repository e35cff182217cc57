//! WebSocket listener for the server-side peer.
//!
//! # Connection Flow
//!
//! 1. Bind to `ip:port` (port 0 picks a random one)
//! 2. Accept a TCP connection
//! 3. Upgrade to WebSocket, rejecting any request path other than the
//!    configured one with `404 Not Found`

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Listener
// ============================================================================

/// A bound TCP listener serving one WebSocket path.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use domsync::transport::Listener;
///
/// let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, "/UiHandler").await?;
/// let (stream, addr) = listener.accept().await?;
/// let ws_stream = Listener::upgrade(stream, listener.path()).await?;
/// ```
#[derive(Debug)]
pub struct Listener {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Address the listener is bound to.
    local_addr: SocketAddr,
    /// Accepted WebSocket path.
    path: String,
}

impl Listener {
    /// Binds to the specified address and port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16, path: impl Into<String>) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let local_addr = listener.local_addr()?;

        debug!(port = local_addr.port(), "WebSocket listener bound");

        Ok(Self {
            listener,
            local_addr,
            path: path.into(),
        })
    }

    /// Returns the port the listener is bound to.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the bound socket address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the accepted WebSocket path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the URL clients should dial.
    ///
    /// Format: `ws://{ip}:{port}{path}`
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.local_addr, self.path)
    }

    /// Accepts the next TCP connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if accepting fails.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        Ok(self.listener.accept().await?)
    }

    /// Performs the WebSocket upgrade, accepting only `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the handshake fails or the request
    /// targets another path.
    pub async fn upgrade(stream: TcpStream, path: &str) -> Result<WebSocketStream<TcpStream>> {
        let expected = path.to_string();
        let check_path = move |request: &Request, response: Response| {
            if request.uri().path() == expected {
                return Ok(response);
            }

            let mut rejection: ErrorResponse =
                ErrorResponse::new(Some(format!("unknown path {}", request.uri().path())));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        };

        tokio_tungstenite::accept_hdr_async(stream, check_path)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_bind_random_port() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, "/UiHandler")
            .await
            .expect("bind should succeed");

        assert!(listener.port() > 0);
        assert_eq!(
            listener.ws_url(),
            format!("ws://127.0.0.1:{}/UiHandler", listener.port())
        );
    }

    #[tokio::test]
    async fn test_upgrade_accepts_configured_path() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, "/UiHandler")
            .await
            .expect("bind");
        let url = listener.ws_url();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            Listener::upgrade(stream, "/UiHandler").await.is_ok()
        });

        let client = tokio_tungstenite::connect_async(url.as_str()).await;
        assert!(client.is_ok());
        assert!(server.await.expect("join"));
    }

    #[tokio::test]
    async fn test_upgrade_rejects_other_path() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, "/UiHandler")
            .await
            .expect("bind");
        let url = format!("ws://{}/elsewhere", listener.local_addr());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            Listener::upgrade(stream, "/UiHandler").await.is_ok()
        });

        let client = tokio_tungstenite::connect_async(url.as_str()).await;
        assert!(client.is_err());
        assert!(!server.await.expect("join"));
    }
}
