//! Single-use TCP listener for the player connection
//!
//! A session expects exactly one debuggee. The listener binds, accepts
//! one connection and is dropped immediately, so a second connection
//! attempt on the same port is refused. The accept is cancellable
//! through the session shutdown signal instead of blocking forever.

use crate::error::{Error, Result};
use socket2::{SockRef, TcpKeepalive};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const KEEPALIVE_TIME_SECS: u64 = 30;
const KEEPALIVE_INTERVAL_SECS: u64 = 10;

pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind on all interfaces when `listen_publicly` is set, otherwise
    /// on loopback only.
    pub async fn bind(listen_publicly: bool, port: u16) -> Result<Self> {
        let host = if listen_publicly {
            Ipv4Addr::UNSPECIFIED
        } else {
            Ipv4Addr::LOCALHOST
        };
        let addr = SocketAddr::from((host, port));
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Communication(format!("failed to listen on {}: {}", addr, e)))?;
        let local_addr = inner.local_addr()?;
        info!(addr = %local_addr, "Listening for player connection");
        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept exactly one connection, then stop listening.
    ///
    /// Consumes the listener so the port is released as soon as the
    /// player is connected. Returns a communication error when the
    /// shutdown signal fires first.
    pub async fn accept_one(self, mut shutdown: watch::Receiver<bool>) -> Result<TcpStream> {
        let stream = tokio::select! {
            accepted = self.inner.accept() => {
                let (stream, peer) = accepted?;
                info!(peer = %peer, "Player connected");
                stream
            }
            _ = shutdown.wait_for(|stopped| *stopped) => {
                debug!("Accept cancelled by session shutdown");
                return Err(Error::Communication(
                    "session shut down while waiting for player connection".to_string(),
                ));
            }
        };

        configure_player_socket(&stream);
        Ok(stream)
    }
}

/// Low latency and dead-connection detection on the accepted socket
fn configure_player_socket(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }

    let socket = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(KEEPALIVE_TIME_SECS))
        .with_interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECS));
    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        warn!("Failed to set TCP keep-alive: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_shutdown() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        // Keep the sender alive for the duration of the test
        std::mem::forget(tx);
        rx
    }

    #[tokio::test]
    async fn test_accepts_exactly_one_connection() {
        let listener = Listener::bind(false, 0).await.unwrap();
        let addr = listener.local_addr();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await });
        let accepted = listener.accept_one(no_shutdown()).await.unwrap();
        assert!(accepted.peer_addr().is_ok());
        client.await.unwrap().unwrap();

        // Listener is gone: a second connection on the same port is refused
        let second = TcpStream::connect(addr).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_loopback_bind_uses_loopback_address() {
        let listener = Listener::bind(false, 0).await.unwrap();
        assert!(listener.local_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_public_bind_uses_wildcard_address() {
        let listener = Listener::bind(true, 0).await.unwrap();
        assert!(listener.local_addr().ip().is_unspecified());
    }

    #[tokio::test]
    async fn test_accept_cancelled_by_shutdown() {
        let listener = Listener::bind(false, 0).await.unwrap();
        let (tx, rx) = watch::channel(false);

        let accept = tokio::spawn(listener.accept_one(rx));
        tx.send(true).unwrap();

        let result = accept.await.unwrap();
        assert!(matches!(result, Err(Error::Communication(_))));
    }
}
