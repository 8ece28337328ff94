//! TCP relay from the public dev-server port to the discovered UI.
//!
//! Each accepted connection dials the target and splices both directions
//! concurrently. When either direction finishes, both sockets are closed.
//! Per-connection failures never stop the listener.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

const BUFFER_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to bind relay on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Relay I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct TcpRelay {
    listener: TcpListener,
    target: String,
}

impl TcpRelay {
    /// Binds the listener now; `target` (`host:port`) is resolved per connection
    pub async fn bind(addr: SocketAddr, target: impl Into<String>) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Bind { addr, source })?;
        Ok(Self {
            listener,
            target: target.into(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the surrounding task is cancelled, which also
    /// tears down every open connection.
    pub async fn run(self) {
        let listen = self.listener.local_addr().ok();
        info!(listen = ?listen, target = %self.target, "Relay listening");

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((client, peer)) => {
                        debug!(peer = %peer, "Relay accepted connection");
                        let target = self.target.clone();
                        connections.spawn(async move {
                            match TcpStream::connect(&target).await {
                                Ok(upstream) => splice(client, upstream).await,
                                Err(e) => {
                                    warn!(target = %target, error = %e, "Relay target unreachable, closing client");
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Relay accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }
    }

    pub fn spawn(self) -> RelayHandle {
        let local_addr = self.listener.local_addr().ok();
        RelayHandle {
            local_addr,
            task: tokio::spawn(self.run()),
        }
    }
}

/// A running relay. Dropping it stops the listener and all connections.
pub struct RelayHandle {
    local_addr: Option<SocketAddr>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn pump<R, W>(mut reader: R, mut writer: W, direction: &'static str)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = writer.write_all(&buf[..n]).await {
                    debug!(direction, error = %e, "Relay write failed");
                    break;
                }
            }
            Err(e) => {
                debug!(direction, error = %e, "Relay read failed");
                break;
            }
        }
    }
}

async fn splice(mut client: TcpStream, mut upstream: TcpStream) {
    let (client_read, client_write) = client.split();
    let (upstream_read, upstream_write) = upstream.split();

    tokio::select! {
        _ = pump(client_read, upstream_write, "client->target") => {},
        _ = pump(upstream_read, client_write, "target->client") => {},
    }

    let _ = client.shutdown().await;
    let _ = upstream.shutdown().await;
    debug!("Relay connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let (mut r, mut w) = socket.split();
                    let _ = tokio::io::copy(&mut r, &mut w).await;
                });
            }
        });
        addr
    }

    async fn relay_to(target: String) -> RelayHandle {
        TcpRelay::bind("127.0.0.1:0".parse().unwrap(), target)
            .await
            .unwrap()
            .spawn()
    }

    #[tokio::test]
    async fn test_relay_mirrors_bytes() {
        let echo = echo_server().await;
        let relay = relay_to(echo.to_string()).await;

        let mut client = TcpStream::connect(relay.local_addr().unwrap()).await.unwrap();
        client.write_all(b"hello relay").await.unwrap();
        let mut buf = [0u8; 11];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello relay");
    }

    #[tokio::test]
    async fn test_relay_closes_client_when_target_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"bye").await.unwrap();
        });

        let relay = relay_to(target.to_string()).await;
        let mut client = TcpStream::connect(relay.local_addr().unwrap()).await.unwrap();
        let mut received = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, b"bye");
    }

    #[tokio::test]
    async fn test_unreachable_target_keeps_listener() {
        let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = unused.local_addr().unwrap();
        drop(unused);

        let relay = relay_to(dead.to_string()).await;
        for _ in 0..2 {
            let mut client = TcpStream::connect(relay.local_addr().unwrap()).await.unwrap();
            let mut buf = Vec::new();
            let read = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut buf)).await;
            assert!(matches!(read, Ok(Ok(0)) | Ok(Err(_))));
        }
    }

    #[tokio::test]
    async fn test_bind_conflict_is_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let err = TcpRelay::bind(addr, "127.0.0.1:1").await.err().unwrap();
        assert!(matches!(err, RelayError::Bind { .. }));
    }
}
