// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection acceptors for the interface server
//!
//! The server is generic over where clients come from: a TCP port, a
//! unix socket, or an in-process pair for tests. Accepted streams are
//! boxed so one server type serves them all.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::mpsc;

/// Byte stream both halves of the interface speak over
pub trait InterfaceStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> InterfaceStream for T {}

pub type BoundStream = Box<dyn InterfaceStream>;

/// Source of inbound client connections
#[async_trait]
pub trait Binding: Send {
    /// Wait for the next client
    async fn accept(&mut self) -> io::Result<BoundStream>;

    /// Human-readable address for logs
    fn local_addr(&self) -> String;
}

pub struct TcpBinding {
    listener: TcpListener,
}

impl TcpBinding {
    pub async fn bind(addr: &str) -> io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr).await?,
        })
    }

    pub fn local_port(&self) -> io::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }
}

#[async_trait]
impl Binding for TcpBinding {
    async fn accept(&mut self) -> io::Result<BoundStream> {
        let (stream, peer) = self.listener.accept().await?;
        tracing::debug!(%peer, "interface client connected");
        Ok(Box::new(stream))
    }

    fn local_addr(&self) -> String {
        self.listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "tcp:?".to_string())
    }
}

pub struct UnixBinding {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixBinding {
    pub fn bind(path: &Path) -> io::Result<Self> {
        Ok(Self {
            listener: UnixListener::bind(path)?,
            path: path.to_path_buf(),
        })
    }
}

#[async_trait]
impl Binding for UnixBinding {
    async fn accept(&mut self) -> io::Result<BoundStream> {
        let (stream, _) = self.listener.accept().await?;
        tracing::debug!(path = %self.path.display(), "interface client connected");
        Ok(Box::new(stream))
    }

    fn local_addr(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process binding for tests. Hand the connector to the code under
/// test and open as many client streams as needed.
pub struct NullBinding {
    incoming: mpsc::UnboundedReceiver<DuplexStream>,
}

#[derive(Clone)]
pub struct NullConnector {
    sender: mpsc::UnboundedSender<DuplexStream>,
}

impl NullBinding {
    pub fn new() -> (Self, NullConnector) {
        let (sender, incoming) = mpsc::unbounded_channel();
        (Self { incoming }, NullConnector { sender })
    }
}

impl NullConnector {
    /// Open a new in-process connection, returning the client half
    pub fn connect(&self) -> io::Result<DuplexStream> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        self.sender
            .send(server)
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "binding dropped"))?;
        Ok(client)
    }
}

#[async_trait]
impl Binding for NullBinding {
    async fn accept(&mut self) -> io::Result<BoundStream> {
        match self.incoming.recv().await {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "all connectors dropped",
            )),
        }
    }

    fn local_addr(&self) -> String {
        "null".to_string()
    }
}
