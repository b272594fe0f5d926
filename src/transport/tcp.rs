//! TCP Transport implementation

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use tokio::net::{TcpSocket, TcpStream};
use tracing::debug;

use crate::common::{AddrFamily, Address, Result, Stream};
use crate::error::Error;

use super::Transport;

/// TCP transport - raw TCP connections
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    family: AddrFamily,
    local_addr: Option<IpAddr>,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: only connect to addresses of this family
    pub fn with_family(mut self, family: AddrFamily) -> Self {
        self.family = family;
        self
    }

    /// Builder: bind outgoing sockets to this local IP
    pub fn with_local_addr(mut self, local_addr: Option<IpAddr>) -> Self {
        self.local_addr = local_addr;
        self
    }

    async fn connect_one(&self, target: SocketAddr) -> std::io::Result<TcpStream> {
        let socket = if target.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        if let Some(ip) = self.local_addr {
            socket.bind(SocketAddr::new(ip, 0))?;
        }

        let stream = socket.connect(target).await?;

        // Disable Nagle's algorithm for lower latency
        stream.set_nodelay(true)?;

        Ok(stream)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, addr: &Address) -> Result<Stream> {
        let mut last_err = None;

        for target in addr.resolve(self.family).await? {
            match self.connect_one(target).await {
                Ok(stream) => return Ok(Box::new(stream)),
                Err(e) => {
                    debug!("TCP connect to {} failed: {}", target, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .map(Error::Io)
            .unwrap_or_else(|| Error::InvalidAddress(addr.to_string())))
    }
}
