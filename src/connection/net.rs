//! Dialed stream/datagram connection, optionally TLS-wrapped

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::common::{Address, Stream};
use crate::config::NetConnConfig;
use crate::error::{Error, Result};
use crate::packet::{Packet, SerializeBuffer};
use crate::proxy::Dialer;
use crate::session::TlsSession;

use super::Connection;

/// Connection to one fixed remote endpoint
pub struct NetConnection {
    stream: Stream,
    buf: SerializeBuffer,
    target: String,
}

impl NetConnection {
    /// Dial `config.address` through `dialer`, then run the TLS handshake
    /// when TLS is configured. Returns only once the connection is usable.
    pub async fn open(config: &NetConnConfig, dialer: &dyn Dialer) -> Result<Self> {
        let target = format!("{}://{}", config.protocol, config.address);

        // Built before dialing so a bad TLS config never leaves a socket behind
        let session = config
            .tls_client_config
            .clone()
            .map(TlsSession::new)
            .transpose()?;

        let stream = bounded(config.timeout, dialer.dial(&config.protocol, &config.address))
            .await
            .map_err(|e| Error::Dial {
                target: target.clone(),
                source: Box::new(e),
            })?;

        let stream = match session {
            None => stream,
            Some(session) => {
                let host = Address::parse(&config.address)
                    .map(|addr| addr.host())
                    .unwrap_or_else(|_| config.address.clone());

                let handshake = session.handshake(stream, &host);
                let result = match config.timeout {
                    Some(limit) => tokio::time::timeout(limit, handshake)
                        .await
                        .unwrap_or_else(|_| {
                            Err(std::io::Error::new(
                                std::io::ErrorKind::TimedOut,
                                "TLS handshake timed out",
                            ))
                        }),
                    None => handshake.await,
                };

                result.map_err(|source| Error::Handshake {
                    target: target.clone(),
                    source,
                })?
            }
        };

        debug!("opened connection to {}", target);

        Ok(Self {
            stream,
            buf: SerializeBuffer::new(),
            target,
        })
    }
}

async fn bounded<T>(
    timeout: Option<Duration>,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout)?,
        None => fut.await,
    }
}

#[async_trait]
impl Connection for NetConnection {
    async fn write(&mut self, packet: &dyn Packet) -> Result<usize> {
        let bytes = self.buf.encode(packet)?;
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(bytes.len())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.stream.read(buf).await?)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let NetConnection {
            mut stream, target, ..
        } = *self;
        debug!("closing connection to {}", target);
        stream.shutdown().await?;
        Ok(())
    }

    fn target(&self) -> &str {
        &self.target
    }
}
