//! UDP Transport implementation
//!
//! UDP is connectionless; a connected socket is exposed as a stream where
//! every write is sent as one datagram and every read returns one datagram.

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::UdpSocket;

use crate::common::{AddrFamily, Address, Result, Stream};

use super::Transport;

/// UDP transport
#[derive(Debug, Clone, Default)]
pub struct UdpTransport {
    family: AddrFamily,
    local_addr: Option<IpAddr>,
}

impl UdpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: only connect to addresses of this family
    pub fn with_family(mut self, family: AddrFamily) -> Self {
        self.family = family;
        self
    }

    /// Builder: bind the socket to this local IP
    pub fn with_local_addr(mut self, local_addr: Option<IpAddr>) -> Self {
        self.local_addr = local_addr;
        self
    }

    fn bind_addr(&self, target: &SocketAddr) -> SocketAddr {
        let ip = self.local_addr.unwrap_or(if target.is_ipv4() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        });
        SocketAddr::new(ip, 0)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn connect(&self, addr: &Address) -> Result<Stream> {
        // No handshake to fail on, so the first resolved address wins
        let target = addr.resolve(self.family).await?[0];

        let socket = UdpSocket::bind(self.bind_addr(&target)).await?;
        socket.connect(target).await?;

        Ok(Box::new(UdpStream::new(socket)))
    }
}

/// UDP stream wrapper to implement AsyncRead + AsyncWrite
///
/// Each read returns at most one datagram; bytes that do not fit the
/// caller's buffer are discarded, like a read on a connected UDP socket.
pub struct UdpStream {
    socket: UdpSocket,
}

impl UdpStream {
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }
}

impl AsyncRead for UdpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.socket.poll_recv(cx, buf)
    }
}

impl AsyncWrite for UdpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.socket.poll_send(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_each_write_is_one_datagram() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = peer.local_addr().unwrap();

        let mut stream = UdpTransport::new().connect(&addr.into()).await.unwrap();
        stream.write_all(b"first").await.unwrap();
        stream.write_all(b"second").await.unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"first");
        let (n, _) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"second");

        peer.send_to(b"reply", from).await.unwrap();
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"reply");
    }

    #[tokio::test]
    async fn test_short_read_truncates_datagram() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = peer.local_addr().unwrap();

        let mut stream = UdpTransport::new().connect(&addr.into()).await.unwrap();
        stream.write_all(b"x").await.unwrap();
        let mut hello = [0u8; 8];
        let (_, from) = peer.recv_from(&mut hello).await.unwrap();

        peer.send_to(b"abcdef", from).await.unwrap();
        peer.send_to(b"gh", from).await.unwrap();

        let mut small = [0u8; 4];
        let n = stream.read(&mut small).await.unwrap();
        assert_eq!(&small[..n], b"abcd");
        let n = stream.read(&mut small).await.unwrap();
        assert_eq!(&small[..n], b"gh");
    }
}
