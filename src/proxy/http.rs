//! HTTP CONNECT client handshake

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::common::{Address, Result, Stream};
use crate::error::Error;

/// Upper bound on the proxy's response header block
const MAX_RESPONSE_HEADER: usize = 8 * 1024;

/// Ask the HTTP proxy at the other end of `stream` to tunnel to `destination`.
pub(super) async fn connect(
    mut stream: Stream,
    destination: &Address,
    credentials: Option<(&str, &str)>,
) -> Result<Stream> {
    let target = destination.to_string();

    // Build CONNECT request
    let mut request = format!("CONNECT {} HTTP/1.1\r\nHost: {}\r\n", target, target);

    if let Some((username, password)) = credentials {
        let encoded = BASE64.encode(format!("{}:{}", username, password));
        request.push_str(&format!("Proxy-Authorization: Basic {}\r\n", encoded));
    }

    request.push_str("\r\n");

    stream.write_all(request.as_bytes()).await?;

    // Read the header block byte by byte so no tunneled bytes are swallowed
    let header = read_response_header(&mut stream).await?;
    let status_line = header.lines().next().unwrap_or_default();

    let parts: Vec<&str> = status_line.split_whitespace().collect();
    if parts.len() < 2 || !parts[0].starts_with("HTTP/") {
        return Err(Error::Protocol("Invalid HTTP response".into()));
    }

    let status_code: u16 = parts[1]
        .parse()
        .map_err(|_| Error::Protocol("Invalid status code".into()))?;

    if status_code != 200 {
        return Err(Error::Protocol(format!(
            "HTTP CONNECT failed: {}",
            status_line.trim()
        )));
    }

    Ok(stream)
}

async fn read_response_header(stream: &mut Stream) -> Result<String> {
    let mut header = Vec::with_capacity(256);
    let mut byte = [0u8; 1];

    while !header.ends_with(b"\r\n\r\n") {
        if header.len() >= MAX_RESPONSE_HEADER {
            return Err(Error::Protocol("HTTP CONNECT response header too large".into()));
        }
        if stream.read(&mut byte).await? == 0 {
            return Err(Error::Protocol("Proxy closed connection during CONNECT".into()));
        }
        header.push(byte[0]);
    }

    Ok(String::from_utf8_lossy(&header).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_request(server: &mut tokio::io::DuplexStream) -> String {
        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while !request.ends_with(b"\r\n\r\n") {
            server.read_exact(&mut byte).await.unwrap();
            request.push(byte[0]);
        }
        String::from_utf8(request).unwrap()
    }

    #[tokio::test]
    async fn test_connect_with_basic_auth() {
        let (client, mut server) = tokio::io::duplex(1024);

        let proxy = tokio::spawn(async move {
            let request = read_request(&mut server).await;
            assert!(request.starts_with("CONNECT example:443 HTTP/1.1\r\n"));
            assert!(request.contains("Proxy-Authorization: Basic YWxpY2U6cHc=\r\n"));

            // Tunneled bytes arrive in the same segment as the header
            server
                .write_all(b"HTTP/1.1 200 Connection Established\r\nVia: test\r\n\r\nhello")
                .await
                .unwrap();
        });

        let destination = Address::domain("example", 443);
        let mut stream = connect(Box::new(client), &destination, Some(("alice", "pw")))
            .await
            .unwrap();

        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        proxy.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_ipv6_target_is_bracketed() {
        let (client, mut server) = tokio::io::duplex(1024);

        tokio::spawn(async move {
            let request = read_request(&mut server).await;
            assert!(request.starts_with("CONNECT [::1]:80 HTTP/1.1\r\n"));
            server.write_all(b"HTTP/1.0 200 OK\r\n\r\n").await.unwrap();
        });

        let destination = Address::parse("[::1]:80").unwrap();
        assert!(connect(Box::new(client), &destination, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let (client, mut server) = tokio::io::duplex(1024);

        tokio::spawn(async move {
            let _ = read_request(&mut server).await;
            server
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .await
                .unwrap();
        });

        let destination = Address::domain("example", 80);
        let err = connect(Box::new(client), &destination, None).await.err().unwrap();
        assert!(err.to_string().contains("407"));
    }
}
