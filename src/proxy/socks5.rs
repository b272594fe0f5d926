//! SOCKS5 client handshake (RFC 1928, RFC 1929 auth)

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::common::{Address, Result, Stream};
use crate::error::Error;

const SOCKS5_VERSION: u8 = 0x05;
const AUTH_NONE: u8 = 0x00;
const AUTH_PASSWORD: u8 = 0x02;
const AUTH_NO_ACCEPTABLE: u8 = 0xFF;
const AUTH_PASSWORD_VERSION: u8 = 0x01;

const CMD_CONNECT: u8 = 0x01;

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

const REP_SUCCESS: u8 = 0x00;
const REP_GENERAL_FAILURE: u8 = 0x01;
const REP_NOT_ALLOWED: u8 = 0x02;
const REP_NETWORK_UNREACHABLE: u8 = 0x03;
const REP_HOST_UNREACHABLE: u8 = 0x04;
const REP_CONNECTION_REFUSED: u8 = 0x05;
const REP_TTL_EXPIRED: u8 = 0x06;
const REP_CMD_NOT_SUPPORTED: u8 = 0x07;
const REP_ATYP_NOT_SUPPORTED: u8 = 0x08;

/// Ask the SOCKS5 proxy at the other end of `stream` to CONNECT to `destination`.
pub(super) async fn connect(
    mut stream: Stream,
    destination: &Address,
    credentials: Option<(&str, &str)>,
) -> Result<Stream> {
    // 1. Send greeting
    let auth_method = if credentials.is_some() {
        AUTH_PASSWORD
    } else {
        AUTH_NONE
    };
    stream.write_all(&[SOCKS5_VERSION, 1, auth_method]).await?;

    // 2. Read server's selected method
    let mut response = [0u8; 2];
    stream.read_exact(&mut response).await?;

    if response[0] != SOCKS5_VERSION {
        return Err(Error::Protocol("Invalid SOCKS version from server".into()));
    }

    if response[1] == AUTH_NO_ACCEPTABLE {
        return Err(Error::Protocol("Server rejected auth methods".into()));
    }

    // 3. Handle authentication
    if response[1] == AUTH_PASSWORD {
        let (username, password) = credentials.ok_or_else(|| {
            Error::Protocol("proxy selected an auth method that was not offered".into())
        })?;
        if username.len() > 255 || password.len() > 255 {
            return Err(Error::Config("SOCKS5 credentials longer than 255 bytes".into()));
        }

        let mut auth_request = Vec::with_capacity(3 + username.len() + password.len());
        auth_request.push(AUTH_PASSWORD_VERSION);
        auth_request.push(username.len() as u8);
        auth_request.extend_from_slice(username.as_bytes());
        auth_request.push(password.len() as u8);
        auth_request.extend_from_slice(password.as_bytes());

        stream.write_all(&auth_request).await?;

        let mut auth_response = [0u8; 2];
        stream.read_exact(&mut auth_response).await?;

        if auth_response[1] != 0x00 {
            return Err(Error::Protocol("Authentication failed".into()));
        }
    } else if response[1] != AUTH_NONE {
        return Err(Error::Protocol(format!(
            "Server selected unsupported auth method {}",
            response[1]
        )));
    }

    // 4. Send connect request
    stream.write_all(&connect_request(destination)?).await?;

    // 5. Read response
    let mut response = [0u8; 4];
    stream.read_exact(&mut response).await?;

    if response[0] != SOCKS5_VERSION {
        return Err(Error::Protocol("Invalid SOCKS version in response".into()));
    }

    if response[1] != REP_SUCCESS {
        let err_msg = match response[1] {
            REP_GENERAL_FAILURE => "General failure",
            REP_NOT_ALLOWED => "Connection not allowed",
            REP_NETWORK_UNREACHABLE => "Network unreachable",
            REP_HOST_UNREACHABLE => "Host unreachable",
            REP_CONNECTION_REFUSED => "Connection refused",
            REP_TTL_EXPIRED => "TTL expired",
            REP_CMD_NOT_SUPPORTED => "Command not supported",
            REP_ATYP_NOT_SUPPORTED => "Address type not supported",
            _ => "Unknown error",
        };
        return Err(Error::Protocol(format!("SOCKS5 error: {}", err_msg)));
    }

    // Skip bound address
    match response[3] {
        ATYP_IPV4 => {
            let mut skip = [0u8; 6];
            stream.read_exact(&mut skip).await?;
        }
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            let mut skip = vec![0u8; len[0] as usize + 2];
            stream.read_exact(&mut skip).await?;
        }
        ATYP_IPV6 => {
            let mut skip = [0u8; 18];
            stream.read_exact(&mut skip).await?;
        }
        atyp => {
            return Err(Error::Protocol(format!(
                "Unsupported bound address type: {}",
                atyp
            )));
        }
    }

    Ok(stream)
}

fn connect_request(destination: &Address) -> Result<Vec<u8>> {
    let mut request = vec![SOCKS5_VERSION, CMD_CONNECT, 0x00];

    match destination {
        Address::Socket(SocketAddr::V4(v4)) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&v4.ip().octets());
            request.extend_from_slice(&v4.port().to_be_bytes());
        }
        Address::Socket(SocketAddr::V6(v6)) => {
            request.push(ATYP_IPV6);
            request.extend_from_slice(&v6.ip().octets());
            request.extend_from_slice(&v6.port().to_be_bytes());
        }
        Address::Domain(domain, port) => {
            if domain.len() > 255 {
                return Err(Error::InvalidAddress(format!("domain too long: {}", domain)));
            }
            request.push(ATYP_DOMAIN);
            request.push(domain.len() as u8);
            request.extend_from_slice(domain.as_bytes());
            request.extend_from_slice(&port.to_be_bytes());
        }
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_request_encoding() {
        let request = connect_request(&Address::parse("10.0.0.1:80").unwrap()).unwrap();
        assert_eq!(request, [5, 1, 0, ATYP_IPV4, 10, 0, 0, 1, 0, 80]);

        let request = connect_request(&Address::domain("example", 443)).unwrap();
        assert_eq!(&request[..5], &[5, 1, 0, ATYP_DOMAIN, 7]);
        assert_eq!(&request[5..12], b"example");
        assert_eq!(&request[12..], &443u16.to_be_bytes());
    }

    #[tokio::test]
    async fn test_handshake_with_password() {
        let (client, mut server) = tokio::io::duplex(1024);

        let proxy = tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            server.read_exact(&mut greeting).await.unwrap();
            assert_eq!(greeting, [SOCKS5_VERSION, 1, AUTH_PASSWORD]);
            server.write_all(&[SOCKS5_VERSION, AUTH_PASSWORD]).await.unwrap();

            let mut auth = [0u8; 1 + 1 + 5 + 1 + 2];
            server.read_exact(&mut auth).await.unwrap();
            assert_eq!(&auth[2..7], b"alice");
            assert_eq!(&auth[8..], b"pw");
            server.write_all(&[AUTH_PASSWORD_VERSION, 0x00]).await.unwrap();

            let mut request = [0u8; 10];
            server.read_exact(&mut request).await.unwrap();
            assert_eq!(request[1], CMD_CONNECT);
            server
                .write_all(&[SOCKS5_VERSION, REP_SUCCESS, 0, ATYP_IPV4, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();

            server.write_all(b"tunnel").await.unwrap();
        });

        let destination = Address::parse("10.0.0.1:80").unwrap();
        let mut stream = connect(Box::new(client), &destination, Some(("alice", "pw")))
            .await
            .unwrap();

        let mut buf = [0u8; 6];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"tunnel");
        proxy.await.unwrap();
    }

    #[tokio::test]
    async fn test_password_auth_not_offered() {
        let (client, mut server) = tokio::io::duplex(1024);

        tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            server.read_exact(&mut greeting).await.unwrap();
            assert_eq!(greeting, [SOCKS5_VERSION, 1, AUTH_NONE]);
            server.write_all(&[SOCKS5_VERSION, AUTH_PASSWORD]).await.unwrap();
            let mut rest = Vec::new();
            let _ = server.read_to_end(&mut rest).await;
            assert!(rest.is_empty());
        });

        let destination = Address::parse("10.0.0.1:80").unwrap();
        let err = connect(Box::new(client), &destination, None).await.err().unwrap();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("not offered"));
    }

    #[tokio::test]
    async fn test_handshake_reports_refusal() {
        let (client, mut server) = tokio::io::duplex(1024);

        tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            server.read_exact(&mut greeting).await.unwrap();
            server.write_all(&[SOCKS5_VERSION, AUTH_NONE]).await.unwrap();

            let mut request = [0u8; 10];
            server.read_exact(&mut request).await.unwrap();
            server
                .write_all(&[SOCKS5_VERSION, REP_CONNECTION_REFUSED, 0, ATYP_IPV4, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let destination = Address::parse("10.0.0.1:80").unwrap();
        let err = connect(Box::new(client), &destination, None).await.err().unwrap();
        assert!(err.to_string().contains("Connection refused"));
    }
}
