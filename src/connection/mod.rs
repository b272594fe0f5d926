//! Connection Layer
//!
//! A `Connection` is what traffic-generating jobs hold on to: they hand it
//! packets and never learn which transport sits underneath.
//!
//! Two transports implement it:
//! - `raw`: raw IP socket. Each packet carries its own destination
//!   (`Packet::ip`), so one connection can reach many hosts.
//! - `net`: a socket dialed once to a fixed remote address, directly or via
//!   a proxy, optionally wrapped in TLS.
//!
//! A connection is driven by one task at a time; the `&mut self` receivers
//! keep its serialization buffer single-writer.

mod net;
#[cfg(unix)]
mod raw;

pub use net::NetConnection;
#[cfg(unix)]
pub use raw::RawConnection;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{ConnectionConfig, NetConnConfig, RawConnConfig, NET, RAW};
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::proxy::{self, Dialer};

/// Uniform send/receive handle over a concrete transport
#[async_trait]
pub trait Connection: Send {
    /// Serialize `packet` and send it. Returns the number of bytes accepted.
    ///
    /// A serialization failure sends nothing and leaves the connection usable.
    async fn write(&mut self, packet: &dyn Packet) -> Result<usize>;

    /// Read response bytes into `buf`.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release the underlying socket.
    async fn close(self: Box<Self>) -> Result<()>;

    /// `protocol://address` label fixed when the connection was opened
    fn target(&self) -> &str;
}

/// Open the connection described by `config`.
///
/// Dialed connections resolve their dial capability from the proxy
/// parameters: the config-level ones first, then those in the arguments.
/// The returned future can be dropped or wrapped in `tokio::time::timeout`
/// to abandon a pending dial or handshake.
pub async fn open_connection(config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
    open(config, None).await
}

/// Open the connection described by `config`, dialing through `dialer`.
pub async fn open_connection_with(
    config: &ConnectionConfig,
    dialer: &dyn Dialer,
) -> Result<Box<dyn Connection>> {
    open(config, Some(dialer)).await
}

async fn open(config: &ConnectionConfig, dialer: Option<&dyn Dialer>) -> Result<Box<dyn Connection>> {
    match config.kind.as_str() {
        RAW => {
            let args: RawConnConfig = config.decode_args(RAW)?;
            open_raw(&args)
        }
        NET => {
            let args: NetConnConfig = config.decode_args(NET)?;
            let conn = match dialer {
                Some(dialer) => NetConnection::open(&args, dialer).await?,
                None => {
                    let params = config
                        .proxy
                        .as_ref()
                        .or(args.proxy.as_ref())
                        .cloned()
                        .unwrap_or_default();
                    let dialer = proxy::dialer(&params)?;
                    NetConnection::open(&args, dialer.as_ref()).await?
                }
            };
            Ok(Box::new(conn))
        }
        other => {
            debug!("rejecting connection config of type {:?}", other);
            Err(Error::UnknownType(other.to_string()))
        }
    }
}

#[cfg(unix)]
fn open_raw(args: &RawConnConfig) -> Result<Box<dyn Connection>> {
    Ok(Box::new(RawConnection::open(args)?))
}

#[cfg(not(unix))]
fn open_raw(_args: &RawConnConfig) -> Result<Box<dyn Connection>> {
    Err(Error::Unsupported("raw IP sockets on this platform".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_type_is_config_error() {
        let config = ConnectionConfig::from_json(r#"{"type": "quic", "args": {}}"#).unwrap();
        match open_connection(&config).await {
            Err(Error::UnknownType(kind)) => assert_eq!(kind, "quic"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("unknown type produced a connection"),
        }
    }

    #[tokio::test]
    async fn test_empty_type_is_config_error() {
        let config = ConnectionConfig::default();
        let err = open_connection(&config).await.err().unwrap();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_malformed_net_args_is_decode_error() {
        let config =
            ConnectionConfig::from_json(r#"{"type": "net", "args": {"protocol": "tcp"}}"#).unwrap();
        match open_connection(&config).await {
            Err(Error::Decode { shape, .. }) => assert_eq!(shape, NET),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("malformed args produced a connection"),
        }
    }

    #[tokio::test]
    async fn test_malformed_raw_args_is_decode_error() {
        let config =
            ConnectionConfig::from_json(r#"{"type": "raw", "args": {"name": 4}}"#).unwrap();
        let err = open_connection(&config).await.err().unwrap();
        assert!(matches!(err, Error::Decode { shape: RAW, .. }));
    }

    #[tokio::test]
    async fn test_bad_proxy_url_fails_before_dialing() {
        let config = ConnectionConfig::from_json(
            r#"{"type": "net", "args": {"protocol": "tcp", "address": "127.0.0.1:9"},
                "proxy": {"urls": ["gopher://127.0.0.1:70"]}}"#,
        )
        .unwrap();
        let err = open_connection(&config).await.err().unwrap();
        assert!(err.is_config());
    }
}
