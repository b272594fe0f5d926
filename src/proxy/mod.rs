//! Dial capability
//!
//! A `Dialer` turns `(network, address)` into an established `Stream`,
//! either directly or through a proxy. Connections only ever see the
//! resulting stream; whether it traverses a proxy is decided here.

mod http;
mod socks5;
mod url;

pub use url::{ProxyScheme, ProxyUrl};

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, trace};

use crate::common::{Address, Network, Result, Stream};
use crate::error::Error;
use crate::transport::{TcpTransport, Transport, UdpTransport};

/// Proxy parameters attached to a connection config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyParams {
    /// Proxy URLs, one is picked at random per dial. A comma-separated
    /// string is accepted as well as a list.
    #[serde(default, alias = "URLs", deserialize_with = "string_or_list")]
    pub urls: Vec<String>,

    /// Local IP to bind outgoing sockets to
    #[serde(default, alias = "LocalAddr")]
    pub local_addr: Option<String>,

    /// Upper bound for establishing a connection
    #[serde(default, alias = "Timeout", with = "crate::config::duration")]
    pub timeout: Option<Duration>,
}

impl ProxyParams {
    fn parse_local_addr(&self) -> Result<Option<IpAddr>> {
        let Some(local) = self.local_addr.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        if let Ok(ip) = local.parse::<IpAddr>() {
            return Ok(Some(ip));
        }

        local
            .parse::<SocketAddr>()
            .map(|addr| Some(addr.ip()))
            .map_err(|_| Error::Config(format!("Invalid local address: {}", local)))
    }
}

/// Establishes streams to `(network, address)` pairs
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Dial `address` (`host:port`) over `network` (`tcp`, `udp6`, ...)
    async fn dial(&self, network: &str, address: &str) -> Result<Stream>;
}

/// Resolve proxy parameters into a dial capability
pub fn dialer(params: &ProxyParams) -> Result<Box<dyn Dialer>> {
    let local_addr = params.parse_local_addr()?;
    let direct = DirectDialer {
        local_addr,
        timeout: params.timeout,
    };

    let proxies = params
        .urls
        .iter()
        .filter(|u| !u.trim().is_empty())
        .map(|u| ProxyUrl::parse(u.trim()))
        .collect::<Result<Vec<_>>>()?;

    if proxies.is_empty() {
        return Ok(Box::new(direct));
    }

    Ok(Box::new(ProxyDialer { proxies, direct }))
}

/// Dials destinations directly
#[derive(Debug, Clone, Default)]
pub struct DirectDialer {
    local_addr: Option<IpAddr>,
    timeout: Option<Duration>,
}

impl DirectDialer {
    pub fn new() -> Self {
        Self::default()
    }

    async fn dial_direct(&self, network: &str, address: &Address) -> Result<Stream> {
        let (network, family) = Network::parse(network)?;
        match network {
            Network::Tcp => {
                TcpTransport::new()
                    .with_family(family)
                    .with_local_addr(self.local_addr)
                    .connect(address)
                    .await
            }
            Network::Udp => {
                UdpTransport::new()
                    .with_family(family)
                    .with_local_addr(self.local_addr)
                    .connect(address)
                    .await
            }
        }
    }
}

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, network: &str, address: &str) -> Result<Stream> {
        let address = Address::parse(address)?;
        debug!("dialing {}://{}", network, address);
        with_timeout(self.timeout, self.dial_direct(network, &address)).await
    }
}

/// Dials destinations through one of a set of proxies
#[derive(Debug, Clone)]
pub struct ProxyDialer {
    proxies: Vec<ProxyUrl>,
    direct: DirectDialer,
}

impl ProxyDialer {
    async fn dial_via(&self, proxy: &ProxyUrl, destination: &Address) -> Result<Stream> {
        let stream = self
            .direct
            .dial_direct("tcp", &proxy.address)
            .await
            .map_err(|e| Error::Proxy(format!("connecting to proxy {}: {}", proxy, e)))?;

        trace!("negotiating {} with proxy {}", destination, proxy);
        match proxy.scheme {
            ProxyScheme::Socks5 => socks5::connect(stream, destination, proxy.credentials()).await,
            ProxyScheme::Http => http::connect(stream, destination, proxy.credentials()).await,
        }
    }
}

#[async_trait]
impl Dialer for ProxyDialer {
    async fn dial(&self, network: &str, address: &str) -> Result<Stream> {
        let (network_kind, _) = Network::parse(network)?;
        if network_kind != Network::Tcp {
            return Err(Error::Unsupported(format!("{} through a proxy", network)));
        }

        let destination = Address::parse(address)?;
        let proxy = self
            .proxies
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| Error::Config("no proxies configured".into()))?;

        debug!("dialing {}://{} via {}", network, destination, proxy);
        with_timeout(self.direct.timeout, self.dial_via(proxy, &destination)).await
    }
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout)?,
        None => fut.await,
    }
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        String(String),
        List(Vec<String>),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        StringOrList::List(list) => list,
    })
}
