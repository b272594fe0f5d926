//! Address type for network connections

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{Error, Result};

use super::AddrFamily;

/// Network address representation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// IP socket address (IP + port)
    Socket(SocketAddr),
    /// Domain name with port
    Domain(String, u16),
}

impl Address {
    /// Create from domain and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        Address::Domain(domain.into(), port)
    }

    /// Parse a `host:port` string. IPv6 hosts must be bracketed; an empty
    /// host means the local system.
    pub fn parse(s: &str) -> Result<Self> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Address::Socket(addr));
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidAddress(format!("missing port in address {}", s)))?;

        let port: u16 = port
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid port in address {}", s)))?;

        let host = if let Some(inner) = host.strip_prefix('[') {
            inner
                .strip_suffix(']')
                .ok_or_else(|| Error::InvalidAddress(format!("missing ']' in address {}", s)))?
        } else if host.contains(':') {
            return Err(Error::InvalidAddress(format!("too many colons in address {}", s)));
        } else {
            host
        };

        if host.is_empty() {
            return Ok(Address::Socket(SocketAddr::new(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                port,
            )));
        }

        match host.parse::<IpAddr>() {
            Ok(ip) => Ok(Address::Socket(SocketAddr::new(ip, port))),
            Err(_) => Ok(Address::Domain(host.to_string(), port)),
        }
    }

    /// Get the host part as string
    pub fn host(&self) -> String {
        match self {
            Address::Socket(addr) => addr.ip().to_string(),
            Address::Domain(domain, _) => domain.clone(),
        }
    }

    /// Resolve to socket addresses of the requested family, in resolver order.
    pub async fn resolve(&self, family: AddrFamily) -> Result<Vec<SocketAddr>> {
        let candidates: Vec<SocketAddr> = match self {
            Address::Socket(addr) => vec![*addr],
            Address::Domain(domain, port) => {
                tokio::net::lookup_host((domain.as_str(), *port)).await?.collect()
            }
        };

        let resolved: Vec<SocketAddr> = candidates
            .into_iter()
            .filter(|addr| family.accepts(&addr.ip()))
            .collect();

        if resolved.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "no {} address found for {}",
                family, self
            )));
        }

        Ok(resolved)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Socket(addr) => write!(f, "{}", addr),
            Address::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Address::Socket(addr)
    }
}
