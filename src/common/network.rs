//! Dial network names
//!
//! Dialers are addressed with Go-style network names: `tcp`, `tcp4`,
//! `tcp6`, `udp`, `udp4`, `udp6`.

use std::net::IpAddr;

use crate::error::{Error, Result};

/// Network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Tcp,
    Udp,
}

/// Address family restriction carried by a network name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddrFamily {
    #[default]
    Any,
    V4,
    V6,
}

impl Network {
    /// Split a network name such as `udp6` into its network and family.
    pub fn parse(name: &str) -> Result<(Network, AddrFamily)> {
        let (network, rest) = if let Some(rest) = name.strip_prefix("tcp") {
            (Network::Tcp, rest)
        } else if let Some(rest) = name.strip_prefix("udp") {
            (Network::Udp, rest)
        } else {
            return Err(Error::Unsupported(format!("network {}", name)));
        };

        let family = match rest {
            "" => AddrFamily::Any,
            "4" => AddrFamily::V4,
            "6" => AddrFamily::V6,
            _ => return Err(Error::Unsupported(format!("network {}", name))),
        };

        Ok((network, family))
    }
}

impl AddrFamily {
    pub fn accepts(&self, ip: &IpAddr) -> bool {
        match self {
            AddrFamily::Any => true,
            AddrFamily::V4 => ip.is_ipv4(),
            AddrFamily::V6 => ip.is_ipv6(),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
            Network::Udp => write!(f, "udp"),
        }
    }
}

impl std::fmt::Display for AddrFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddrFamily::Any => write!(f, "ip"),
            AddrFamily::V4 => write!(f, "ipv4"),
            AddrFamily::V6 => write!(f, "ipv6"),
        }
    }
}
