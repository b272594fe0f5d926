//! Raw IP connection
//!
//! Unlike every other connection, a raw connection has no fixed peer: each
//! packet is sent to the IP address it carries. The socket only fixes the
//! IP protocol and the local address.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;
use tracing::debug;

use crate::config::RawConnConfig;
use crate::error::{Error, Result};
use crate::packet::{Packet, SerializeBuffer};

use super::Connection;

/// IP protocol numbers by name
const PROTOCOLS: &[(&str, i32)] = &[
    ("ip", 0),
    ("icmp", 1),
    ("igmp", 2),
    ("ipencap", 4),
    ("tcp", 6),
    ("egp", 8),
    ("udp", 17),
    ("ipv6", 41),
    ("rsvp", 46),
    ("gre", 47),
    ("esp", 50),
    ("ah", 51),
    ("ipv6-icmp", 58),
    ("icmpv6", 58),
    ("ospf", 89),
    ("pim", 103),
    ("sctp", 132),
    ("udplite", 136),
    ("raw", 255),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpVersion {
    V4,
    V6,
}

/// Raw IP packet connection
pub struct RawConnection {
    socket: AsyncFd<Socket>,
    version: IpVersion,
    buf: SerializeBuffer,
    target: String,
}

impl RawConnection {
    /// Open a raw socket for `config.name`, bound to `config.address`.
    ///
    /// Needs CAP_NET_RAW or root on most systems.
    pub fn open(config: &RawConnConfig) -> Result<Self> {
        let (version, protocol, bind_ip) = parse_endpoint(&config.name, &config.address)?;

        let domain = match version {
            IpVersion::V4 => Domain::IPV4,
            IpVersion::V6 => Domain::IPV6,
        };

        let socket = Socket::new(domain, Type::RAW, Some(Protocol::from(protocol)))?;
        socket.set_nonblocking(true)?;
        socket.bind(&SockAddr::from(SocketAddr::new(bind_ip, 0)))?;

        let target = format!("{}://{}", config.name, config.address);
        debug!("opened raw socket {}", target);

        Ok(Self {
            socket: AsyncFd::new(socket)?,
            version,
            buf: SerializeBuffer::new(),
            target,
        })
    }
}

#[async_trait]
impl Connection for RawConnection {
    async fn write(&mut self, packet: &dyn Packet) -> Result<usize> {
        let version = self.version;
        let bytes = self.buf.encode(packet)?;

        let ip = packet
            .ip()
            .ok_or_else(|| Error::InvalidAddress("packet carries no destination IP".into()))?;
        let destination = SockAddr::from(SocketAddr::new(destination_ip(version, ip)?, 0));

        loop {
            let mut guard = self.socket.writable().await?;
            match guard.try_io(|socket| socket.get_ref().send_to(bytes, &destination)) {
                Ok(result) => return Ok(result?),
                Err(_would_block) => continue,
            }
        }
    }

    /// Raw connections only inject; there is nothing to read back.
    async fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        debug!("closing raw socket {}", self.target);
        drop(self.socket.into_inner());
        Ok(())
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// Split `<ip|ip4|ip6>:<protocol>` and the bind address into socket parameters.
fn parse_endpoint(name: &str, address: &str) -> Result<(IpVersion, i32, IpAddr)> {
    let (family, protocol) = name.split_once(':').ok_or_else(|| {
        Error::Config(format!("raw network {:?} must be <ip|ip4|ip6>:<protocol>", name))
    })?;

    let protocol = parse_protocol(protocol)?;

    let bind_ip = if address.is_empty() {
        None
    } else {
        let ip = address
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map_err(|_| Error::InvalidAddress(format!("raw bind address {:?}", address)))?;
        Some(ip)
    };

    let version = match (family, bind_ip) {
        ("ip4", Some(IpAddr::V6(_))) | ("ip6", Some(IpAddr::V4(_))) => {
            return Err(Error::InvalidAddress(format!(
                "address {} does not match network {}",
                address, name
            )));
        }
        ("ip4", _) | ("ip", Some(IpAddr::V4(_))) => IpVersion::V4,
        ("ip6", _) | ("ip", _) => IpVersion::V6,
        _ => return Err(Error::Unsupported(format!("raw network {}", name))),
    };

    let bind_ip = bind_ip.unwrap_or(match version {
        IpVersion::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpVersion::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    });

    Ok((version, protocol, bind_ip))
}

fn parse_protocol(protocol: &str) -> Result<i32> {
    if let Ok(number) = protocol.parse::<u8>() {
        return Ok(number as i32);
    }

    let lower = protocol.to_ascii_lowercase();
    PROTOCOLS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, number)| *number)
        .ok_or_else(|| Error::Config(format!("unknown IP protocol {:?}", protocol)))
}

/// IPv4 destinations on an IPv6 socket go to the IPv4-mapped address.
fn destination_ip(version: IpVersion, ip: IpAddr) -> Result<IpAddr> {
    match (version, ip) {
        (IpVersion::V6, IpAddr::V6(_)) | (IpVersion::V4, IpAddr::V4(_)) => Ok(ip),
        (IpVersion::V6, IpAddr::V4(v4)) => Ok(IpAddr::V6(v4.to_ipv6_mapped())),
        (IpVersion::V4, IpAddr::V6(v6)) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .ok_or_else(|| Error::InvalidAddress(format!("{} on an IPv4 raw socket", v6))),
    }
}
