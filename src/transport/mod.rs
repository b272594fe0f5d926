//! Transport Layer
//!
//! Responsibilities:
//! - Establish direct TCP and UDP sockets to a remote address
//! - NO encryption, NO proxy negotiation, NO content inspection
//!
//! This layer ONLY deals with raw byte transport.

mod tcp;
mod udp;

pub use tcp::TcpTransport;
pub use udp::{UdpStream, UdpTransport};

use async_trait::async_trait;

use crate::common::{Address, Result, Stream};

/// Transport trait for establishing direct connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to a remote address
    async fn connect(&self, addr: &Address) -> Result<Stream>;
}
