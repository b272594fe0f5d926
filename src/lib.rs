//! Packetgen - transport layer for packet/traffic generation jobs
//!
//! # Architecture (Layered Pipeline)
//!
//! ```text
//! ConnectionConfig
//! → Connection factory (type tag + decoded args)
//!   ├── raw: raw IP socket, per-packet destination
//!   └── net: Dialer (direct / SOCKS5 / HTTP CONNECT)
//!            → Transport (TCP/UDP)
//!            → Session (TLS, optional)
//! → Connection (write / read / close / target)
//! ```
//!
//! ## Core Principles
//!
//! - Callers only ever hold a `Connection`; the transport underneath is hidden
//! - Packets encode themselves into a buffer owned by the connection
//! - A failed encode never puts bytes on the wire
//! - `open_connection` returns only usable connections
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── common/          # Core types: Stream, Address, Network
//! ├── packet.rs        # Packet trait, SerializeBuffer
//! ├── config.rs        # ConnectionConfig and per-kind arguments
//! ├── transport/       # Transport layer: TCP, UDP
//! ├── session/         # Session layer: TLS
//! ├── proxy/           # Dialers: direct, SOCKS5, HTTP CONNECT
//! └── connection/      # Connection trait, factory, raw and net transports
//! ```

// Core types
pub mod common;
pub mod error;
pub mod packet;

// Layered architecture
pub mod transport;
pub mod session;
pub mod proxy;
pub mod connection;

// Supporting modules
pub mod config;

// Re-exports for convenience
pub use common::{Address, Network, Stream};
pub use error::{Error, Result};
pub use config::{ConnectionConfig, NetConnConfig, RawConnConfig};

// Architecture re-exports
pub use connection::{open_connection, open_connection_with, Connection};
pub use packet::{Packet, RawPacket, SerializeBuffer};
pub use proxy::{Dialer, ProxyParams};
pub use session::TlsClientConfig;
pub use transport::Transport;
