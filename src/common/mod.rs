//! Common types and abstractions
//!
//! - Stream: unified async I/O abstraction over dialed sockets
//! - Network: dial network names (tcp, udp6, ...)
//! - Address: host:port representation

mod address;
mod network;
mod stream;

pub use address::Address;
pub use network::{AddrFamily, Network};
pub use stream::{AsyncReadWrite, Stream};

// Re-export error types from crate root
pub use crate::error::{Error, Result};
