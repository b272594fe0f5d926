//! Stream abstraction
//!
//! Everything a dial capability hands back is a `Stream`: plain TCP, a
//! connected UDP socket, a proxied tunnel or a TLS session on top of any of
//! those.

use tokio::io::{AsyncRead, AsyncWrite};

/// The boxed stream type produced by dialers and sessions.
pub type Stream = Box<dyn AsyncReadWrite + Unpin + Send>;

/// Combined trait for async read + write
pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}

impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}
