//! Session Layer
//!
//! Transforms a dialed stream into a secured one. It does not dial, and it
//! does not look at the bytes that later flow through it.

mod tls;

pub use tls::{TlsClientConfig, TlsSession};
