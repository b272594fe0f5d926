//! Error types for packetgen

use thiserror::Error;

/// Boxed error produced by external packet encoders
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for packetgen
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("error decoding {shape} connection config: {source}")]
    Decode {
        shape: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown connection type: {0}")]
    UnknownType(String),

    #[error("error dialing {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: Box<Error>,
    },

    #[error("TLS handshake with {target} failed: {source}")]
    Handshake {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error serializing packet: {0}")]
    Serialize(#[source] BoxError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Timeout")]
    Timeout,

    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

impl Error {
    /// Invalid or unrecognized transport selection, or malformed arguments
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Decode { .. } | Error::UnknownType(_)
        )
    }

    pub fn is_dial(&self) -> bool {
        matches!(self, Error::Dial { .. })
    }

    pub fn is_handshake(&self) -> bool {
        matches!(self, Error::Handshake { .. })
    }

    pub fn is_serialize(&self) -> bool {
        matches!(self, Error::Serialize(_))
    }
}

/// Result type alias for packetgen
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(Error::UnknownType("quic".into()).is_config());
        assert!(Error::Config("bad".into()).is_config());

        let dial = Error::Dial {
            target: "tcp://127.0.0.1:1".into(),
            source: Box::new(Error::Timeout),
        };
        assert!(dial.is_dial());
        assert!(!dial.is_handshake());
        assert!(!dial.is_config());

        let handshake = Error::Handshake {
            target: "tcp://127.0.0.1:1".into(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "bad record"),
        };
        assert!(handshake.is_handshake());
        assert!(!handshake.is_dial());
    }

    #[test]
    fn test_serialize_message() {
        let err = Error::Serialize("checksum overflow".into());
        assert!(err.is_serialize());
        assert_eq!(err.to_string(), "error serializing packet: checksum overflow");
    }
}
