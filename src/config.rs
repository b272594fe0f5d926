//! Connection configuration
//!
//! A `ConnectionConfig` names a transport kind and carries its arguments as
//! an opaque JSON object. The arguments are decoded into the shape that
//! belongs to the kind only when the connection is opened.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::proxy::ProxyParams;
use crate::session::TlsClientConfig;

/// Connection kind tag for raw IP sockets
pub const RAW: &str = "raw";

/// Connection kind tag for dialed stream/datagram sockets
pub const NET: &str = "net";

/// Describes which network to use when sending packets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Transport kind: `raw` or `net`
    #[serde(rename = "type", alias = "Type")]
    pub kind: String,

    /// Kind-specific arguments
    #[serde(default, alias = "Args")]
    pub args: Map<String, Value>,

    /// Proxy parameters for dialed connections
    #[serde(default, alias = "Proxy", skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyParams>,
}

impl ConnectionConfig {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Build a raw connection config
    pub fn raw(config: &RawConnConfig) -> Result<Self> {
        Ok(Self {
            kind: RAW.to_string(),
            args: to_args(config)?,
            proxy: None,
        })
    }

    /// Build a dialed connection config
    pub fn net(config: &NetConnConfig) -> Result<Self> {
        Ok(Self {
            kind: NET.to_string(),
            args: to_args(config)?,
            proxy: None,
        })
    }

    /// Builder: set proxy parameters
    pub fn with_proxy(mut self, proxy: ProxyParams) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Decode `args` into the shape `T`, labelled `shape` in errors
    pub fn decode_args<T: DeserializeOwned>(&self, shape: &'static str) -> Result<T> {
        serde_json::from_value(Value::Object(self.args.clone()))
            .map_err(|source| Error::Decode { shape, source })
    }
}

fn to_args<T: Serialize>(config: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(config) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::Config("connection arguments must be an object".into())),
        Err(e) => Err(Error::Config(format!("Failed to encode arguments: {}", e))),
    }
}

/// Arguments of a raw IP connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConnConfig {
    /// `<ip|ip4|ip6>:<protocol>`, e.g. `ip4:icmp` or `ip6:58`
    #[serde(alias = "Name")]
    pub name: String,

    /// Local address to bind; empty means unspecified
    #[serde(default, alias = "Address")]
    pub address: String,
}

/// Arguments of a dialed connection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetConnConfig {
    /// Dial network: `tcp`, `tcp4`, `tcp6`, `udp`, `udp4`, `udp6`
    #[serde(alias = "Protocol")]
    pub protocol: String,

    /// Remote `host:port`
    #[serde(alias = "Address")]
    pub address: String,

    /// Bound on dialing and on the TLS handshake, each
    #[serde(
        default,
        alias = "Timeout",
        with = "duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,

    /// Proxy parameters, used when the connection config carries none
    #[serde(default, alias = "Proxy", skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyParams>,

    /// TLS client settings; absent means plaintext
    #[serde(
        default,
        alias = "TLSClientConfig",
        alias = "tls",
        skip_serializing_if = "Option::is_none"
    )]
    pub tls_client_config: Option<TlsClientConfig>,
}

/// Serde helpers for optional durations.
///
/// Strings use unit suffixes and may be compound (`"1m30s"`, `"250ms"`,
/// `"1.5s"`); bare numbers are seconds.
pub mod duration {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(f64),
        Text(String),
    }

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_str(&format!("{}ms", d.as_millis())),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Seconds(secs)) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(D::Error::custom),
            Some(Raw::Text(text)) => parse(&text).map(Some).map_err(D::Error::custom),
        }
    }

    pub fn parse(text: &str) -> Result<Duration, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty duration".into());
        }
        if text == "0" {
            return Ok(Duration::ZERO);
        }

        let mut total = Duration::ZERO;
        let mut rest = text;

        while !rest.is_empty() {
            let number_len = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(|| format!("missing unit in duration {:?}", text))?;
            let unit_len = rest[number_len..]
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(rest.len() - number_len);

            let number: f64 = rest[..number_len]
                .parse()
                .map_err(|_| format!("invalid duration {:?}", text))?;
            let unit = &rest[number_len..number_len + unit_len];

            let scale = match unit {
                "ns" => 1e-9,
                "us" | "µs" => 1e-6,
                "ms" => 1e-3,
                "s" => 1.0,
                "m" => 60.0,
                "h" => 3600.0,
                _ => return Err(format!("unknown unit {:?} in duration {:?}", unit, text)),
            };

            let part = Duration::try_from_secs_f64(number * scale).map_err(|e| e.to_string())?;
            total = total
                .checked_add(part)
                .ok_or_else(|| format!("duration {:?} overflows", text))?;
            rest = &rest[number_len + unit_len..];
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_style_config() {
        let config = ConnectionConfig::from_json(
            r#"{"Type": "net", "Args": {"Protocol": "tcp", "Address": "example:80", "Timeout": "10s"}}"#,
        )
        .unwrap();
        assert_eq!(config.kind, NET);

        let args: NetConnConfig = config.decode_args("net").unwrap();
        assert_eq!(args.protocol, "tcp");
        assert_eq!(args.address, "example:80");
        assert_eq!(args.timeout, Some(Duration::from_secs(10)));
        assert!(args.tls_client_config.is_none());
    }

    #[test]
    fn test_decode_failure_names_shape() {
        let config = ConnectionConfig::from_json(r#"{"type": "raw", "args": {"address": "::"}}"#)
            .unwrap();
        let err = config.decode_args::<RawConnConfig>("raw").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().starts_with("error decoding raw connection config"));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_builders_round_trip_through_args() {
        let raw = RawConnConfig {
            name: "ip6:ip".into(),
            address: "::".into(),
        };
        let config = ConnectionConfig::raw(&raw).unwrap();
        assert_eq!(config.kind, RAW);
        assert_eq!(config.decode_args::<RawConnConfig>("raw").unwrap(), raw);
    }

    #[test]
    fn test_parse_durations() {
        assert_eq!(duration::parse("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(duration::parse("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(duration::parse("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(duration::parse("0").unwrap(), Duration::ZERO);
        assert!(duration::parse("10").is_err());
        assert!(duration::parse("5 parsecs").is_err());
        assert!(duration::parse("").is_err());
        assert!(duration::parse("10000000000000000000s10000000000000000000s").is_err());
    }

    #[test]
    fn test_overflowing_timeout_is_decode_error() {
        let config = ConnectionConfig::from_json(
            r#"{"type": "net", "args": {"protocol": "tcp", "address": "example:80",
                "timeout": "10000000000000000000s10000000000000000000s"}}"#,
        )
        .unwrap();
        let err = config.decode_args::<NetConnConfig>("net").unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_numeric_timeout_is_seconds() {
        let args: NetConnConfig =
            serde_json::from_str(r#"{"protocol": "udp", "address": "10.0.0.1:53", "timeout": 2}"#)
                .unwrap();
        assert_eq!(args.timeout, Some(Duration::from_secs(2)));
    }
}
