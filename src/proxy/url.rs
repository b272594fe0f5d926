//! Proxy URL parsing: `scheme://[user[:pass]@]host:port`

use crate::common::Address;
use crate::error::{Error, Result};

/// Supported proxy protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyScheme {
    Socks5,
    Http,
}

/// A parsed proxy endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyUrl {
    pub scheme: ProxyScheme,
    pub address: Address,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyUrl {
    pub fn parse(s: &str) -> Result<Self> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| Error::Config(format!("Invalid proxy URL (missing scheme): {}", s)))?;

        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "socks5" | "socks5h" => ProxyScheme::Socks5,
            "http" => ProxyScheme::Http,
            other => {
                return Err(Error::Config(format!("Unsupported proxy scheme: {}", other)));
            }
        };

        // Anything after the authority is ignored
        let authority = rest.split('/').next().unwrap_or(rest);

        let (userinfo, host) = match authority.rsplit_once('@') {
            Some((userinfo, host)) => (Some(userinfo), host),
            None => (None, authority),
        };

        let (username, password) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
                None => (Some(info.to_string()), None),
            },
            None => (None, None),
        };

        let address = Address::parse(host)
            .map_err(|e| Error::Config(format!("Invalid proxy URL {}: {}", s, e)))?;

        Ok(Self {
            scheme,
            address,
            username,
            password,
        })
    }

    /// Username and password, when a username is set
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.username
            .as_deref()
            .map(|user| (user, self.password.as_deref().unwrap_or("")))
    }
}

impl std::fmt::Display for ProxyUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match self.scheme {
            ProxyScheme::Socks5 => "socks5",
            ProxyScheme::Http => "http",
        };
        // Credentials stay out of logs
        write!(f, "{}://{}", scheme, self.address)
    }
}
