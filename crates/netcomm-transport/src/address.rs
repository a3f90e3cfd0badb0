use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// A host + port endpoint.
///
/// Identifies the remote party of a datagram or the local/remote end of a
/// stream. The host is kept as given (name or literal) and only resolved
/// when a socket operation needs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SocketAddress {
    host: String,
    port: u16,
}

impl SocketAddress {
    /// Create an endpoint from a host and a port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The `0.0.0.0:0` placeholder reported when no peer is known.
    pub fn unspecified() -> Self {
        Self::new("0.0.0.0", 0)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to the first matching socket address.
    pub fn resolve(&self) -> Result<SocketAddr> {
        let mut addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                address: self.clone(),
                source,
            })?;
        addrs.next().ok_or_else(|| TransportError::Resolve {
            address: self.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "host resolved to no addresses",
            ),
        })
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for SocketAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| TransportError::InvalidAddress(s.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| TransportError::InvalidAddress(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}
