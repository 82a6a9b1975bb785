//! Endpoint abstraction for transport-agnostic socket addressing.
//!
//! Provides unified addressing for the transports the connection core
//! accepts: TCP (the default RTSP control transport) and, behind the
//! `sctp` feature, SCTP.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Transport endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// TCP transport: `tcp://host:port`
    Tcp(SocketAddr),
    /// SCTP transport: `sctp://host:port` (feature `sctp`)
    #[cfg(feature = "sctp")]
    Sctp(SocketAddr),
}

impl Endpoint {
    /// Parse an endpoint from a string.
    ///
    /// Supported formats:
    /// - `tcp://127.0.0.1:554`
    /// - `tcp://[::1]:554` (IPv6)
    /// - `sctp://127.0.0.1:554` (feature `sctp`)
    ///
    /// # Examples
    ///
    /// ```
    /// use feng_core::endpoint::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("tcp://127.0.0.1:5554").unwrap();
    /// assert!(matches!(endpoint, Endpoint::Tcp(_)));
    /// ```
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        s.parse()
    }

    /// Returns true if this is a TCP endpoint.
    pub fn is_tcp(&self) -> bool {
        matches!(self, Endpoint::Tcp(_))
    }

    /// Returns true if this is an SCTP endpoint.
    #[cfg(feature = "sctp")]
    pub fn is_sctp(&self) -> bool {
        matches!(self, Endpoint::Sctp(_))
    }

    /// The socket address, regardless of transport.
    pub fn addr(&self) -> SocketAddr {
        match self {
            Endpoint::Tcp(addr) => *addr,
            #[cfg(feature = "sctp")]
            Endpoint::Sctp(addr) => *addr,
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(addr) = s.strip_prefix("tcp://") {
            let socket_addr = addr
                .parse::<SocketAddr>()
                .map_err(|_| EndpointError::InvalidAddress(addr.to_string()))?;
            Ok(Endpoint::Tcp(socket_addr))
        } else if let Some(addr) = s.strip_prefix("sctp://") {
            #[cfg(feature = "sctp")]
            {
                let socket_addr = addr
                    .parse::<SocketAddr>()
                    .map_err(|_| EndpointError::InvalidAddress(addr.to_string()))?;
                Ok(Endpoint::Sctp(socket_addr))
            }
            #[cfg(not(feature = "sctp"))]
            {
                let _ = addr;
                Err(EndpointError::SctpNotEnabled)
            }
        } else {
            Err(EndpointError::InvalidScheme(s.to_string()))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
            #[cfg(feature = "sctp")]
            Endpoint::Sctp(addr) => write!(f, "sctp://{}", addr),
        }
    }
}

/// Errors that can occur when parsing or using endpoints.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid scheme in endpoint: {0} (expected tcp:// or sctp://)")]
    InvalidScheme(String),

    #[error("invalid socket address: {0}")]
    InvalidAddress(String),

    #[error("SCTP transport requires the `sctp` feature")]
    SctpNotEnabled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
