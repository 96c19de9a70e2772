//! Endpoint address parsing.
//!
//! # Example
//!
//! ```
//! use zmtp_client::transport::Endpoint;
//!
//! let endpoint = Endpoint::parse("tcp://127.0.0.1:5556").unwrap();
//! assert_eq!(endpoint, Endpoint::Tcp("127.0.0.1:5556".to_string()));
//! assert_eq!(endpoint.to_string(), "tcp://127.0.0.1:5556");
//! ```

use std::fmt;
#[cfg(unix)]
use std::path::PathBuf;

use crate::error::{Result, ZmtpError};

const TCP_SCHEME: &str = "tcp://";
const IPC_SCHEME: &str = "ipc://";

/// A publisher endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP `host:port`.
    Tcp(String),
    /// Unix Domain Socket path.
    #[cfg(unix)]
    Ipc(PathBuf),
}

impl Endpoint {
    /// Parse an endpoint address.
    ///
    /// Accepts `tcp://host:port`, `ipc:///path` (Unix only) and a bare
    /// `host:port`, which means TCP.
    pub fn parse(address: &str) -> Result<Self> {
        let invalid = || ZmtpError::InvalidEndpoint(address.to_string());

        if let Some(rest) = address.strip_prefix(IPC_SCHEME) {
            #[cfg(unix)]
            {
                if rest.is_empty() {
                    return Err(invalid());
                }
                return Ok(Endpoint::Ipc(PathBuf::from(rest)));
            }
            #[cfg(not(unix))]
            {
                let _ = rest;
                return Err(invalid());
            }
        }

        let host_port = address.strip_prefix(TCP_SCHEME).unwrap_or(address);
        if host_port.contains("://") {
            return Err(invalid());
        }

        let (host, port) = host_port.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(invalid());
        }

        Ok(Endpoint::Tcp(host_port.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(host_port) => write!(f, "{}{}", TCP_SCHEME, host_port),
            #[cfg(unix)]
            Endpoint::Ipc(path) => write!(f, "{}{}", IPC_SCHEME, path.display()),
        }
    }
}

impl std::str::FromStr for Endpoint {
    type Err = ZmtpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp() {
        assert_eq!(
            Endpoint::parse("tcp://localhost:5556").unwrap(),
            Endpoint::Tcp("localhost:5556".to_string())
        );
    }

    #[test]
    fn test_parse_bare_host_port() {
        let endpoint: Endpoint = "10.0.0.1:9000".parse().unwrap();
        assert_eq!(endpoint, Endpoint::Tcp("10.0.0.1:9000".to_string()));
        assert_eq!(endpoint.to_string(), "tcp://10.0.0.1:9000");
    }

    #[test]
    fn test_parse_ipv6_literal() {
        assert_eq!(
            Endpoint::parse("tcp://[::1]:5556").unwrap(),
            Endpoint::Tcp("[::1]:5556".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_ipc() {
        let endpoint = Endpoint::parse("ipc:///tmp/feed.sock").unwrap();
        assert_eq!(endpoint, Endpoint::Ipc(PathBuf::from("/tmp/feed.sock")));
        assert_eq!(endpoint.to_string(), "ipc:///tmp/feed.sock");
    }

    #[test]
    fn test_parse_invalid() {
        for address in [
            "",
            "localhost",
            "tcp://localhost",
            "tcp://:5556",
            "tcp://localhost:notaport",
            "tcp://localhost:70000",
            "udp://localhost:5556",
            "ipc://",
        ] {
            let err = Endpoint::parse(address).unwrap_err();
            assert!(
                matches!(err, ZmtpError::InvalidEndpoint(ref a) if a == address),
                "{:?} should be rejected",
                address
            );
        }
    }
}
