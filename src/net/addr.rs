//! `socket://host:port` endpoint strings.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::types::{Result, StrataError};

const SCHEME: &str = "socket://";

/// Parsed socket endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Endpoint for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP literal.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolves to the first socket address of the host.
    pub fn resolve(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|err| StrataError::io("resolve", err))?
            .next()
            .ok_or_else(|| StrataError::Transport(format!("{self} resolved to no address")))
    }
}

impl FromStr for Endpoint {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s.strip_prefix(SCHEME).ok_or_else(|| {
            StrataError::Precondition(format!("address '{s}' must start with {SCHEME}"))
        })?;
        let (host, port) = rest.rsplit_once(':').ok_or_else(|| {
            StrataError::Precondition(format!("address '{s}' is missing a port"))
        })?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(StrataError::Precondition(format!(
                "address '{s}' is missing a host"
            )));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| StrataError::Precondition(format!("invalid port in address '{s}'")))?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{SCHEME}[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{SCHEME}{}:{}", self.host, self.port)
        }
    }
}
