use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Port used when an address omits one.
pub const DEFAULT_PORT: u16 = 6379;

/// Host and port of a cluster node.
///
/// Parses `host`, `host:port`, `[v6]:port` and `redis://` / `rediss://`
/// URLs. Userinfo and path of a URL are not part of the address; see the
/// endpoint config for how they are used. IPv6 hosts are stored without brackets and re-bracketed on display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    host: String,
    port: u16,
}

impl NodeAddress {
    /// Creates an address from its parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP literal, without brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    fn parse_url(s: &str) -> Result<Self> {
        let url = url::Url::parse(s).map_err(|e| invalid(s, &e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| invalid(s, "missing host"))?
            .trim_start_matches('[')
            .trim_end_matches(']');
        Ok(Self::new(host, url.port().unwrap_or(DEFAULT_PORT)))
    }

    fn parse_plain(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| invalid(s, "unterminated IPv6 bracket"))?;
            let port = match tail {
                "" => DEFAULT_PORT,
                _ => parse_port(s, tail.strip_prefix(':').unwrap_or(tail))?,
            };
            return Ok(Self::new(host, port));
        }

        match s.matches(':').count() {
            0 => Ok(Self::new(s, DEFAULT_PORT)),
            1 => {
                let (host, port) = s.split_once(':').unwrap_or((s, ""));
                Ok(Self::new(host, parse_port(s, port)?))
            }
            // bare IPv6 literal
            _ => Ok(Self::new(s, DEFAULT_PORT)),
        }
    }
}

impl FromStr for NodeAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let addr = if s.contains("://") {
            Self::parse_url(s)?
        } else {
            Self::parse_plain(s)?
        };
        if addr.host.is_empty() {
            return Err(invalid(s, "empty host"));
        }
        if addr.port == 0 {
            return Err(invalid(s, "port must be non-zero"));
        }
        Ok(addr)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(input: &str, port: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| invalid(input, &format!("invalid port {port:?}")))
}

fn invalid(input: &str, why: &str) -> Error {
    Error::InvalidArgument {
        message: format!("invalid node address {:?}: {why}", redacted(input)),
    }
}

/// `input` with any URL userinfo masked.
fn redacted(input: &str) -> Cow<'_, str> {
    let Some((scheme, rest)) = input.split_once("://") else {
        return Cow::Borrowed(input);
    };
    let authority = &rest[..rest.find('/').unwrap_or(rest.len())];
    match authority.rfind('@') {
        Some(at) => Cow::Owned(format!("{scheme}://***@{}", &rest[at + 1..])),
        None => Cow::Borrowed(input),
    }
}
