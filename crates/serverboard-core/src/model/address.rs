// ── Address book ──
//
// Endpoint addresses are a host plus an optional port. Port 0 is a
// wildcard: it matches any port on the same host. Equivalence is a
// pairwise predicate and is NOT transitive once wildcards are involved
// (`a:0 ~ a:1` and `a:0 ~ a:2`, but `a:1 !~ a:2`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port value meaning "any port on this host".
pub const WILDCARD_PORT: u16 = 0;

/// A game server endpoint as `host` + `port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    host: String,
    port: u16,
}

/// Rejected address text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("invalid port {port:?} in address {input:?}")]
    InvalidPort { input: String, port: String },

    #[error("unterminated IPv6 literal in address {0:?}")]
    UnterminatedBracket(String),
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address matching every port on `host`.
    pub fn any_port(host: impl Into<String>) -> Self {
        Self::new(host, WILDCARD_PORT)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_wildcard(&self) -> bool {
        self.port == WILDCARD_PORT
    }

    /// Same host, and either side is a wildcard or the ports agree.
    pub fn equivalent(&self, other: &Address) -> bool {
        self.host == other.host
            && (self.is_wildcard() || other.is_wildcard() || self.port == other.port)
    }

    /// Whether any blacklist entry is equivalent to this address.
    pub fn is_blacklisted(&self, blacklist: &[Address]) -> bool {
        blacklist.iter().any(|entry| entry.equivalent(self))
    }

    /// Parse a comma-separated list such as `"a:1, b ,c:3"`.
    ///
    /// Blank items are skipped; the first malformed item fails the whole list.
    pub fn parse_list(input: &str) -> Result<Vec<Address>, AddressError> {
        input
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bracketed = self.host.contains(':');
        match (self.is_wildcard(), bracketed) {
            (true, _) => f.write_str(&self.host),
            (false, true) => write!(f, "[{}]:{}", self.host, self.port),
            (false, false) => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }

        // [v6]:port or [v6]
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| AddressError::UnterminatedBracket(s.to_owned()))?;
            if host.is_empty() {
                return Err(AddressError::Empty);
            }
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(s, port)?,
                None if tail.is_empty() => WILDCARD_PORT,
                None => {
                    return Err(AddressError::InvalidPort {
                        input: s.to_owned(),
                        port: tail.to_owned(),
                    });
                }
            };
            return Ok(Self::new(host, port));
        }

        match s.split_once(':') {
            // Bare IPv6 literal: more than one colon, no brackets
            Some((_, rest)) if rest.contains(':') => Ok(Self::any_port(s)),
            Some((host, port)) => {
                let host = host.trim();
                if host.is_empty() {
                    return Err(AddressError::Empty);
                }
                Ok(Self::new(host, parse_port(s, port)?))
            }
            None => Ok(Self::any_port(s)),
        }
    }
}

fn parse_port(input: &str, port: &str) -> Result<u16, AddressError> {
    let port = port.trim();
    if port.is_empty() {
        return Ok(WILDCARD_PORT);
    }
    port.parse().map_err(|_| AddressError::InvalidPort {
        input: input.to_owned(),
        port: port.to_owned(),
    })
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}
