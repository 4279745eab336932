//! Node endpoint addresses.
//!
//! A [`NodeAddress`] is an immutable `host:port` pair. Nodes listen on a
//! plaintext port and a TLS port, and the two are paired by convention:
//!
//! - **Mirror pairing**: `5600` (plaintext) <-> `433` (TLS). Matched by port
//!   value, never by hostname.
//! - **Default pairing**: plaintext ports are odd, and the TLS port is the
//!   next one up (`50211` <-> `50212`). A port whose partner would be a
//!   mirror port (`434`, `5599`) has no pair, and both transforms leave it
//!   unchanged.
//!
//! Transforms return new values. Asking for the form an address is already
//! in gives the same address back.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Plaintext port of the mirror pairing.
pub const MIRROR_PLAINTEXT_PORT: u16 = 5600;

/// TLS port of the mirror pairing.
pub const MIRROR_TLS_PORT: u16 = 433;

/// Plaintext port most consensus nodes listen on.
pub const NODE_PLAINTEXT_PORT: u16 = 50211;

/// TLS port most consensus nodes listen on.
pub const NODE_TLS_PORT: u16 = 50212;

/// A `host:port` string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node address {input:?}: {reason}")]
pub struct AddressParseError {
    pub input: String,
    pub reason: &'static str,
}

impl AddressParseError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// An immutable network endpoint. Equality and ordering follow
/// `(host, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddress {
    host: String,
    port: u16,
}

impl NodeAddress {
    /// Parses `host:port`, splitting on the last `:`.
    pub fn parse(text: &str) -> Result<Self, AddressParseError> {
        let (host, port) = text
            .rsplit_once(':')
            .ok_or_else(|| AddressParseError::new(text, "missing ':' separator"))?;

        if host.is_empty() {
            return Err(AddressParseError::new(text, "empty host"));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(AddressParseError::new(text, "host contains whitespace"));
        }
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AddressParseError::new(text, "port is not numeric"));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| AddressParseError::new(text, "port out of range"))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the port is the TLS side of its pairing.
    pub fn is_secure(&self) -> bool {
        match self.port {
            MIRROR_TLS_PORT => true,
            MIRROR_PLAINTEXT_PORT => false,
            port => port % 2 == 0,
        }
    }

    /// The TLS form of this address.
    pub fn to_secure(&self) -> Self {
        let port = match self.port {
            MIRROR_PLAINTEXT_PORT => MIRROR_TLS_PORT,
            _ if self.is_secure() => self.port,
            port => match port.checked_add(1) {
                Some(MIRROR_TLS_PORT | MIRROR_PLAINTEXT_PORT) | None => port,
                Some(next) => next,
            },
        };
        self.with_port(port)
    }

    /// The plaintext form of this address.
    pub fn to_insecure(&self) -> Self {
        let port = match self.port {
            MIRROR_TLS_PORT => MIRROR_PLAINTEXT_PORT,
            _ if !self.is_secure() => self.port,
            port => match port.checked_sub(1) {
                Some(MIRROR_TLS_PORT | MIRROR_PLAINTEXT_PORT) | None => port,
                Some(previous) => previous,
            },
        };
        self.with_port(port)
    }

    /// Canonical `host:port`.
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn with_port(&self, port: u16) -> Self {
        Self {
            host: self.host.clone(),
            port,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for NodeAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ip_address() {
        let addr = NodeAddress::parse("35.237.200.180:50211").unwrap();
        assert_eq!(addr.host(), "35.237.200.180");
        assert_eq!(addr.port(), 50211);
        assert_eq!(addr.render(), "35.237.200.180:50211");

        let secure = addr.to_secure();
        assert_eq!(secure.host(), "35.237.200.180");
        assert_eq!(secure.render(), "35.237.200.180:50212");

        let insecure = secure.to_insecure();
        assert_eq!(insecure.render(), "35.237.200.180:50211");
    }

    #[test]
    fn parse_hostname() {
        let addr = NodeAddress::parse("0.testnet.ledger.example:50211").unwrap();
        assert_eq!(addr.host(), "0.testnet.ledger.example");
        assert_eq!(addr.to_secure().port(), 50212);
        assert_eq!(addr.to_secure().to_insecure(), addr);
    }

    #[test]
    fn mirror_pairing_matches_by_port() {
        let addr = NodeAddress::parse("hcs.mainnet.mirrornode.hedera.com:5600").unwrap();
        let secure = addr.to_secure();
        assert_eq!(secure.port(), 433);
        assert_eq!(secure.render(), "hcs.mainnet.mirrornode.hedera.com:433");
        assert_eq!(secure.to_insecure().port(), 5600);

        // Hostname is irrelevant.
        let other = NodeAddress::parse("10.0.0.1:5600").unwrap();
        assert_eq!(other.to_secure().port(), 433);
    }

    #[test]
    fn transforms_are_idempotent() {
        let ports = [
            "h:50211", "h:50212", "h:5600", "h:433", "h:432", "h:434", "h:5599", "h:5601",
            "h:0", "h:65535",
        ];
        for text in ports {
            let addr = NodeAddress::parse(text).unwrap();
            let secure = addr.to_secure();
            let insecure = addr.to_insecure();
            assert_eq!(secure.to_secure(), secure, "{text}");
            assert_eq!(insecure.to_insecure(), insecure, "{text}");
            assert_eq!(secure.to_insecure(), insecure, "{text}");
            assert_eq!(insecure.to_secure(), secure, "{text}");
        }
    }

    #[test]
    fn pairing_never_lands_on_a_mirror_port() {
        for text in ["h:434", "h:5599"] {
            let addr = NodeAddress::parse(text).unwrap();
            assert_eq!(addr.to_secure(), addr, "{text}");
            assert_eq!(addr.to_insecure(), addr, "{text}");
        }

        let below = NodeAddress::parse("h:432").unwrap();
        assert!(below.is_secure());
        assert_eq!(below.to_insecure().port(), 431);
        assert_eq!(below.to_insecure().to_secure(), below);

        let above = NodeAddress::parse("h:5601").unwrap();
        assert!(!above.is_secure());
        assert_eq!(above.to_secure().port(), 5602);
        assert_eq!(above.to_secure().to_insecure(), above);
    }

    #[test]
    fn extreme_ports_do_not_overflow() {
        assert_eq!(NodeAddress::parse("h:65535").unwrap().to_secure().port(), 65535);
        assert_eq!(NodeAddress::parse("h:0").unwrap().to_insecure().port(), 0);
    }

    #[test]
    fn parse_render_parse_is_stable() {
        for text in ["35.237.200.180:50211", "localhost:0", "[::1]:65535", "a:433"] {
            let once = NodeAddress::parse(text).unwrap();
            let twice = NodeAddress::parse(&once.render()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn rejects_malformed_input() {
        let cases = [
            "bad input with spaces:433",
            "hcs.mainnet.mirrornode.hedera.com:notarealport",
            "host:notaport",
            "no-port",
            ":50211",
            "host:",
            "host:65536",
            "host:+1",
            "host:-1",
        ];
        for text in cases {
            assert!(NodeAddress::parse(text).is_err(), "{text:?} should fail");
        }
    }

    #[test]
    fn ordering_is_host_then_port() {
        let a = NodeAddress::parse("a:9").unwrap();
        let b = NodeAddress::parse("a:10").unwrap();
        let c = NodeAddress::parse("b:1").unwrap();
        assert!(a < b && b < c);
    }
}
