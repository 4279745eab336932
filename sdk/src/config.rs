//! # Client Configuration & Constants
//!
//! Every magic number in the SDK lives here. If you're hardcoding a backoff
//! or a timeout somewhere else, move it here.
//!
//! [`ClientConfig`] is the serde-loadable form of the same knobs. Every field
//! has a default, so an empty JSON object is a valid configuration that
//! talks to testnet.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::account::AccountId;
use crate::network::{NetworkConfig, NetworkError, NetworkName, Topology};

// ---------------------------------------------------------------------------
// Backoff & Attempt Budget
// ---------------------------------------------------------------------------

/// Backoff applied to a node after its first failure, and the value it is
/// reset to on success.
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(250);

/// Ceiling for exponential backoff. A node that keeps failing is retried at
/// most this rarely.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Distinct nodes one `execute` call may try before giving up.
pub const DEFAULT_MAX_NODES_PER_ATTEMPT: usize = 10;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Upper bound for a single transport round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall deadline for one `execute` call, backoff waits included.
pub const DEFAULT_EXECUTION_DEADLINE: Duration = Duration::from_secs(120);

/// How long a transaction stays valid after its valid-start time.
pub const DEFAULT_VALID_DURATION: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Transaction Limits
// ---------------------------------------------------------------------------

/// Default fee ceiling, in the smallest ledger unit (2 whole units).
pub const DEFAULT_MAX_TRANSACTION_FEE: u64 = 200_000_000;

/// Maximum memo length in bytes.
pub const MAX_MEMO_LENGTH: usize = 100;

/// Upper bound for a serialized envelope. Decoding refuses anything larger
/// before allocating.
pub const MAX_ENVELOPE_SIZE: u64 = 4 * 1024 * 1024;

/// Magic prefix of a serialized envelope: "MRDN".
pub const ENVELOPE_MAGIC: u32 = 0x4D52_444E;

/// Version of the serialized envelope format.
pub const ENVELOPE_FORMAT_VERSION: u16 = 1;

/// Version byte at the start of every per-node body.
pub const BODY_FORMAT_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Which topology a client talks to: a preset name or an explicit map.
///
/// In JSON this is either `"testnet"` or
/// `{ "35.237.200.180:50211": "0.0.3", ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum NetworkSpec {
    Named(String),
    Custom(BTreeMap<String, String>),
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self::Named(NetworkName::Testnet.to_string())
    }
}

/// Serde-loadable client settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub network: NetworkSpec,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_nodes_per_attempt: usize,
    /// How many nodes `Client::freeze` targets when the transaction names
    /// none. `None` means a third of the network, rounded up.
    pub max_nodes_per_transaction: Option<usize>,
    pub request_timeout_ms: u64,
    pub deadline_ms: u64,
    /// Route every node through its secure port.
    pub transport_security: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: NetworkSpec::default(),
            min_backoff_ms: DEFAULT_MIN_BACKOFF.as_millis() as u64,
            max_backoff_ms: DEFAULT_MAX_BACKOFF.as_millis() as u64,
            max_nodes_per_attempt: DEFAULT_MAX_NODES_PER_ATTEMPT,
            max_nodes_per_transaction: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
            deadline_ms: DEFAULT_EXECUTION_DEADLINE.as_millis() as u64,
            transport_security: false,
        }
    }
}

impl ClientConfig {
    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Network pool settings derived from this config.
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            min_backoff: Duration::from_millis(self.min_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            max_nodes_per_attempt: self.max_nodes_per_attempt,
            transport_security: self.transport_security,
        }
    }

    /// Resolves [`NetworkSpec`] into a topology, parsing node accounts.
    /// Addresses are parsed later, by `ManagedNetwork::set_network`.
    pub fn topology(&self) -> Result<Topology, NetworkError> {
        match &self.network {
            NetworkSpec::Named(name) => Ok(Topology::Preset(name.parse()?)),
            NetworkSpec::Custom(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (address, account) in map {
                    let node_id: AccountId = account.parse()?;
                    entries.push((address.clone(), node_id));
                }
                Ok(Topology::Custom(entries))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.topology().unwrap(), Topology::Preset(NetworkName::Testnet));
    }

    #[test]
    fn custom_network_parses_accounts() {
        let json = r#"{
            "network": { "127.0.0.1:50211": "0.0.3", "127.0.0.1:50212": "4" },
            "min_backoff_ms": 10,
            "max_backoff_ms": 100
        }"#;
        let config = ClientConfig::from_json(json).unwrap();
        let Topology::Custom(entries) = config.topology().unwrap() else {
            panic!("expected custom topology");
        };
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&("127.0.0.1:50212".to_string(), AccountId::new(4))));

        let net = config.network_config();
        assert_eq!(net.min_backoff, Duration::from_millis(10));
        assert_eq!(net.max_backoff, Duration::from_millis(100));
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let config = ClientConfig::from_json(r#"{ "network": "devnet-42" }"#).unwrap();
        assert!(matches!(
            config.topology(),
            Err(NetworkError::UnknownNetwork(name)) if name == "devnet-42"
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(ClientConfig::from_json(r#"{ "min_backof_ms": 1 }"#).is_err());
    }

    #[test]
    fn constants_sanity() {
        assert!(DEFAULT_MIN_BACKOFF <= DEFAULT_MAX_BACKOFF);
        assert!(DEFAULT_REQUEST_TIMEOUT < DEFAULT_EXECUTION_DEADLINE);
        assert_eq!(&ENVELOPE_MAGIC.to_be_bytes(), b"MRDN");
    }
}
