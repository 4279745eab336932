//! Well-known network topologies.
//!
//! Each preset is a static list of `host:port -> node account` entries, the
//! same shape as a custom topology, so presets go through exactly the same
//! parsing path in [`ManagedNetwork::set_network`](super::ManagedNetwork::set_network).

use std::fmt;
use std::str::FromStr;

use super::NetworkError;
use crate::account::AccountId;

/// The three public networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkName {
    Mainnet,
    Testnet,
    Previewnet,
}

const MAINNET: &[(&str, u64)] = &[
    ("35.237.200.180:50211", 3),
    ("35.186.191.247:50211", 4),
    ("35.192.2.25:50211", 5),
    ("35.199.161.108:50211", 6),
    ("35.203.82.240:50211", 7),
    ("35.236.5.219:50211", 8),
    ("35.197.192.225:50211", 9),
    ("35.242.233.154:50211", 10),
    ("35.240.118.96:50211", 11),
    ("35.204.86.32:50211", 12),
];

const TESTNET: &[(&str, u64)] = &[
    ("0.testnet.hedera.com:50211", 3),
    ("1.testnet.hedera.com:50211", 4),
    ("2.testnet.hedera.com:50211", 5),
    ("3.testnet.hedera.com:50211", 6),
    ("4.testnet.hedera.com:50211", 7),
    ("5.testnet.hedera.com:50211", 8),
    ("6.testnet.hedera.com:50211", 9),
];

const PREVIEWNET: &[(&str, u64)] = &[
    ("0.previewnet.hedera.com:50211", 3),
    ("1.previewnet.hedera.com:50211", 4),
    ("2.previewnet.hedera.com:50211", 5),
    ("3.previewnet.hedera.com:50211", 6),
    ("4.previewnet.hedera.com:50211", 7),
];

impl NetworkName {
    pub const ALL: [NetworkName; 3] = [Self::Mainnet, Self::Testnet, Self::Previewnet];

    /// `(address, node account)` entries of this preset.
    pub fn entries(self) -> Vec<(String, AccountId)> {
        let table = match self {
            Self::Mainnet => MAINNET,
            Self::Testnet => TESTNET,
            Self::Previewnet => PREVIEWNET,
        };
        table
            .iter()
            .map(|(address, num)| (address.to_string(), AccountId::new(*num)))
            .collect()
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
            Self::Previewnet => write!(f, "previewnet"),
        }
    }
}

impl FromStr for NetworkName {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "previewnet" => Ok(Self::Previewnet),
            _ => Err(NetworkError::UnknownNetwork(s.to_string())),
        }
    }
}
