//! # Network Module
//!
//! The client's view of the ledger network: which nodes exist, where they
//! listen, and how healthy each one currently looks.
//!
//! ## Architecture
//!
//! ```text
//! address.rs  — NodeAddress: host:port parsing and secure/insecure pairing
//! node.rs     — Node: identity + endpoint + per-node health (failures, backoff, last use)
//! presets.rs  — the three well-known topologies
//! managed.rs  — ManagedNetwork: the node pool, node selection, health reporting
//! ```
//!
//! ## Design Decisions
//!
//! - Health is locked per node. Concurrent executions reporting on
//!   different nodes never contend; reports on the same node serialize.
//! - The node map sits behind a `parking_lot::RwLock<Arc<_>>`. Selection
//!   clones the `Arc` and releases the lock immediately, so a concurrent
//!   `set_network` swaps the whole map without ever exposing a half-built one.
//! - Failing nodes are never evicted. Backoff makes them unattractive; the
//!   per-call exclusion set keeps one execution from retrying the same node.

pub mod address;
pub mod managed;
pub mod node;
pub mod presets;

use std::time::Duration;

use thiserror::Error;

use crate::account::{AccountId, AccountIdError};
use crate::config;

pub use address::{AddressParseError, NodeAddress};
pub use managed::ManagedNetwork;
pub use node::{Node, NodeHealth};
pub use presets::NetworkName;

/// Errors raised while configuring the network or selecting nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("invalid backoff bounds: min {min:?} exceeds max {max:?}")]
    InvalidBackoff { min: Duration, max: Duration },

    #[error("max nodes per attempt must be at least 1")]
    InvalidAttemptBudget,

    #[error("no healthy node available among the candidates")]
    NoHealthyNode,

    #[error(transparent)]
    Address(#[from] AddressParseError),

    #[error("unknown network name: {0}")]
    UnknownNetwork(String),

    #[error("invalid node account: {0}")]
    InvalidNodeAccount(#[from] AccountIdError),
}

/// Tunables for a [`ManagedNetwork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub max_nodes_per_attempt: usize,
    /// Map every address to its secure port when the topology is set.
    pub transport_security: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            min_backoff: config::DEFAULT_MIN_BACKOFF,
            max_backoff: config::DEFAULT_MAX_BACKOFF,
            max_nodes_per_attempt: config::DEFAULT_MAX_NODES_PER_ATTEMPT,
            transport_security: false,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.min_backoff > self.max_backoff {
            return Err(NetworkError::InvalidBackoff {
                min: self.min_backoff,
                max: self.max_backoff,
            });
        }
        if self.max_nodes_per_attempt == 0 {
            return Err(NetworkError::InvalidAttemptBudget);
        }
        Ok(())
    }
}

/// Input to [`ManagedNetwork::set_network`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    Preset(NetworkName),
    /// `(host:port, node account)` pairs, in the order given.
    Custom(Vec<(String, AccountId)>),
}

impl Topology {
    pub fn custom<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, AccountId)>,
        S: Into<String>,
    {
        Self::Custom(entries.into_iter().map(|(a, id)| (a.into(), id)).collect())
    }

    /// Raw `(address, node account)` entries.
    pub fn entries(&self) -> Vec<(String, AccountId)> {
        match self {
            Self::Preset(name) => name.entries(),
            Self::Custom(entries) => entries.clone(),
        }
    }
}

impl From<NetworkName> for Topology {
    fn from(name: NetworkName) -> Self {
        Self::Preset(name)
    }
}
