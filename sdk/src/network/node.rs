//! A single consensus node and its health state.
//!
//! Health lives behind a per-node `parking_lot::Mutex`, so concurrent
//! executions reporting on the same node never lose an update, while
//! reports on different nodes never contend. Only [`ManagedNetwork`]
//! mutates it.
//!
//! [`ManagedNetwork`]: super::ManagedNetwork

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::address::NodeAddress;
use crate::account::AccountId;

/// Point-in-time copy of a node's health fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHealth {
    /// Consecutive failures since the last success.
    pub failure_count: u32,
    /// Delay before the node should be used again, counted from
    /// `last_used_at`.
    pub backoff: Duration,
    /// When the node was last handed out for an attempt. `None` until the
    /// first selection.
    pub last_used_at: Option<Instant>,
}

impl NodeHealth {
    /// The instant from which the node is usable again.
    pub fn ready_at(&self) -> Option<Instant> {
        self.last_used_at.map(|at| at + self.backoff)
    }

    /// `now >= last_used_at + backoff`; never-used nodes are always ready.
    pub fn is_ready(&self, now: Instant) -> bool {
        self.ready_at().map_or(true, |ready| now >= ready)
    }
}

/// A network node: identity, endpoint and health.
#[derive(Debug)]
pub struct Node {
    node_id: AccountId,
    address: NodeAddress,
    health: Mutex<NodeHealth>,
}

impl Node {
    pub(crate) fn new(node_id: AccountId, address: NodeAddress, min_backoff: Duration) -> Self {
        Self {
            node_id,
            address,
            health: Mutex::new(NodeHealth {
                failure_count: 0,
                backoff: min_backoff,
                last_used_at: None,
            }),
        }
    }

    pub fn node_id(&self) -> AccountId {
        self.node_id
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn health(&self) -> NodeHealth {
        *self.health.lock()
    }

    pub fn failure_count(&self) -> u32 {
        self.health.lock().failure_count
    }

    pub fn backoff(&self) -> Duration {
        self.health.lock().backoff
    }

    pub(crate) fn mark_used(&self, at: Instant) {
        self.health.lock().last_used_at = Some(at);
    }

    pub(crate) fn record_success(&self, min_backoff: Duration) {
        let mut health = self.health.lock();
        health.failure_count = 0;
        health.backoff = min_backoff;
    }

    /// Bumps the failure count and grows the backoff. Returns the new
    /// backoff.
    pub(crate) fn record_failure(&self, min_backoff: Duration, max_backoff: Duration) -> Duration {
        let mut health = self.health.lock();
        health.backoff = if health.failure_count == 0 {
            min_backoff
        } else {
            health.backoff.saturating_mul(2).min(max_backoff)
        };
        health.failure_count = health.failure_count.saturating_add(1);
        health.backoff
    }
}
