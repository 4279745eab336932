//! The managed node pool.
//!
//! [`ManagedNetwork`] owns every [`Node`] of the current topology, picks the
//! next node for an attempt, and folds attempt outcomes back into per-node
//! health. One instance is shared (behind an `Arc`) by every execution of a
//! client session.
//!
//! ## Selection
//!
//! Candidates are the nodes allowed by the caller minus the caller's
//! exclusion set. Among candidates whose backoff has elapsed
//! (`now >= last_used_at + backoff`), the least recently used wins; nodes
//! that were never used count as oldest, ties go to the lowest node id.
//! When no candidate is ready, the one that becomes ready soonest is
//! returned and the caller decides whether to wait for it.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::address::NodeAddress;
use super::node::Node;
use super::{NetworkConfig, NetworkError, Topology};
use crate::account::AccountId;

type NodeMap = BTreeMap<AccountId, Arc<Node>>;

/// A pool of nodes with health-aware selection.
#[derive(Debug)]
pub struct ManagedNetwork {
    config: NetworkConfig,
    nodes: RwLock<Arc<NodeMap>>,
}

impl ManagedNetwork {
    /// An empty pool. Call [`set_network`](Self::set_network) before
    /// selecting nodes.
    pub fn new(config: NetworkConfig) -> Result<Self, NetworkError> {
        config.validate()?;
        Ok(Self {
            config,
            nodes: RwLock::new(Arc::new(NodeMap::new())),
        })
    }

    /// A pool initialized with `topology`.
    pub fn with_topology(config: NetworkConfig, topology: &Topology) -> Result<Self, NetworkError> {
        let network = Self::new(config)?;
        network.set_network(topology)?;
        Ok(network)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn min_backoff(&self) -> Duration {
        self.config.min_backoff
    }

    pub fn max_backoff(&self) -> Duration {
        self.config.max_backoff
    }

    pub fn max_nodes_per_attempt(&self) -> usize {
        self.config.max_nodes_per_attempt
    }

    /// Replaces the topology wholesale.
    ///
    /// Every address is parsed before anything changes; the first malformed
    /// entry fails the call and leaves the current topology in place. Nodes
    /// whose `(node id, address)` survive the replacement keep their health.
    /// When a node id appears twice, the later entry wins.
    pub fn set_network(&self, topology: &Topology) -> Result<(), NetworkError> {
        let entries = topology.entries();
        let mut parsed = Vec::with_capacity(entries.len());
        for (text, node_id) in &entries {
            let mut address = NodeAddress::parse(text)?;
            if self.config.transport_security {
                address = address.to_secure();
            }
            parsed.push((*node_id, address));
        }

        let mut guard = self.nodes.write();
        let previous = Arc::clone(&guard);
        let mut next = NodeMap::new();
        let mut kept = 0usize;
        for (node_id, address) in parsed {
            let node = match previous.get(&node_id) {
                Some(existing) if existing.address() == &address => {
                    kept += 1;
                    Arc::clone(existing)
                }
                _ => Arc::new(Node::new(node_id, address, self.config.min_backoff)),
            };
            next.insert(node_id, node);
        }

        info!(
            nodes = next.len(),
            kept_health = kept,
            secure = self.config.transport_security,
            "network topology set"
        );
        *guard = Arc::new(next);
        Ok(())
    }

    /// Snapshot of the pool, ordered by node id.
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.snapshot().values().cloned().collect()
    }

    pub fn node_ids(&self) -> Vec<AccountId> {
        self.snapshot().keys().copied().collect()
    }

    pub fn node(&self, node_id: &AccountId) -> Option<Arc<Node>> {
        self.snapshot().get(node_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Picks a node from the whole pool, skipping `excluded`.
    pub fn select_node(&self, excluded: &HashSet<AccountId>) -> Result<Arc<Node>, NetworkError> {
        self.select_where(|id| !excluded.contains(id))
            .map(|(node, use_at)| Self::reserve(node, use_at))
    }

    /// Picks a node among `candidates` (ids unknown to the pool are
    /// ignored), skipping `excluded`.
    pub fn select_node_among(
        &self,
        candidates: &[AccountId],
        excluded: &HashSet<AccountId>,
    ) -> Result<Arc<Node>, NetworkError> {
        self.schedule_node(candidates, excluded)
            .map(|(node, use_at)| Self::reserve(node, use_at))
    }

    /// Like [`select_node_among`](Self::select_node_among), also returning
    /// the instant the node may be used. That instant is in the future only
    /// when no candidate was ready.
    ///
    /// The node is not reserved: a caller that commits to the attempt marks
    /// it with [`mark_used`](Self::mark_used).
    pub fn schedule_node(
        &self,
        candidates: &[AccountId],
        excluded: &HashSet<AccountId>,
    ) -> Result<(Arc<Node>, Instant), NetworkError> {
        self.select_where(|id| candidates.contains(id) && !excluded.contains(id))
    }

    fn select_where(
        &self,
        allowed: impl Fn(&AccountId) -> bool,
    ) -> Result<(Arc<Node>, Instant), NetworkError> {
        let nodes = self.snapshot();
        let now = Instant::now();

        let candidates: Vec<(&Arc<Node>, _)> = nodes
            .iter()
            .filter(|(id, _)| allowed(id))
            .map(|(_, node)| (node, node.health()))
            .collect();

        let ready = candidates
            .iter()
            .filter(|(_, health)| health.is_ready(now))
            .min_by_key(|(_, health)| health.last_used_at);

        let (chosen, use_at) = match ready {
            Some((node, _)) => (Arc::clone(node), now),
            None => {
                let (node, health) = candidates
                    .iter()
                    .min_by_key(|(_, health)| health.ready_at())
                    .ok_or(NetworkError::NoHealthyNode)?;
                let use_at = health.ready_at().map_or(now, |at| at.max(now));
                debug!(
                    node_id = %node.node_id(),
                    wait_ms = use_at.saturating_duration_since(now).as_millis() as u64,
                    "no candidate ready, picking soonest"
                );
                (Arc::clone(node), use_at)
            }
        };

        Ok((chosen, use_at))
    }

    /// Records that `node` is used from `at` on. Its backoff counts from
    /// that instant.
    pub fn mark_used(&self, node: &Node, at: Instant) {
        node.mark_used(at);
    }

    fn reserve(node: Arc<Node>, at: Instant) -> Arc<Node> {
        node.mark_used(at);
        node
    }

    /// The node answered; reset its health.
    pub fn report_success(&self, node: &Node) {
        node.record_success(self.config.min_backoff);
        debug!(node_id = %node.node_id(), "node healthy");
    }

    /// The node failed; grow its backoff. Returns the new backoff.
    pub fn report_failure(&self, node: &Node) -> Duration {
        let backoff = node.record_failure(self.config.min_backoff, self.config.max_backoff);
        warn!(
            node_id = %node.node_id(),
            address = %node.address(),
            failures = node.failure_count(),
            backoff_ms = backoff.as_millis() as u64,
            "node failure reported"
        );
        backoff
    }

    fn snapshot(&self) -> Arc<NodeMap> {
        Arc::clone(&self.nodes.read())
    }
}
