//! The retry engine.
//!
//! ```text
//! BUILDING ──> SENDING ──> SUCCEEDED
//!                 │  ▲
//!                 │  └── AWAITING_BACKOFF <── transport failure / transient status
//!                 └────> FAILED               (rejection, budget, deadline)
//! ```
//!
//! One execution tries nodes strictly one after another, never in parallel,
//! so the network never sees two live copies of the same submission from
//! us. Every node tried is excluded for the rest of the call. Both
//! suspension points (the send and the backoff sleep) are bounded by the
//! caller's deadline.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::metrics::ExecutionMetrics;
use super::status::{NodeResponse, Status};
use super::transport::{Transport, TransportError};
use crate::account::{AccountId, TransactionId};
use crate::config;
use crate::network::{ManagedNetwork, NetworkError};
use crate::transaction::{TransactionEnvelope, TransactionError};

/// Something the engine can submit.
pub trait Executable: Send {
    type Response: Send;

    /// Refuses to start if the item cannot be submitted.
    fn prepare(&self) -> Result<(), TransactionError>;

    /// Called once, right before the first request leaves.
    fn begin_sending(&mut self);

    /// Nodes this item may be sent to.
    fn target_nodes(&self) -> Vec<AccountId>;

    /// Request bytes for `node_id`.
    fn request_for(&self, node_id: &AccountId) -> Result<Vec<u8>, TransactionError>;

    /// Builds the caller-facing result from a successful node response.
    fn make_response(&self, node_id: AccountId, attempts: usize, response: NodeResponse)
        -> Self::Response;
}

/// Where an execution currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Building,
    Sending,
    AwaitingBackoff,
    Succeeded,
    Failed,
}

/// Why a single attempt did not produce an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("node answered with transient status {0}")]
    Transient(Status),

    #[error("malformed node response: {0}")]
    MalformedResponse(String),
}

/// Errors surfaced by [`Executor::execute`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("deadline elapsed after {attempts} attempts")]
    Timeout { attempts: usize },

    #[error("node {node_id} rejected the transaction: {status}")]
    Rejected {
        node_id: AccountId,
        status: Status,
        message: String,
    },

    #[error("no success after {attempts} attempts, last error: {last_error}")]
    MaxAttemptsExceeded {
        attempts: usize,
        last_error: AttemptError,
    },
}

/// Per-call limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Total time budget, backoff waits included.
    pub deadline: Duration,
    /// Upper bound for a single send.
    pub request_timeout: Duration,
    /// Overrides the network's max nodes per attempt.
    pub max_attempts: Option<usize>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            deadline: config::DEFAULT_EXECUTION_DEADLINE,
            request_timeout: config::DEFAULT_REQUEST_TIMEOUT,
            max_attempts: None,
        }
    }
}

/// Result of a successful transaction execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResponse {
    pub node_id: AccountId,
    pub transaction_id: Option<TransactionId>,
    /// SHA-384 of the body that node accepted.
    pub transaction_hash: [u8; 48],
    pub status: Status,
    /// Requests sent, the successful one included.
    pub attempts: usize,
}

impl Executable for TransactionEnvelope {
    type Response = TransactionResponse;

    fn prepare(&self) -> Result<(), TransactionError> {
        self.ensure_mutable()
    }

    fn begin_sending(&mut self) {
        self.mark_executed();
    }

    fn target_nodes(&self) -> Vec<AccountId> {
        self.node_account_ids()
    }

    fn request_for(&self, node_id: &AccountId) -> Result<Vec<u8>, TransactionError> {
        self.record(node_id)
            .ok_or_else(|| TransactionError::Serialization(format!("no record for node {node_id}")))?
            .to_wire_bytes()
    }

    fn make_response(
        &self,
        node_id: AccountId,
        attempts: usize,
        response: NodeResponse,
    ) -> TransactionResponse {
        TransactionResponse {
            node_id,
            transaction_id: self.transaction_id(),
            transaction_hash: self
                .record(&node_id)
                .map(|r| r.transaction_hash())
                .unwrap_or([0u8; 48]),
            status: response.status,
            attempts,
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs [`Executable`]s against a shared network.
///
/// Borrowing only, so any number of executors (and executions) can share
/// one [`ManagedNetwork`].
#[derive(Clone, Copy)]
pub struct Executor<'a> {
    network: &'a ManagedNetwork,
    transport: &'a dyn Transport,
    metrics: Option<&'a ExecutionMetrics>,
}

impl<'a> Executor<'a> {
    pub fn new(network: &'a ManagedNetwork, transport: &'a dyn Transport) -> Self {
        Self {
            network,
            transport,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<&'a ExecutionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Submits `item`, retrying on other nodes until it succeeds, is
    /// rejected, or runs out of nodes, attempts or time.
    pub async fn execute<E: Executable>(
        &self,
        item: &mut E,
        options: &ExecuteOptions,
    ) -> Result<E::Response, ExecuteError> {
        let started = Instant::now();
        let result = self.run(item, options, started).await;

        if let Some(metrics) = self.metrics {
            metrics
                .execute_latency_seconds
                .observe(started.elapsed().as_secs_f64());
            match &result {
                Ok(_) => metrics.executions_succeeded_total.inc(),
                Err(e) => {
                    if matches!(e, ExecuteError::Rejected { .. }) {
                        metrics.rejections_total.inc();
                    }
                    metrics.executions_failed_total.inc();
                }
            }
        }

        match &result {
            Ok(_) => info!(elapsed_ms = started.elapsed().as_millis() as u64, "execution succeeded"),
            Err(e) => warn!(error = %e, elapsed_ms = started.elapsed().as_millis() as u64, "execution failed"),
        }
        result
    }

    async fn run<E: Executable>(
        &self,
        item: &mut E,
        options: &ExecuteOptions,
        started: Instant,
    ) -> Result<E::Response, ExecuteError> {
        item.prepare()?;

        let deadline = started + options.deadline;
        let candidates = item.target_nodes();
        let budget = options
            .max_attempts
            .unwrap_or_else(|| self.network.max_nodes_per_attempt())
            .max(1);

        let mut state = ExecutionState::Building;
        let mut excluded: HashSet<AccountId> = HashSet::new();
        let mut attempts = 0usize;
        let mut last_error: Option<AttemptError> = None;

        loop {
            let exhausted = |attempts, last_error: Option<AttemptError>| match last_error {
                Some(last_error) => ExecuteError::MaxAttemptsExceeded {
                    attempts,
                    last_error,
                },
                None => ExecuteError::Network(NetworkError::NoHealthyNode),
            };

            if attempts >= budget {
                return Err(exhausted(attempts, last_error));
            }

            let (node, use_at) = match self.network.schedule_node(&candidates, &excluded) {
                Ok(selection) => selection,
                Err(NetworkError::NoHealthyNode) => return Err(exhausted(attempts, last_error)),
                Err(e) => return Err(e.into()),
            };
            let node_id = node.node_id();
            excluded.insert(node_id);

            let waits = use_at > Instant::now();
            if waits && use_at >= deadline {
                return Err(ExecuteError::Timeout { attempts });
            }
            self.network.mark_used(&node, use_at);
            if waits {
                state = transition(state, ExecutionState::AwaitingBackoff);
                tokio::time::sleep_until(use_at).await;
            }

            let request = item.request_for(&node_id)?;
            if attempts == 0 {
                item.begin_sending();
            }
            state = transition(state, ExecutionState::Sending);
            attempts += 1;
            if let Some(metrics) = self.metrics {
                metrics.execute_attempts_total.inc();
            }

            let timeout = options
                .request_timeout
                .min(deadline.saturating_duration_since(Instant::now()));
            debug!(
                node_id = %node_id,
                address = %node.address(),
                attempt = attempts,
                timeout_ms = timeout.as_millis() as u64,
                "sending request"
            );

            let sent = tokio::time::timeout_at(
                deadline,
                self.transport.send(node.address(), &request, timeout),
            )
            .await;

            let failure = match sent {
                // Whatever the in-flight send would have returned is dropped.
                Err(_) => {
                    transition(state, ExecutionState::Failed);
                    return Err(ExecuteError::Timeout { attempts });
                }
                Ok(Err(e)) => {
                    if let Some(metrics) = self.metrics {
                        metrics.transport_failures_total.inc();
                    }
                    AttemptError::Transport(e)
                }
                Ok(Ok(bytes)) => match NodeResponse::decode(&bytes) {
                    Err(e) => {
                        if let Some(metrics) = self.metrics {
                            metrics.transport_failures_total.inc();
                        }
                        AttemptError::MalformedResponse(e.to_string())
                    }
                    Ok(response) if response.status.is_success() => {
                        self.network.report_success(&node);
                        transition(state, ExecutionState::Succeeded);
                        return Ok(item.make_response(node_id, attempts, response));
                    }
                    Ok(response) if response.status.is_transient() => {
                        if let Some(metrics) = self.metrics {
                            metrics.transient_status_total.inc();
                        }
                        AttemptError::Transient(response.status)
                    }
                    Ok(response) => {
                        // The node did its job; the transaction is what failed.
                        self.network.report_success(&node);
                        transition(state, ExecutionState::Failed);
                        return Err(ExecuteError::Rejected {
                            node_id,
                            status: response.status,
                            message: response.message,
                        });
                    }
                },
            };

            let backoff = self.network.report_failure(&node);
            debug!(
                node_id = %node_id,
                attempt = attempts,
                error = %failure,
                backoff_ms = backoff.as_millis() as u64,
                "attempt failed"
            );
            last_error = Some(failure);

            let more_nodes = candidates
                .iter()
                .any(|id| !excluded.contains(id) && self.network.node(id).is_some());
            if attempts >= budget || !more_nodes {
                continue;
            }

            let wake = Instant::now() + backoff;
            if wake >= deadline {
                transition(state, ExecutionState::Failed);
                return Err(ExecuteError::Timeout { attempts });
            }
            state = transition(state, ExecutionState::AwaitingBackoff);
            tokio::time::sleep_until(wake).await;
        }
    }
}

fn transition(from: ExecutionState, to: ExecutionState) -> ExecutionState {
    if from != to {
        trace!(?from, ?to, "execution state");
    }
    to
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Timestamp;
    use crate::transaction::{PerNodeRecord, RawOperation, TransactionBuilder};

    fn envelope() -> TransactionEnvelope {
        let tx = TransactionBuilder::new(RawOperation::new("noop", vec![]))
            .transaction_id(TransactionId::with_valid_start(
                AccountId::new(7),
                Timestamp {
                    seconds: 10,
                    nanos: 0,
                },
            ))
            .node_account_ids([AccountId::new(3), AccountId::new(4)])
            .build();
        TransactionEnvelope::from_transaction(&tx).unwrap()
    }

    #[test]
    fn default_options_come_from_config() {
        let options = ExecuteOptions::default();
        assert_eq!(options.deadline, config::DEFAULT_EXECUTION_DEADLINE);
        assert_eq!(options.request_timeout, config::DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(options.max_attempts, None);
    }

    #[test]
    fn envelope_requests_are_single_record_artifacts() {
        let env = envelope();
        let bytes = env.request_for(&AccountId::new(4)).unwrap();
        let record = PerNodeRecord::from_wire_bytes(&bytes).unwrap();
        assert_eq!(record.node_id(), AccountId::new(4));
        assert!(env.request_for(&AccountId::new(9)).is_err());
    }

    #[test]
    fn begin_sending_makes_the_envelope_terminal() {
        let mut env = envelope();
        env.prepare().unwrap();
        env.begin_sending();
        assert_eq!(env.prepare(), Err(TransactionError::AlreadyExecuted));
    }

    #[test]
    fn response_carries_the_accepting_record_hash() {
        let env = envelope();
        let response = env.make_response(AccountId::new(3), 2, NodeResponse::new(Status::Ok));
        assert_eq!(response.attempts, 2);
        assert_eq!(
            response.transaction_hash,
            env.records()[0].transaction_hash()
        );
        assert_eq!(response.transaction_id.map(|id| id.account_id), Some(AccountId::new(7)));
    }
}
