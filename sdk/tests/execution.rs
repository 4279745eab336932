//! Retry engine scenarios against a scripted in-memory transport.
//!
//! All timing tests run on tokio's paused clock, so backoff sleeps and
//! deadlines resolve instantly and deterministically.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use meridian_sdk::account::{AccountId, Timestamp, TransactionId};
use meridian_sdk::crypto::PrivateKey;
use meridian_sdk::execution::{
    AttemptError, ExecuteError, ExecuteOptions, ExecutionMetrics, Executor, NodeResponse, Status,
    Transport, TransportError,
};
use meridian_sdk::network::{ManagedNetwork, NetworkConfig, NetworkError, NodeAddress, Topology};
use meridian_sdk::transaction::{
    PerNodeRecord, RawOperation, TransactionBuilder, TransactionEnvelope, TransactionError,
};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Reply {
    Fail(TransportError),
    Answer(Status),
    Garbage,
    Hang,
}

/// Replies per address in script order; `OK` once a script runs dry.
#[derive(Default)]
struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ScriptedTransport {
    fn script(self, address: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .entry(address.to_string())
            .or_default()
            .extend(replies);
        self
    }

    fn called_addresses(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(a, _)| a.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        address: &NodeAddress,
        request: &[u8],
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let key = address.to_string();
        self.calls.lock().push((key.clone(), request.to_vec()));
        let reply = self
            .scripts
            .lock()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Reply::Answer(Status::Ok));

        match reply {
            Reply::Fail(e) => Err(e),
            Reply::Answer(status) => Ok(NodeResponse::new(status).encode().unwrap()),
            Reply::Garbage => Ok(vec![0xde, 0xad]),
            Reply::Hang => std::future::pending().await,
        }
    }
}

const A3: &str = "10.0.0.3:50211";
const A4: &str = "10.0.0.4:50211";
const A5: &str = "10.0.0.5:50211";

fn network(min_backoff: Duration) -> ManagedNetwork {
    let config = NetworkConfig {
        min_backoff,
        max_backoff: min_backoff * 16,
        max_nodes_per_attempt: 10,
        transport_security: false,
    };
    let topology = Topology::custom([
        (A3, AccountId::new(3)),
        (A4, AccountId::new(4)),
        (A5, AccountId::new(5)),
    ]);
    ManagedNetwork::with_topology(config, &topology).unwrap()
}

fn envelope(nodes: &[u64]) -> TransactionEnvelope {
    let tx = TransactionBuilder::new(RawOperation::new("crypto_transfer", vec![1, 2, 3]))
        .transaction_id(TransactionId::with_valid_start(
            AccountId::new(1001),
            Timestamp {
                seconds: 1_700_000_000,
                nanos: 0,
            },
        ))
        .node_account_ids(nodes.iter().copied().map(AccountId::new))
        .build();
    let mut env = TransactionEnvelope::from_transaction(&tx).unwrap();
    env.sign_with(&PrivateKey::generate_ed25519()).unwrap();
    env
}

fn unreachable() -> Reply {
    Reply::Fail(TransportError::Unreachable("scripted".into()))
}

fn failures(net: &ManagedNetwork, id: u64) -> u32 {
    net.node(&AccountId::new(id)).unwrap().failure_count()
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn two_transport_failures_then_success() {
    let net = network(Duration::from_millis(250));
    let transport = ScriptedTransport::default()
        .script(A3, [unreachable()])
        .script(A4, [Reply::Fail(TransportError::ConnectionReset("eof".into()))]);
    let mut env = envelope(&[3, 4, 5]);

    let response = Executor::new(&net, &transport)
        .execute(&mut env, &ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(response.attempts, 3);
    assert_eq!(response.node_id, AccountId::new(5));
    assert_eq!(response.status, Status::Ok);
    assert_eq!(
        response.transaction_hash,
        env.record(&AccountId::new(5)).unwrap().transaction_hash()
    );
    assert_eq!(transport.called_addresses(), vec![A3, A4, A5]);
    assert_eq!((failures(&net, 3), failures(&net, 4), failures(&net, 5)), (1, 1, 0));
    assert!(env.is_executed());
}

#[tokio::test(start_paused = true)]
async fn each_node_receives_its_own_record() {
    let net = network(Duration::from_millis(10));
    let transport = ScriptedTransport::default().script(A3, [unreachable()]);
    let mut env = envelope(&[3, 4]);

    Executor::new(&net, &transport)
        .execute(&mut env, &ExecuteOptions::default())
        .await
        .unwrap();

    let calls = transport.calls.lock().clone();
    for (address, request) in calls {
        let record = PerNodeRecord::from_wire_bytes(&request).unwrap();
        let expected = if address == A3 { 3 } else { 4 };
        assert_eq!(record.node_id(), AccountId::new(expected));
        assert_eq!(record.signature_map().len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn definitive_rejection_is_not_retried() {
    let net = network(Duration::from_millis(250));
    let transport =
        ScriptedTransport::default().script(A3, [Reply::Answer(Status::InsufficientPayerBalance)]);
    let mut env = envelope(&[3, 4, 5]);

    // Earlier failures on node 3; it was never used, so it is still picked first.
    let n3 = net.node(&AccountId::new(3)).unwrap();
    net.report_failure(&n3);
    net.report_failure(&n3);
    assert_eq!(n3.backoff(), Duration::from_millis(500));

    let err = Executor::new(&net, &transport)
        .execute(&mut env, &ExecuteOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExecuteError::Rejected {
            status: Status::InsufficientPayerBalance,
            ..
        }
    ));
    assert_eq!(transport.called_addresses(), vec![A3]);
    assert_eq!(failures(&net, 3), 0);
    assert_eq!(n3.backoff(), net.min_backoff());
    assert!(env.is_executed());
}

#[tokio::test(start_paused = true)]
async fn transient_status_and_garbage_move_on() {
    let net = network(Duration::from_millis(250));
    let transport = ScriptedTransport::default()
        .script(A3, [Reply::Answer(Status::Busy)])
        .script(A4, [Reply::Garbage]);
    let mut env = envelope(&[3, 4, 5]);

    let response = Executor::new(&net, &transport)
        .execute(&mut env, &ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(response.node_id, AccountId::new(5));
    assert_eq!((failures(&net, 3), failures(&net, 4)), (1, 1));
}

// ---------------------------------------------------------------------------
// Budgets and deadlines
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn attempt_budget_caps_the_number_of_nodes_tried() {
    let net = network(Duration::from_millis(250));
    let transport = ScriptedTransport::default()
        .script(A3, [unreachable()])
        .script(A4, [Reply::Answer(Status::PlatformNotActive)]);
    let mut env = envelope(&[3, 4, 5]);
    let options = ExecuteOptions {
        max_attempts: Some(2),
        ..ExecuteOptions::default()
    };

    let err = Executor::new(&net, &transport)
        .execute(&mut env, &options)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ExecuteError::MaxAttemptsExceeded {
            attempts: 2,
            last_error: AttemptError::Transient(Status::PlatformNotActive),
        }
    );
    assert_eq!(transport.called_addresses().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn running_out_of_candidates_reports_last_error() {
    let net = network(Duration::from_millis(250));
    let transport = ScriptedTransport::default()
        .script(A3, [unreachable()])
        .script(A4, [unreachable()]);
    let mut env = envelope(&[3, 4]);

    let err = Executor::new(&net, &transport)
        .execute(&mut env, &ExecuteOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExecuteError::MaxAttemptsExceeded {
            attempts: 2,
            last_error: AttemptError::Transport(TransportError::Unreachable(_)),
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_a_hung_send() {
    let net = network(Duration::from_millis(250));
    let transport = ScriptedTransport::default().script(A3, [Reply::Hang]);
    let mut env = envelope(&[3, 4]);
    let options = ExecuteOptions {
        deadline: Duration::from_secs(2),
        request_timeout: Duration::from_secs(30),
        max_attempts: None,
    };

    let started = tokio::time::Instant::now();
    let err = Executor::new(&net, &transport)
        .execute(&mut env, &options)
        .await
        .unwrap_err();

    assert_eq!(err, ExecuteError::Timeout { attempts: 1 });
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert!(env.is_executed());
}

#[tokio::test(start_paused = true)]
async fn backoff_that_outlives_the_deadline_times_out() {
    let net = network(Duration::from_secs(10));
    let transport = ScriptedTransport::default().script(A3, [unreachable()]);
    let mut env = envelope(&[3, 4]);
    let options = ExecuteOptions {
        deadline: Duration::from_secs(5),
        ..ExecuteOptions::default()
    };

    let err = Executor::new(&net, &transport)
        .execute(&mut env, &options)
        .await
        .unwrap_err();

    assert_eq!(err, ExecuteError::Timeout { attempts: 1 });
    assert_eq!(transport.called_addresses(), vec![A3]);
}

#[tokio::test(start_paused = true)]
async fn giving_up_before_sending_leaves_node_health_alone() {
    let net = network(Duration::from_secs(4));
    let transport = ScriptedTransport::default();
    let mut env = envelope(&[3]);

    let n3 = net
        .select_node_among(&[AccountId::new(3)], &Default::default())
        .unwrap();
    net.report_failure(&n3);
    let before = n3.health();
    let options = ExecuteOptions {
        deadline: Duration::from_secs(1),
        ..ExecuteOptions::default()
    };

    let err = Executor::new(&net, &transport)
        .execute(&mut env, &options)
        .await
        .unwrap_err();

    assert_eq!(err, ExecuteError::Timeout { attempts: 0 });
    assert_eq!(n3.health(), before);
    assert_eq!(
        n3.health().ready_at().unwrap() - tokio::time::Instant::now(),
        Duration::from_secs(4)
    );
    assert!(transport.called_addresses().is_empty());
    assert!(!env.is_executed());
}

#[tokio::test(start_paused = true)]
async fn backoff_is_waited_between_attempts() {
    let net = network(Duration::from_millis(500));
    let transport = ScriptedTransport::default().script(A3, [unreachable()]);
    let mut env = envelope(&[3, 4]);

    let started = tokio::time::Instant::now();
    Executor::new(&net, &transport)
        .execute(&mut env, &ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(started.elapsed(), Duration::from_millis(500));
}

// ---------------------------------------------------------------------------
// State checks
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn envelope_executes_at_most_once() {
    let net = network(Duration::from_millis(250));
    let transport = ScriptedTransport::default();
    let mut env = envelope(&[3]);
    let executor = Executor::new(&net, &transport);

    executor
        .execute(&mut env, &ExecuteOptions::default())
        .await
        .unwrap();
    let err = executor
        .execute(&mut env, &ExecuteOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err, ExecuteError::Transaction(TransactionError::AlreadyExecuted));
    assert_eq!(transport.called_addresses().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unfrozen_envelope_is_refused() {
    let net = network(Duration::from_millis(250));
    let transport = ScriptedTransport::default();
    let mut env = TransactionEnvelope::new();

    let err = Executor::new(&net, &transport)
        .execute(&mut env, &ExecuteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, ExecuteError::Transaction(TransactionError::NotFrozen));
}

#[tokio::test(start_paused = true)]
async fn targets_unknown_to_the_network_are_never_tried() {
    let net = network(Duration::from_millis(250));
    let transport = ScriptedTransport::default();
    let mut env = envelope(&[42, 43]);

    let err = Executor::new(&net, &transport)
        .execute(&mut env, &ExecuteOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err, ExecuteError::Network(NetworkError::NoHealthyNode));
    assert!(transport.called_addresses().is_empty());
    assert!(!env.is_executed());
}

// ---------------------------------------------------------------------------
// Sharing
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn concurrent_executions_share_one_network() {
    let net = Arc::new(network(Duration::from_millis(100)));
    let transport = Arc::new(ScriptedTransport::default().script(A3, [unreachable()]));

    let runs = (0..8).map(|_| {
        let net = Arc::clone(&net);
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            let mut env = envelope(&[3, 4, 5]);
            Executor::new(&net, transport.as_ref())
                .execute(&mut env, &ExecuteOptions::default())
                .await
        })
    });

    let mut attempts = 0;
    for result in futures::future::join_all(runs).await {
        attempts += result.unwrap().unwrap().attempts;
    }
    // Only the first execution hit the scripted failure.
    assert_eq!(attempts, 9);
    assert_eq!(transport.called_addresses().len(), 9);
}

#[tokio::test(start_paused = true)]
async fn metrics_follow_the_attempts() {
    let net = network(Duration::from_millis(100));
    let transport = ScriptedTransport::default()
        .script(A3, [unreachable()])
        .script(A4, [Reply::Answer(Status::Busy)]);
    let metrics = ExecutionMetrics::new().unwrap();
    let mut env = envelope(&[3, 4, 5]);

    Executor::new(&net, &transport)
        .with_metrics(Some(&metrics))
        .execute(&mut env, &ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(metrics.execute_attempts_total.get(), 3);
    assert_eq!(metrics.transport_failures_total.get(), 1);
    assert_eq!(metrics.transient_status_total.get(), 1);
    assert_eq!(metrics.executions_succeeded_total.get(), 1);
    assert_eq!(metrics.executions_failed_total.get(), 0);
}
