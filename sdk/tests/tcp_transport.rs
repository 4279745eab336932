//! `TcpTransport` against loopback servers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use meridian_sdk::account::{AccountId, TransactionId};
use meridian_sdk::config::{ClientConfig, NetworkSpec};
use meridian_sdk::crypto::PrivateKey;
use meridian_sdk::execution::{
    read_frame, write_frame, NodeResponse, Status, TcpTransport, Transport, TransportError,
};
use meridian_sdk::network::NodeAddress;
use meridian_sdk::transaction::{PerNodeRecord, RawOperation, TransactionBuilder};
use meridian_sdk::Client;

/// Answers every framed request with `OK` once the record decodes.
async fn spawn_node() -> NodeAddress {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = NodeAddress::parse(&listener.local_addr().unwrap().to_string()).unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let Ok(request) = read_frame(&mut stream).await else {
                    return;
                };
                let status = match PerNodeRecord::from_wire_bytes(&request) {
                    Ok(_) => Status::Ok,
                    Err(_) => Status::InvalidTransaction,
                };
                let response = NodeResponse::new(status).encode().unwrap();
                let _ = write_frame(&mut stream, &response).await;
            });
        }
    });
    address
}

/// An address nothing listens on.
async fn dead_address() -> NodeAddress {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = NodeAddress::parse(&listener.local_addr().unwrap().to_string()).unwrap();
    drop(listener);
    address
}

#[tokio::test]
async fn exchanges_one_frame_each_way() {
    let address = spawn_node().await;
    let reply = TcpTransport::new()
        .send(&address, b"not a record", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(
        NodeResponse::decode(&reply).unwrap().status,
        Status::InvalidTransaction
    );
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    let address = dead_address().await;
    let err = TcpTransport::new()
        .send(&address, b"x", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Unreachable(_)), "{err:?}");
}

#[tokio::test]
async fn silent_node_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = NodeAddress::parse(&listener.local_addr().unwrap().to_string()).unwrap();
    let _server = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        std::future::pending::<()>().await;
    });

    let err = TcpTransport::new()
        .send(&address, b"x", Duration::from_millis(200))
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::TimedOut);
}

#[tokio::test]
async fn hang_up_without_reply_is_a_reset() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = NodeAddress::parse(&listener.local_addr().unwrap().to_string()).unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_frame(&mut stream).await;
        drop(stream);
    });

    let err = TcpTransport::new()
        .send(&address, b"x", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ConnectionReset(_)), "{err:?}");
}

#[tokio::test]
async fn client_fails_over_from_a_dead_node() {
    let dead = dead_address().await;
    let live = spawn_node().await;

    let mut network = BTreeMap::new();
    network.insert(dead.to_string(), "0.0.3".to_string());
    network.insert(live.to_string(), "0.0.4".to_string());
    let config = ClientConfig {
        network: NetworkSpec::Custom(network),
        min_backoff_ms: 10,
        max_backoff_ms: 100,
        ..ClientConfig::default()
    };
    let client = Client::from_config(config, Arc::new(TcpTransport::new()))
        .unwrap()
        .with_operator(AccountId::new(1001), PrivateKey::generate_ed25519());

    let tx = TransactionBuilder::new(RawOperation::new("consensus_submit", b"ping".to_vec()))
        .transaction_id(TransactionId::generate(AccountId::new(1001)))
        .node_account_ids([AccountId::new(3), AccountId::new(4)])
        .build();
    let mut envelope = client.freeze(tx).unwrap();

    let response = client.execute(&mut envelope).await.unwrap();
    assert_eq!(response.node_id, AccountId::new(4));
    assert_eq!(response.attempts, 2);
    assert_eq!(
        client.network().node(&AccountId::new(3)).unwrap().failure_count(),
        1
    );
}
