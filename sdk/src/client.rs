//! # Client
//!
//! The usual entry point: a [`ManagedNetwork`], a [`Transport`], the
//! [`ClientConfig`] they were built from, and optionally an operator (the
//! account that pays for and signs everything this client submits).
//!
//! ```rust,no_run
//! use meridian_sdk::account::{AccountId, TransactionId};
//! use meridian_sdk::crypto::PrivateKey;
//! use meridian_sdk::transaction::{RawOperation, TransactionBuilder};
//! use meridian_sdk::{Client, ClientConfig, TcpTransport};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::from_config(ClientConfig::default(), Arc::new(TcpTransport::new()))?
//!     .with_operator(AccountId::new(1001), PrivateKey::generate_ed25519());
//!
//! let tx = TransactionBuilder::new(RawOperation::new("crypto_transfer", vec![])).build();
//! let mut envelope = client.freeze(tx)?;
//! let response = client.execute(&mut envelope).await?;
//! println!("accepted by {}", response.node_id);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::account::{AccountId, TransactionId};
use crate::config::ClientConfig;
use crate::crypto::PrivateKey;
use crate::execution::{
    ExecuteError, ExecuteOptions, ExecutionMetrics, Executor, TransactionResponse, Transport,
};
use crate::network::{ManagedNetwork, NetworkError, Topology};
use crate::transaction::{LogicalTransaction, TransactionEnvelope, TransactionError};

/// The paying account and its key.
#[derive(Debug, Clone)]
pub struct Operator {
    pub account_id: AccountId,
    pub key: PrivateKey,
}

/// Network + transport + settings, shared by every execution of a session.
pub struct Client {
    network: Arc<ManagedNetwork>,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    operator: Option<Operator>,
    metrics: Option<ExecutionMetrics>,
}

impl Client {
    /// Builds the network described by `config`.
    pub fn from_config(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, NetworkError> {
        let topology = config.topology()?;
        let network = ManagedNetwork::with_topology(config.network_config(), &topology)?;
        Ok(Self {
            network: Arc::new(network),
            transport,
            config,
            operator: None,
            metrics: None,
        })
    }

    pub fn with_operator(mut self, account_id: AccountId, key: PrivateKey) -> Self {
        self.operator = Some(Operator { account_id, key });
        self
    }

    pub fn with_metrics(mut self, metrics: ExecutionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn network(&self) -> &Arc<ManagedNetwork> {
        &self.network
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn operator(&self) -> Option<&Operator> {
        self.operator.as_ref()
    }

    pub fn metrics(&self) -> Option<&ExecutionMetrics> {
        self.metrics.as_ref()
    }

    /// Replaces the topology. See [`ManagedNetwork::set_network`].
    pub fn set_network(&self, topology: &Topology) -> Result<(), NetworkError> {
        self.network.set_network(topology)
    }

    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            deadline: self.config.deadline(),
            request_timeout: self.config.request_timeout(),
            max_attempts: None,
        }
    }

    /// Nodes a transaction without explicit targets is frozen for: the
    /// lowest node ids, `max_nodes_per_transaction` of them, or a third of
    /// the network rounded up.
    pub fn default_node_account_ids(&self) -> Vec<AccountId> {
        let ids = self.network.node_ids();
        let count = self
            .config
            .max_nodes_per_transaction
            .unwrap_or_else(|| ids.len().div_ceil(3))
            .max(1);
        ids.into_iter().take(count).collect()
    }

    /// Fills what the client knows (transaction id from the operator,
    /// target nodes from the network) and freezes.
    pub fn freeze(
        &self,
        mut transaction: LogicalTransaction,
    ) -> Result<TransactionEnvelope, TransactionError> {
        if transaction.transaction_id.is_none() {
            if let Some(operator) = &self.operator {
                transaction.transaction_id = Some(TransactionId::generate(operator.account_id));
            }
        }
        if transaction.node_account_ids.is_empty() {
            transaction.node_account_ids = self.default_node_account_ids();
        }
        TransactionEnvelope::from_transaction(&transaction)
    }

    /// Adds the operator signature if it is missing, then submits.
    pub async fn execute(
        &self,
        envelope: &mut TransactionEnvelope,
    ) -> Result<TransactionResponse, ExecuteError> {
        if let Some(operator) = &self.operator {
            let public_key = operator.key.public_key();
            if envelope.is_frozen() && !envelope.is_executed() && !envelope.is_signed_by(&public_key) {
                debug!(operator = %operator.account_id, "adding operator signature");
                envelope.sign_with(&operator.key)?;
            }
        }

        Executor::new(&self.network, self.transport.as_ref())
            .with_metrics(self.metrics.as_ref())
            .execute(envelope, &self.execute_options())
            .await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("nodes", &self.network.len())
            .field("config", &self.config)
            .field("operator", &self.operator.as_ref().map(|o| o.account_id))
            .finish_non_exhaustive()
    }
}
