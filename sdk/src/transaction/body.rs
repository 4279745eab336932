//! Logical transactions and their per-node body encoding.
//!
//! The SDK core does not know what a transfer or a contract call looks like.
//! An operation only has to implement [`Operation`]: a stable kind name and
//! a canonical byte encoding of its own fields. [`LogicalTransaction`] adds
//! the fields every transaction shares and knows how to produce the body for
//! one specific node.
//!
//! # Canonical Body Format
//!
//! Big-endian, fixed width unless noted:
//!
//! ```text
//! u16   body format version
//! 24B   payer account (shard, realm, num)
//! i64   valid start seconds
//! u32   valid start nanos
//! 24B   node account               <- the only field that differs per node
//! u64   max fee
//! u64   valid duration seconds
//! u32 + bytes   memo (UTF-8)
//! u32 + bytes   operation kind
//! u32 + bytes   operation payload
//! ```
//!
//! No serde here: field order must never depend on a serializer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::TransactionError;
use crate::account::{AccountId, Timestamp, TransactionId};
use crate::config::{
    BODY_FORMAT_VERSION, DEFAULT_MAX_TRANSACTION_FEE, DEFAULT_VALID_DURATION, MAX_MEMO_LENGTH,
};

/// Offset of the node account inside the body.
const NODE_ID_OFFSET: usize = 2 + 24 + 8 + 4;

/// Capability implemented by every operation kind.
pub trait Operation: fmt::Debug + Send + Sync {
    /// Stable, short name of the kind, e.g. `"crypto_transfer"`.
    fn kind(&self) -> &str;

    /// Canonical encoding of the operation's own fields. Must be
    /// deterministic.
    fn encode(&self) -> Vec<u8>;
}

/// An operation whose payload was encoded elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOperation {
    kind: String,
    payload: Vec<u8>,
}

impl RawOperation {
    pub fn new(kind: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }
}

impl Operation for RawOperation {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn encode(&self) -> Vec<u8> {
        self.payload.clone()
    }
}

// ---------------------------------------------------------------------------
// LogicalTransaction
// ---------------------------------------------------------------------------

/// The operation-agnostic transaction a caller wants submitted.
///
/// `transaction_id` and `operation` are required. `max_fee` and
/// `valid_duration` fall back to the defaults in [`crate::config`].
#[derive(Debug, Clone, Default)]
pub struct LogicalTransaction {
    pub transaction_id: Option<TransactionId>,
    pub memo: String,
    pub max_fee: Option<u64>,
    pub valid_duration: Option<Duration>,
    pub operation: Option<Arc<dyn Operation>>,
    pub node_account_ids: Vec<AccountId>,
}

impl LogicalTransaction {
    /// Checks that the transaction can be encoded.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.transaction_id.is_none() {
            return Err(TransactionError::IncompleteTransaction {
                missing: "transaction_id",
            });
        }
        if self.operation.is_none() {
            return Err(TransactionError::IncompleteTransaction {
                missing: "operation",
            });
        }
        if self.memo.len() > MAX_MEMO_LENGTH {
            return Err(TransactionError::MemoTooLong {
                len: self.memo.len(),
                max: MAX_MEMO_LENGTH,
            });
        }
        Ok(())
    }

    /// Encodes the body addressed to `node_id`.
    ///
    /// Same transaction + same node id always yields the same bytes.
    pub fn encode(&self, node_id: &AccountId) -> Result<Vec<u8>, TransactionError> {
        self.validate()?;
        let (Some(transaction_id), Some(operation)) = (&self.transaction_id, &self.operation)
        else {
            return Err(TransactionError::IncompleteTransaction {
                missing: "transaction_id",
            });
        };

        let op_bytes = operation.encode();
        let mut buf = Vec::with_capacity(128 + self.memo.len() + op_bytes.len());

        buf.extend_from_slice(&BODY_FORMAT_VERSION.to_be_bytes());
        buf.extend_from_slice(&transaction_id.account_id.to_bytes());
        buf.extend_from_slice(&transaction_id.valid_start.seconds.to_be_bytes());
        buf.extend_from_slice(&transaction_id.valid_start.nanos.to_be_bytes());
        debug_assert_eq!(buf.len(), NODE_ID_OFFSET);
        buf.extend_from_slice(&node_id.to_bytes());
        buf.extend_from_slice(&self.max_fee.unwrap_or(DEFAULT_MAX_TRANSACTION_FEE).to_be_bytes());
        buf.extend_from_slice(
            &self
                .valid_duration
                .unwrap_or(DEFAULT_VALID_DURATION)
                .as_secs()
                .to_be_bytes(),
        );
        put_prefixed(&mut buf, self.memo.as_bytes())?;
        put_prefixed(&mut buf, operation.kind().as_bytes())?;
        put_prefixed(&mut buf, &op_bytes)?;

        Ok(buf)
    }
}

fn put_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<(), TransactionError> {
    buf.extend_from_slice(&length_prefix(bytes.len())?);
    buf.extend_from_slice(bytes);
    Ok(())
}

fn length_prefix(len: usize) -> Result<[u8; 4], TransactionError> {
    u32::try_from(len).map(u32::to_be_bytes).map_err(|_| {
        TransactionError::Serialization(format!("field of {len} bytes exceeds u32 length prefix"))
    })
}

fn read_u64(bytes: &[u8], at: usize) -> Option<u64> {
    let chunk: [u8; 8] = bytes.get(at..at + 8)?.try_into().ok()?;
    Some(u64::from_be_bytes(chunk))
}

fn read_account(bytes: &[u8], at: usize) -> Option<AccountId> {
    Some(AccountId::with_shard_realm(
        read_u64(bytes, at)?,
        read_u64(bytes, at + 8)?,
        read_u64(bytes, at + 16)?,
    ))
}

/// Reads the transaction id back out of an encoded body.
pub fn decode_transaction_id(body: &[u8]) -> Option<TransactionId> {
    let account_id = read_account(body, 2)?;
    let seconds = i64::from_be_bytes(body.get(26..34)?.try_into().ok()?);
    let nanos = u32::from_be_bytes(body.get(34..38)?.try_into().ok()?);
    Some(TransactionId::with_valid_start(
        account_id,
        Timestamp { seconds, nanos },
    ))
}

/// Reads the node account back out of an encoded body.
pub fn decode_node_account_id(body: &[u8]) -> Option<AccountId> {
    read_account(body, NODE_ID_OFFSET)
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`LogicalTransaction`].
///
/// ```rust
/// use meridian_sdk::account::{AccountId, TransactionId};
/// use meridian_sdk::transaction::{RawOperation, TransactionBuilder};
///
/// let tx = TransactionBuilder::new(RawOperation::new("crypto_transfer", vec![1, 2, 3]))
///     .transaction_id(TransactionId::generate(AccountId::new(1001)))
///     .memo("rent")
///     .node_account_ids([AccountId::new(3), AccountId::new(4)])
///     .build();
/// assert_eq!(tx.node_account_ids.len(), 2);
/// ```
#[derive(Debug)]
pub struct TransactionBuilder {
    tx: LogicalTransaction,
}

impl TransactionBuilder {
    pub fn new(operation: impl Operation + 'static) -> Self {
        Self {
            tx: LogicalTransaction {
                operation: Some(Arc::new(operation)),
                ..LogicalTransaction::default()
            },
        }
    }

    pub fn transaction_id(mut self, id: TransactionId) -> Self {
        self.tx.transaction_id = Some(id);
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.tx.memo = memo.into();
        self
    }

    pub fn max_fee(mut self, fee: u64) -> Self {
        self.tx.max_fee = Some(fee);
        self
    }

    pub fn valid_duration(mut self, duration: Duration) -> Self {
        self.tx.valid_duration = Some(duration);
        self
    }

    pub fn node_account_ids(mut self, ids: impl IntoIterator<Item = AccountId>) -> Self {
        self.tx.node_account_ids = ids.into_iter().collect();
        self
    }

    pub fn build(self) -> LogicalTransaction {
        self.tx
    }
}
