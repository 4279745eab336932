//! # Transaction Module
//!
//! Construction, multi-node freezing, signature management and
//! serialization of Meridian transactions.
//!
//! ## Architecture
//!
//! ```text
//! body.rs          — LogicalTransaction, the Operation capability trait, TransactionBuilder
//! signature_map.rs — per-record (public key -> signatures) map, insertion ordered
//! envelope.rs      — TransactionEnvelope: freeze, sign, add/remove/inspect signatures
//! codec.rs         — serialized envelope format and the per-node wire artifact
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build** a [`LogicalTransaction`] with [`TransactionBuilder`].
//! 2. **Freeze** it into a [`TransactionEnvelope`]: one [`PerNodeRecord`]
//!    per target node, bodies identical except for the embedded node id.
//! 3. **Sign** — locally with [`TransactionEnvelope::sign_with`], or
//!    detached: [`TransactionEnvelope::sign`] returns one signature per
//!    record, and [`TransactionEnvelope::add_signature`] attaches them later,
//!    possibly to a deserialized copy on another machine.
//! 4. **Execute** it once through the retry engine. After that the envelope
//!    is terminal.
//!
//! ## Design Decisions
//!
//! - Signature maps keep insertion order and never deduplicate. Adding the
//!   same signature twice stores it twice; callers own deduplication.
//! - Freezing is the only way to create records, so bodies cannot drift
//!   apart after the fact. Nothing re-checks them.

pub mod body;
pub mod codec;
pub mod envelope;
pub mod signature_map;

use thiserror::Error;

use crate::account::AccountId;
use crate::crypto::PublicKey;

pub use body::{LogicalTransaction, Operation, RawOperation, TransactionBuilder};
pub use envelope::{PerNodeRecord, RemovedSignatures, Signatures, TransactionEnvelope};
pub use signature_map::{SignatureEntry, SignatureMap};

/// Errors from building, freezing, signing and (de)serializing envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("transaction is not frozen")]
    NotFrozen,

    #[error("transaction is already frozen")]
    AlreadyFrozen,

    #[error("transaction was already executed")]
    AlreadyExecuted,

    #[error("signature count mismatch: envelope has {expected} records, got {got} signatures")]
    SignatureCountMismatch { expected: usize, got: usize },

    #[error("transaction has no target nodes")]
    EmptyNodeList,

    #[error("transaction is incomplete: {missing} is not set")]
    IncompleteTransaction { missing: &'static str },

    #[error("memo is {len} bytes, max is {max}")]
    MemoTooLong { len: usize, max: usize },

    #[error("malformed envelope bytes: {0}")]
    Deserialization(String),

    #[error("envelope could not be encoded: {0}")]
    Serialization(String),

    #[error("signature by {public_key} does not verify for node {node_id}")]
    InvalidSignature {
        node_id: AccountId,
        public_key: PublicKey,
    },
}
