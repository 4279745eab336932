//! The multi-node transaction envelope.
//!
//! One logical transaction becomes one [`PerNodeRecord`] per target node.
//! Each record carries its own body and its own signature map, because a
//! signature covers the exact body bytes and those embed the node id.

use bytes::Bytes;
use tracing::debug;

use super::body::{decode_transaction_id, LogicalTransaction};
use super::signature_map::SignatureMap;
use super::TransactionError;
use crate::account::{AccountId, TransactionId};
use crate::crypto::{sha384, PrivateKey, PublicKey};

/// Signatures handed to [`TransactionEnvelope::add_signature`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signatures {
    /// A single signature. Only valid for a one-record envelope.
    One(Vec<u8>),
    /// One signature per record, in record order.
    Many(Vec<Vec<u8>>),
}

impl From<Vec<Vec<u8>>> for Signatures {
    fn from(signatures: Vec<Vec<u8>>) -> Self {
        Self::Many(signatures)
    }
}

// ---------------------------------------------------------------------------
// PerNodeRecord
// ---------------------------------------------------------------------------

/// The copy of the transaction addressed to one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerNodeRecord {
    node_id: AccountId,
    body_bytes: Bytes,
    signature_map: SignatureMap,
}

impl PerNodeRecord {
    pub(crate) fn new(node_id: AccountId, body_bytes: Bytes, signature_map: SignatureMap) -> Self {
        Self {
            node_id,
            body_bytes,
            signature_map,
        }
    }

    pub fn node_id(&self) -> AccountId {
        self.node_id
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body_bytes
    }

    pub fn signature_map(&self) -> &SignatureMap {
        &self.signature_map
    }

    /// SHA-384 of the body bytes.
    pub fn transaction_hash(&self) -> [u8; 48] {
        sha384(&self.body_bytes)
    }
}

// ---------------------------------------------------------------------------
// RemovedSignatures
// ---------------------------------------------------------------------------

/// What [`TransactionEnvelope::remove_all_signatures`] took out.
///
/// Holds every record's map exactly as it was, so
/// [`TransactionEnvelope::restore_signatures`] can put back duplicates too.
/// The per-key views flatten across records in record order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedSignatures {
    records: Vec<SignatureMap>,
}

impl RemovedSignatures {
    pub fn new(records: Vec<SignatureMap>) -> Self {
        Self { records }
    }

    /// The removed map of each record, in record order.
    pub fn records(&self) -> &[SignatureMap] {
        &self.records
    }

    /// Distinct keys, in order of first appearance.
    pub fn keys(&self) -> Vec<&PublicKey> {
        let mut keys: Vec<&PublicKey> = Vec::new();
        for key in self.records.iter().flat_map(SignatureMap::keys) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Every signature `public_key` had, record by record.
    pub fn get(&self, public_key: &PublicKey) -> Option<Vec<Vec<u8>>> {
        let mut found = false;
        let mut out = Vec::new();
        for map in &self.records {
            if let Some(sigs) = map.get(public_key) {
                found = true;
                out.extend(sigs.iter().cloned());
            }
        }
        found.then_some(out)
    }

    /// `(key, signatures)` for every removed key.
    pub fn iter(&self) -> impl Iterator<Item = (&PublicKey, Vec<Vec<u8>>)> + '_ {
        self.keys()
            .into_iter()
            .map(move |key| (key, self.get(key).unwrap_or_default()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.iter().all(SignatureMap::is_empty)
    }
}

// ---------------------------------------------------------------------------
// TransactionEnvelope
// ---------------------------------------------------------------------------

/// A frozen transaction plus all signatures collected so far.
///
/// Unfrozen envelopes are empty and reject everything except
/// [`freeze`](Self::freeze). Executed envelopes reject every mutation.
/// Not internally synchronized: mutate through `&mut` from one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionEnvelope {
    records: Vec<PerNodeRecord>,
    frozen: bool,
    executed: bool,
}

impl TransactionEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freezes `transaction` into a new envelope.
    pub fn from_transaction(transaction: &LogicalTransaction) -> Result<Self, TransactionError> {
        let mut envelope = Self::new();
        envelope.freeze(transaction)?;
        Ok(envelope)
    }

    pub(crate) fn from_records(records: Vec<PerNodeRecord>) -> Self {
        Self {
            records,
            frozen: true,
            executed: false,
        }
    }

    /// Expands `transaction` into one record per target node.
    ///
    /// Every body is produced before any is stored, so a failure leaves the
    /// envelope untouched.
    pub fn freeze(&mut self, transaction: &LogicalTransaction) -> Result<&mut Self, TransactionError> {
        if self.executed {
            return Err(TransactionError::AlreadyExecuted);
        }
        if self.frozen {
            return Err(TransactionError::AlreadyFrozen);
        }
        if transaction.node_account_ids.is_empty() {
            return Err(TransactionError::EmptyNodeList);
        }
        transaction.validate()?;

        let records = transaction
            .node_account_ids
            .iter()
            .map(|node_id| {
                let body = transaction.encode(node_id)?;
                Ok(PerNodeRecord::new(
                    *node_id,
                    Bytes::from(body),
                    SignatureMap::new(),
                ))
            })
            .collect::<Result<Vec<_>, TransactionError>>()?;

        debug!(
            transaction_id = ?transaction.transaction_id.map(|id| id.to_string()),
            nodes = records.len(),
            "transaction frozen"
        );
        self.records = records;
        self.frozen = true;
        Ok(self)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub fn records(&self) -> &[PerNodeRecord] {
        &self.records
    }

    pub fn record(&self, node_id: &AccountId) -> Option<&PerNodeRecord> {
        self.records.iter().find(|r| &r.node_id == node_id)
    }

    pub fn node_account_ids(&self) -> Vec<AccountId> {
        self.records.iter().map(|r| r.node_id).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The transaction id embedded in the bodies.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.records
            .first()
            .and_then(|r| decode_transaction_id(&r.body_bytes))
    }

    fn ensure_frozen(&self) -> Result<(), TransactionError> {
        if self.frozen {
            Ok(())
        } else {
            Err(TransactionError::NotFrozen)
        }
    }

    /// Frozen and not yet executed.
    pub fn ensure_mutable(&self) -> Result<(), TransactionError> {
        if self.executed {
            return Err(TransactionError::AlreadyExecuted);
        }
        self.ensure_frozen()
    }

    // -- Signing --------------------------------------------------------------

    /// Signs every record's body with `key`, in record order. Does not
    /// attach anything.
    pub fn sign(&self, key: &PrivateKey) -> Result<Vec<Vec<u8>>, TransactionError> {
        self.ensure_frozen()?;
        Ok(self
            .records
            .iter()
            .map(|record| key.sign(&record.body_bytes))
            .collect())
    }

    /// Signs with `key` and attaches the signatures.
    pub fn sign_with(&mut self, key: &PrivateKey) -> Result<&mut Self, TransactionError> {
        self.ensure_mutable()?;
        let signatures = self.sign(key)?;
        self.add_signature(&key.public_key(), Signatures::Many(signatures))
    }

    /// Appends signatures produced by `public_key`, one per record.
    ///
    /// Existing entries are never replaced. Adding the same signature
    /// twice stores it twice.
    pub fn add_signature(
        &mut self,
        public_key: &PublicKey,
        signatures: Signatures,
    ) -> Result<&mut Self, TransactionError> {
        self.ensure_mutable()?;
        let expected = self.records.len();
        let signatures = match signatures {
            Signatures::One(signature) if expected == 1 => vec![signature],
            Signatures::One(_) => {
                return Err(TransactionError::SignatureCountMismatch { expected, got: 1 })
            }
            Signatures::Many(signatures) if signatures.len() == expected => signatures,
            Signatures::Many(signatures) => {
                return Err(TransactionError::SignatureCountMismatch {
                    expected,
                    got: signatures.len(),
                })
            }
        };

        for (record, signature) in self.records.iter_mut().zip(signatures) {
            record.signature_map.push(public_key, signature);
        }
        debug!(public_key = %public_key, records = expected, "signature added");
        Ok(self)
    }

    /// Whether `public_key` has at least one signature on every record.
    pub fn is_signed_by(&self, public_key: &PublicKey) -> bool {
        !self.records.is_empty()
            && self
                .records
                .iter()
                .all(|r| r.signature_map.contains_key(public_key))
    }

    /// Clears every record's signature map and returns what was there.
    pub fn remove_all_signatures(&mut self) -> Result<RemovedSignatures, TransactionError> {
        self.ensure_mutable()?;
        let removed: Vec<SignatureMap> = self
            .records
            .iter_mut()
            .map(|r| r.signature_map.take())
            .collect();
        debug!(
            signatures = removed.iter().map(SignatureMap::signature_count).sum::<usize>(),
            "all signatures removed"
        );
        Ok(RemovedSignatures::new(removed))
    }

    /// Re-appends a removal snapshot record by record, keeping per-key order
    /// and duplicates.
    pub fn restore_signatures(
        &mut self,
        removed: &RemovedSignatures,
    ) -> Result<&mut Self, TransactionError> {
        self.ensure_mutable()?;
        if removed.records.len() != self.records.len() {
            return Err(TransactionError::SignatureCountMismatch {
                expected: self.records.len(),
                got: removed.records.len(),
            });
        }
        for (record, map) in self.records.iter_mut().zip(&removed.records) {
            for entry in map.entries() {
                record
                    .signature_map
                    .extend(&entry.public_key, entry.signatures.iter().cloned());
            }
        }
        Ok(self)
    }

    /// `(node id, signature map)` per record, in record order.
    pub fn signatures(&self) -> Result<Vec<(AccountId, &SignatureMap)>, TransactionError> {
        self.ensure_frozen()?;
        Ok(self
            .records
            .iter()
            .map(|r| (r.node_id, &r.signature_map))
            .collect())
    }

    /// Checks every stored signature against its key and record body.
    pub fn verify_signatures(&self) -> Result<(), TransactionError> {
        self.ensure_frozen()?;
        for record in &self.records {
            for (public_key, signature) in record.signature_map.pairs() {
                if !public_key.verify(&record.body_bytes, signature) {
                    return Err(TransactionError::InvalidSignature {
                        node_id: record.node_id,
                        public_key: public_key.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// SHA-384 of each record's body, in record order.
    pub fn transaction_hashes(&self) -> Result<Vec<(AccountId, [u8; 48])>, TransactionError> {
        self.ensure_frozen()?;
        Ok(self
            .records
            .iter()
            .map(|r| (r.node_id, r.transaction_hash()))
            .collect())
    }

    /// Flips the envelope into its terminal state. Returns `false` if it
    /// was already executed.
    pub(crate) fn mark_executed(&mut self) -> bool {
        !std::mem::replace(&mut self.executed, true)
    }
}
