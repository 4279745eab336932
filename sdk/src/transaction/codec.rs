//! Serialized envelope format.
//!
//! ```text
//! EnvelopeWire {
//!     magic:   u32  = "MRDN"
//!     version: u16
//!     records: [ { node_id, body_bytes, sig_pairs: [ { algorithm, public_key, signature } ] } ]
//! }
//! ```
//!
//! bincode, fixed-width integers, size-limited, trailing bytes rejected.
//! Signature pairs are written grouped by key in map order, so decoding
//! rebuilds the same grouping and the same order, duplicates included.
//!
//! The per-node wire artifact is the same structure holding a single record.

use bincode::Options;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::envelope::{PerNodeRecord, TransactionEnvelope};
use super::signature_map::SignatureMap;
use super::TransactionError;
use crate::account::AccountId;
use crate::config::{ENVELOPE_FORMAT_VERSION, ENVELOPE_MAGIC, MAX_ENVELOPE_SIZE};
use crate::crypto::{KeyAlgorithm, PublicKey};

#[derive(Serialize, Deserialize)]
struct EnvelopeWire {
    magic: u32,
    version: u16,
    records: Vec<RecordWire>,
}

#[derive(Serialize, Deserialize)]
struct RecordWire {
    node_id: AccountId,
    body_bytes: Bytes,
    sig_pairs: Vec<SigPairWire>,
}

#[derive(Serialize, Deserialize)]
struct SigPairWire {
    algorithm: u8,
    public_key: Vec<u8>,
    signature: Vec<u8>,
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_ENVELOPE_SIZE)
        .with_fixint_encoding()
        .with_big_endian()
        .reject_trailing_bytes()
}

impl From<&PerNodeRecord> for RecordWire {
    fn from(record: &PerNodeRecord) -> Self {
        Self {
            node_id: record.node_id(),
            body_bytes: record.body_bytes().clone(),
            sig_pairs: record
                .signature_map()
                .pairs()
                .map(|(key, signature)| SigPairWire {
                    algorithm: key.algorithm().tag(),
                    public_key: key.as_bytes().to_vec(),
                    signature: signature.to_vec(),
                })
                .collect(),
        }
    }
}

impl TryFrom<RecordWire> for PerNodeRecord {
    type Error = TransactionError;

    fn try_from(wire: RecordWire) -> Result<Self, Self::Error> {
        let mut map = SignatureMap::new();
        for pair in wire.sig_pairs {
            let algorithm = KeyAlgorithm::from_tag(pair.algorithm).ok_or_else(|| {
                TransactionError::Deserialization(format!(
                    "unknown key algorithm tag {}",
                    pair.algorithm
                ))
            })?;
            let public_key = PublicKey::from_bytes(algorithm, &pair.public_key)
                .map_err(|e| TransactionError::Deserialization(e.to_string()))?;
            map.push(&public_key, pair.signature);
        }
        Ok(PerNodeRecord::new(wire.node_id, wire.body_bytes, map))
    }
}

fn encode(records: Vec<RecordWire>) -> Result<Vec<u8>, TransactionError> {
    let wire = EnvelopeWire {
        magic: ENVELOPE_MAGIC,
        version: ENVELOPE_FORMAT_VERSION,
        records,
    };
    options()
        .serialize(&wire)
        .map_err(|e| TransactionError::Serialization(e.to_string()))
}

impl TransactionEnvelope {
    /// Encodes every record, in order, with all of its signatures.
    pub fn serialize(&self) -> Result<Vec<u8>, TransactionError> {
        if !self.is_frozen() {
            return Err(TransactionError::NotFrozen);
        }
        encode(self.records().iter().map(RecordWire::from).collect())
    }

    /// Decodes bytes produced by [`serialize`](Self::serialize).
    ///
    /// The result is frozen and not executed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, TransactionError> {
        let wire: EnvelopeWire = options()
            .deserialize(bytes)
            .map_err(|e| TransactionError::Deserialization(e.to_string()))?;

        if wire.magic != ENVELOPE_MAGIC {
            return Err(TransactionError::Deserialization(format!(
                "bad magic {:#010x}",
                wire.magic
            )));
        }
        if wire.version != ENVELOPE_FORMAT_VERSION {
            return Err(TransactionError::Deserialization(format!(
                "unsupported format version {}",
                wire.version
            )));
        }
        if wire.records.is_empty() {
            return Err(TransactionError::Deserialization(
                "envelope has no records".into(),
            ));
        }

        let records = wire
            .records
            .into_iter()
            .map(PerNodeRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_records(records))
    }
}

impl PerNodeRecord {
    /// The bytes sent to this record's node: a one-record envelope.
    pub fn to_wire_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        encode(vec![RecordWire::from(self)])
    }

    /// Decodes a one-record wire artifact.
    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let envelope = TransactionEnvelope::deserialize(bytes)?;
        match envelope.records() {
            [record] => Ok(record.clone()),
            records => Err(TransactionError::Deserialization(format!(
                "expected one record, found {}",
                records.len()
            ))),
        }
    }
}
