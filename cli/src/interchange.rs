//! # File Formats
//!
//! Envelopes travel as the binary serialized envelope. Everything a human
//! might want to read (detached signatures, strip snapshots, inspection
//! reports) is JSON with hex-encoded bytes.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use meridian_sdk::crypto::{sha384_hex, PublicKey};
use meridian_sdk::transaction::{RemovedSignatures, SignatureMap, TransactionEnvelope};

/// Signatures one key produced for every record, in record order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignatures {
    pub public_key: PublicKey,
    pub signatures: Vec<String>,
}

impl KeySignatures {
    pub fn new(public_key: PublicKey, signatures: &[Vec<u8>]) -> Self {
        Self {
            public_key,
            signatures: signatures.iter().map(hex::encode).collect(),
        }
    }

    pub fn decode_signatures(&self) -> Result<Vec<Vec<u8>>> {
        self.signatures
            .iter()
            .map(|s| hex::decode(s).with_context(|| format!("bad signature hex {s:?}")))
            .collect()
    }
}

/// One record's signature map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSignatures {
    pub node_id: String,
    pub entries: Vec<KeySignatures>,
}

fn record_signatures(node_id: String, map: &SignatureMap) -> RecordSignatures {
    RecordSignatures {
        node_id,
        entries: map
            .entries()
            .iter()
            .map(|e| KeySignatures::new(e.public_key.clone(), &e.signatures))
            .collect(),
    }
}

/// What `strip` saves and `restore` reads back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSnapshot {
    pub records: Vec<RecordSignatures>,
}

impl SignatureSnapshot {
    pub fn new(envelope: &TransactionEnvelope, removed: &RemovedSignatures) -> Self {
        Self {
            records: envelope
                .node_account_ids()
                .into_iter()
                .zip(removed.records())
                .map(|(id, map)| record_signatures(id.to_string(), map))
                .collect(),
        }
    }

    pub fn to_removed(&self) -> Result<RemovedSignatures> {
        let mut maps = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let mut map = SignatureMap::new();
            for entry in &record.entries {
                map.extend(&entry.public_key, entry.decode_signatures()?);
            }
            maps.push(map);
        }
        Ok(RemovedSignatures::new(maps))
    }
}

/// `inspect --json` output.
#[derive(Debug, Serialize)]
pub struct EnvelopeReport {
    pub transaction_id: Option<String>,
    pub executed: bool,
    pub signatures_valid: bool,
    pub records: Vec<RecordReport>,
}

#[derive(Debug, Serialize)]
pub struct RecordReport {
    pub node_id: String,
    pub transaction_hash: String,
    pub body_len: usize,
    pub signatures: Vec<KeySignatures>,
}

impl EnvelopeReport {
    pub fn new(envelope: &TransactionEnvelope) -> Self {
        Self {
            transaction_id: envelope.transaction_id().map(|id| id.to_string()),
            executed: envelope.is_executed(),
            signatures_valid: envelope.verify_signatures().is_ok(),
            records: envelope
                .records()
                .iter()
                .map(|r| RecordReport {
                    node_id: r.node_id().to_string(),
                    transaction_hash: sha384_hex(r.body_bytes()),
                    body_len: r.body_bytes().len(),
                    signatures: record_signatures(r.node_id().to_string(), r.signature_map())
                        .entries,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

pub fn read_envelope(path: &Path) -> Result<TransactionEnvelope> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read envelope {}", path.display()))?;
    TransactionEnvelope::deserialize(&bytes)
        .with_context(|| format!("{} is not a valid envelope", path.display()))
}

pub fn write_envelope(path: &Path, envelope: &TransactionEnvelope) -> Result<()> {
    let bytes = envelope.serialize().context("failed to serialize envelope")?;
    std::fs::write(path, bytes)
        .with_context(|| format!("failed to write envelope {}", path.display()))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text + "\n")
        .with_context(|| format!("failed to write {}", path.display()))
}
