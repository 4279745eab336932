//! Per-record signature storage.
//!
//! A [`SignatureMap`] maps public keys to the signatures they produced over
//! one record's body. Keys keep the order in which they were first added;
//! signatures under a key keep the order in which they were appended.
//! Nothing is ever deduplicated.

use crate::crypto::PublicKey;

/// All signatures one key contributed to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    pub public_key: PublicKey,
    pub signatures: Vec<Vec<u8>>,
}

/// Insertion-ordered `public key -> [signature]` map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureMap {
    entries: Vec<SignatureEntry>,
}

impl SignatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `signature` under `public_key`.
    pub fn push(&mut self, public_key: &PublicKey, signature: Vec<u8>) {
        match self.entries.iter_mut().find(|e| &e.public_key == public_key) {
            Some(entry) => entry.signatures.push(signature),
            None => self.entries.push(SignatureEntry {
                public_key: public_key.clone(),
                signatures: vec![signature],
            }),
        }
    }

    /// Appends every signature under `public_key`, preserving their order.
    pub fn extend(&mut self, public_key: &PublicKey, signatures: impl IntoIterator<Item = Vec<u8>>) {
        for signature in signatures {
            self.push(public_key, signature);
        }
    }

    pub fn get(&self, public_key: &PublicKey) -> Option<&[Vec<u8>]> {
        self.entries
            .iter()
            .find(|e| &e.public_key == public_key)
            .map(|e| e.signatures.as_slice())
    }

    pub fn contains_key(&self, public_key: &PublicKey) -> bool {
        self.get(public_key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.entries.iter().map(|e| &e.public_key)
    }

    pub fn entries(&self) -> &[SignatureEntry] {
        &self.entries
    }

    /// `(key, signature)` pairs, grouped by key in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (&PublicKey, &[u8])> {
        self.entries.iter().flat_map(|e| {
            e.signatures
                .iter()
                .map(move |sig| (&e.public_key, sig.as_slice()))
        })
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of stored signatures across all keys.
    pub fn signature_count(&self) -> usize {
        self.entries.iter().map(|e| e.signatures.len()).sum()
    }

    /// Empties the map and hands back what it held.
    pub fn take(&mut self) -> SignatureMap {
        std::mem::take(self)
    }
}
