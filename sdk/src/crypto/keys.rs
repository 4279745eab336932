//! # Key Management
//!
//! Signing keys for Meridian accounts. Two algorithms are supported, and
//! the set is closed on purpose: a signature map entry is keyed by
//! `(algorithm, public key bytes)`, and every node has to agree on what
//! those tags mean.
//!
//! - **Ed25519** (`ed25519-dalek`) — 32-byte public keys, 64-byte signatures.
//! - **ECDSA secp256k1** (`k256`) — 33-byte compressed public keys, 64-byte
//!   `r || s` signatures over SHA-256, RFC 6979 deterministic nonces.
//!
//! Keys render as `<algorithm>:<hex>` (`ed25519:9a1f...`,
//! `secp256k1:02c4...`) so that a key pasted into a config file or a CLI
//! flag carries its algorithm with it.
//!
//! ## Security considerations
//!
//! - Private keys never show up in `Debug` output. There is no `Display`
//!   for private keys either; exporting one goes through
//!   [`PrivateKey::to_prefixed_hex`], which is hard to call by accident.
//! - Key bytes are never logged.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::Signer as _;
use ed25519_dalek::Verifier as _;
use k256::ecdsa::signature::{Signer as _, Verifier as _};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Ed25519 public key length in bytes.
pub const ED25519_PUBLIC_KEY_LENGTH: usize = 32;

/// Compressed SEC1 secp256k1 public key length in bytes.
pub const SECP256K1_PUBLIC_KEY_LENGTH: usize = 33;

/// Secret key length for both algorithms.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Errors that can occur during key operations.
///
/// Vague about *why* on purpose: details about key material do not belong
/// in error messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes for {0}")]
    InvalidPublicKey(KeyAlgorithm),

    #[error("unknown key algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("malformed key string: expected <algorithm>:<hex>")]
    MalformedKeyString,
}

// ---------------------------------------------------------------------------
// KeyAlgorithm
// ---------------------------------------------------------------------------

/// The signing algorithm behind a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    Ed25519,
    EcdsaSecp256k1,
}

impl KeyAlgorithm {
    /// One-byte tag used by the serialized envelope format.
    pub fn tag(self) -> u8 {
        match self {
            Self::Ed25519 => 1,
            Self::EcdsaSecp256k1 => 2,
        }
    }

    /// Inverse of [`tag`](Self::tag).
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Ed25519),
            2 => Some(Self::EcdsaSecp256k1),
            _ => None,
        }
    }

    /// Prefix used in the textual key form.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::EcdsaSecp256k1 => "secp256k1",
        }
    }

    pub fn public_key_length(self) -> usize {
        match self {
            Self::Ed25519 => ED25519_PUBLIC_KEY_LENGTH,
            Self::EcdsaSecp256k1 => SECP256K1_PUBLIC_KEY_LENGTH,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(Self::Ed25519),
            "secp256k1" | "ecdsa" | "ecdsa-secp256k1" => Ok(Self::EcdsaSecp256k1),
            other => Err(KeyError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Splits `"<algorithm>:<hex>"` into its parts and decodes the hex.
fn split_prefixed(s: &str) -> Result<(KeyAlgorithm, Vec<u8>), KeyError> {
    let (prefix, hex_part) = s.split_once(':').ok_or(KeyError::MalformedKeyString)?;
    let algorithm: KeyAlgorithm = prefix.parse()?;
    let bytes = hex::decode(hex_part).map_err(|_| KeyError::MalformedKeyString)?;
    Ok((algorithm, bytes))
}

// ---------------------------------------------------------------------------
// PrivateKey
// ---------------------------------------------------------------------------

/// A private signing key.
///
/// Intentionally not `Serialize`. Writing a private key somewhere should be
/// a deliberate act; use [`to_prefixed_hex`](Self::to_prefixed_hex).
///
/// # Examples
///
/// ```
/// use meridian_sdk::crypto::PrivateKey;
///
/// let key = PrivateKey::generate_ed25519();
/// let sig = key.sign(b"body bytes");
/// assert!(key.public_key().verify(b"body bytes", &sig));
/// ```
#[derive(Clone)]
pub enum PrivateKey {
    Ed25519(ed25519_dalek::SigningKey),
    EcdsaSecp256k1(k256::ecdsa::SigningKey),
}

impl PrivateKey {
    /// Generates a fresh Ed25519 key from the OS RNG.
    pub fn generate_ed25519() -> Self {
        Self::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng))
    }

    /// Generates a fresh secp256k1 key from the OS RNG.
    pub fn generate_ecdsa() -> Self {
        Self::EcdsaSecp256k1(k256::ecdsa::SigningKey::random(&mut OsRng))
    }

    pub fn generate(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Ed25519 => Self::generate_ed25519(),
            KeyAlgorithm::EcdsaSecp256k1 => Self::generate_ecdsa(),
        }
    }

    /// Reconstructs a key from its 32 raw secret bytes.
    pub fn from_bytes(algorithm: KeyAlgorithm, bytes: &[u8]) -> Result<Self, KeyError> {
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let secret: [u8; SECRET_KEY_LENGTH] =
                    bytes.try_into().map_err(|_| KeyError::InvalidSecretKey)?;
                Ok(Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&secret)))
            }
            KeyAlgorithm::EcdsaSecp256k1 => {
                if bytes.len() != SECRET_KEY_LENGTH {
                    return Err(KeyError::InvalidSecretKey);
                }
                // Rejects zero and values at or above the curve order.
                let key = k256::ecdsa::SigningKey::from_slice(bytes)
                    .map_err(|_| KeyError::InvalidSecretKey)?;
                Ok(Self::EcdsaSecp256k1(key))
            }
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519(_) => KeyAlgorithm::Ed25519,
            Self::EcdsaSecp256k1(_) => KeyAlgorithm::EcdsaSecp256k1,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Ed25519(key) => PublicKey::Ed25519(key.verifying_key().to_bytes()),
            Self::EcdsaSecp256k1(key) => {
                let point = key.verifying_key().to_encoded_point(true);
                let mut bytes = [0u8; SECP256K1_PUBLIC_KEY_LENGTH];
                bytes.copy_from_slice(point.as_bytes());
                PublicKey::EcdsaSecp256k1(bytes)
            }
        }
    }

    /// Signs `message` and returns the raw 64-byte signature.
    ///
    /// Both algorithms are deterministic: the same key and message always
    /// produce the same bytes.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::Ed25519(key) => key.sign(message).to_bytes().to_vec(),
            Self::EcdsaSecp256k1(key) => {
                let signature: k256::ecdsa::Signature = key.sign(message);
                signature.to_bytes().to_vec()
            }
        }
    }

    /// Raw secret bytes. Handle with care.
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        match self {
            Self::Ed25519(key) => key.to_bytes(),
            Self::EcdsaSecp256k1(key) => {
                let mut out = [0u8; SECRET_KEY_LENGTH];
                out.copy_from_slice(&key.to_bytes());
                out
            }
        }
    }

    /// Exports the key as `<algorithm>:<hex>`.
    pub fn to_prefixed_hex(&self) -> String {
        format!("{}:{}", self.algorithm(), hex::encode(self.to_bytes()))
    }
}

impl FromStr for PrivateKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, bytes) = split_prefixed(s.trim())?;
        Self::from_bytes(algorithm, &bytes)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(pub={})", self.public_key())
    }
}

impl PartialEq for PrivateKey {
    /// Compared through the public key; secret material is never compared
    /// in non-constant time.
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for PrivateKey {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A public verification key, tagged with its algorithm.
///
/// The ordering derives from `(algorithm, bytes)` which is exactly the
/// identity a signature map uses.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PublicKey {
    Ed25519([u8; ED25519_PUBLIC_KEY_LENGTH]),
    EcdsaSecp256k1([u8; SECP256K1_PUBLIC_KEY_LENGTH]),
}

impl PublicKey {
    /// Builds a public key from raw bytes, validating that they decode to a
    /// point on the right curve.
    pub fn from_bytes(algorithm: KeyAlgorithm, bytes: &[u8]) -> Result<Self, KeyError> {
        let invalid = || KeyError::InvalidPublicKey(algorithm);
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let arr: [u8; ED25519_PUBLIC_KEY_LENGTH] =
                    bytes.try_into().map_err(|_| invalid())?;
                ed25519_dalek::VerifyingKey::from_bytes(&arr).map_err(|_| invalid())?;
                Ok(Self::Ed25519(arr))
            }
            KeyAlgorithm::EcdsaSecp256k1 => {
                let arr: [u8; SECP256K1_PUBLIC_KEY_LENGTH] =
                    bytes.try_into().map_err(|_| invalid())?;
                k256::ecdsa::VerifyingKey::from_sec1_bytes(&arr).map_err(|_| invalid())?;
                Ok(Self::EcdsaSecp256k1(arr))
            }
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519(_) => KeyAlgorithm::Ed25519,
            Self::EcdsaSecp256k1(_) => KeyAlgorithm::EcdsaSecp256k1,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ed25519(bytes) => bytes,
            Self::EcdsaSecp256k1(bytes) => bytes,
        }
    }

    /// Verifies a raw signature over `message`.
    ///
    /// Returns `false` for anything that does not verify, including
    /// signatures of the wrong length. No error oracle.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::Ed25519(bytes) => {
                let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(bytes) else {
                    return false;
                };
                let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
                    return false;
                };
                let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
                key.verify(message, &sig).is_ok()
            }
            Self::EcdsaSecp256k1(bytes) => {
                let Ok(key) = k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes) else {
                    return false;
                };
                let Ok(sig) = k256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify(message, &sig).is_ok()
            }
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm(), self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}:{})", self.algorithm(), &self.to_hex()[..16])
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, bytes) = split_prefixed(s.trim())?;
        Self::from_bytes(algorithm, &bytes)
    }
}

// Public keys travel through JSON (detached signatures, removal snapshots)
// in their textual form.
impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_sign_verify_roundtrip() {
        let key = PrivateKey::generate_ed25519();
        let sig = key.sign(b"transfer 1 to 0.0.3");
        assert_eq!(sig.len(), 64);
        assert!(key.public_key().verify(b"transfer 1 to 0.0.3", &sig));
        assert!(!key.public_key().verify(b"transfer 2 to 0.0.3", &sig));
    }

    #[test]
    fn ecdsa_sign_verify_roundtrip() {
        let key = PrivateKey::generate_ecdsa();
        let sig = key.sign(b"transfer 1 to 0.0.3");
        assert_eq!(sig.len(), 64);
        assert_eq!(key.public_key().as_bytes().len(), 33);
        assert!(key.public_key().verify(b"transfer 1 to 0.0.3", &sig));
    }

    #[test]
    fn signatures_are_deterministic() {
        for key in [PrivateKey::generate_ed25519(), PrivateKey::generate_ecdsa()] {
            assert_eq!(key.sign(b"same body"), key.sign(b"same body"));
        }
    }

    #[test]
    fn wrong_key_fails_verification() {
        let a = PrivateKey::generate_ed25519();
        let b = PrivateKey::generate_ed25519();
        let sig = a.sign(b"message");
        assert!(!b.public_key().verify(b"message", &sig));
    }

    #[test]
    fn truncated_signature_is_rejected_without_panic() {
        let key = PrivateKey::generate_ecdsa();
        let sig = key.sign(b"message");
        assert!(!key.public_key().verify(b"message", &sig[..10]));
    }

    #[test]
    fn private_key_string_roundtrip() {
        for key in [PrivateKey::generate_ed25519(), PrivateKey::generate_ecdsa()] {
            let text = key.to_prefixed_hex();
            let restored: PrivateKey = text.parse().unwrap();
            assert_eq!(key, restored);
            assert_eq!(key.to_bytes(), restored.to_bytes());
        }
    }

    #[test]
    fn public_key_string_roundtrip() {
        let pk = PrivateKey::generate_ecdsa().public_key();
        let text = pk.to_string();
        assert!(text.starts_with("secp256k1:"));
        assert_eq!(text.parse::<PublicKey>().unwrap(), pk);
    }

    #[test]
    fn public_key_json_roundtrip() {
        let pk = PrivateKey::generate_ed25519().public_key();
        let json = serde_json::to_string(&pk).unwrap();
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(pk, back);
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        assert_eq!(
            PublicKey::from_bytes(KeyAlgorithm::Ed25519, &[0u8; 16]),
            Err(KeyError::InvalidPublicKey(KeyAlgorithm::Ed25519))
        );
        assert!(PublicKey::from_bytes(KeyAlgorithm::EcdsaSecp256k1, &[0u8; 33]).is_err());
    }

    #[test]
    fn malformed_key_strings_are_rejected() {
        assert!("deadbeef".parse::<PrivateKey>().is_err());
        assert!("rsa:deadbeef".parse::<PrivateKey>().is_err());
        assert!("ed25519:zz".parse::<PrivateKey>().is_err());
        assert!("ed25519:deadbeef".parse::<PrivateKey>().is_err());
    }

    #[test]
    fn ecdsa_zero_secret_is_rejected() {
        assert_eq!(
            PrivateKey::from_bytes(KeyAlgorithm::EcdsaSecp256k1, &[0u8; 32]),
            Err(KeyError::InvalidSecretKey)
        );
    }

    #[test]
    fn algorithm_tags_roundtrip() {
        for algo in [KeyAlgorithm::Ed25519, KeyAlgorithm::EcdsaSecp256k1] {
            assert_eq!(KeyAlgorithm::from_tag(algo.tag()), Some(algo));
        }
        assert_eq!(KeyAlgorithm::from_tag(0), None);
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let key = PrivateKey::generate_ed25519();
        let debug = format!("{:?}", key);
        assert!(debug.starts_with("PrivateKey(pub=ed25519:"));
        assert!(!debug.contains(&hex::encode(key.to_bytes())));
    }
}
