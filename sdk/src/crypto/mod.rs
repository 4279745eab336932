//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations. Nothing here
//! invents cryptography: `ed25519-dalek` and `k256` do the math, `sha2`
//! does the hashing, and this module only decides how keys are named,
//! tagged and rendered.

pub mod hash;
pub mod keys;

pub use hash::{sha384, sha384_hex, TRANSACTION_HASH_LENGTH};
pub use keys::{KeyAlgorithm, KeyError, PrivateKey, PublicKey};
