//! # Hashing Utilities
//!
//! Transaction hashes in Meridian are SHA-384 digests. Nodes report the hash
//! of the record they accepted, and clients use it to correlate receipts with
//! the record they actually sent. Because every node gets its own body bytes,
//! every node also gets its own hash.

use sha2::{Digest, Sha384};

/// Length of a transaction hash in bytes.
pub const TRANSACTION_HASH_LENGTH: usize = 48;

/// Compute the SHA-384 hash of the input data.
///
/// # Example
///
/// ```
/// use meridian_sdk::crypto::sha384;
///
/// let hash = sha384(b"meridian");
/// assert_eq!(hash.len(), 48);
/// ```
pub fn sha384(data: &[u8]) -> [u8; TRANSACTION_HASH_LENGTH] {
    let mut hasher = Sha384::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; TRANSACTION_HASH_LENGTH];
    output.copy_from_slice(&result);
    output
}

/// Hex-encoded SHA-384, for logs and CLI output.
pub fn sha384_hex(data: &[u8]) -> String {
    hex::encode(sha384(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha384_known_vector() {
        // NIST test vector for "abc".
        let expected = "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed\
                        8086072ba1e7cc2358baeca134c825a7";
        assert_eq!(sha384_hex(b"abc"), expected);
    }

    #[test]
    fn sha384_is_deterministic() {
        assert_eq!(sha384(b"body"), sha384(b"body"));
        assert_ne!(sha384(b"body-3"), sha384(b"body-4"));
    }
}
